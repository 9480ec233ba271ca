//! Metric families and their Prometheus text exposition.

use std::fmt::Write;

/// Static description of one metric: name, help text and label names.
///
/// Every family emitted by the exporter is a gauge.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// One sample: a metric, its label values (in `desc.labels` order) and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub desc: &'static MetricDesc,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn help(&self) -> &'static str {
        self.desc.help
    }

    /// Label name/value pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.desc
            .labels
            .iter()
            .copied()
            .zip(self.label_values.iter().map(String::as_str))
    }

    /// Value of a single label, if the metric has it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// Format labels for Prometheus exposition format.
    pub fn format_labels(&self) -> String {
        if self.label_values.is_empty() {
            return String::new();
        }

        let parts: Vec<String> = self
            .labels()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();

        format!("{{{}}}", parts.join(","))
    }
}

/// A declared metric together with the samples it got in one scrape.
///
/// A family with no samples is still rendered (HELP and TYPE only).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub desc: &'static MetricDesc,
    pub samples: Vec<MetricSample>,
}

impl MetricFamily {
    pub fn new(desc: &'static MetricDesc) -> Self {
        Self {
            desc,
            samples: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    /// Add a sample. `label_values` must line up with `desc.labels`.
    pub fn add(&mut self, label_values: Vec<String>, value: f64) {
        debug_assert_eq!(
            label_values.len(),
            self.desc.labels.len(),
            "label arity mismatch for {}",
            self.desc.name
        );
        self.samples.push(MetricSample {
            desc: self.desc,
            label_values,
            value,
        });
    }

    /// Append this family in Prometheus text format.
    pub fn render_into(&self, output: &mut String) {
        writeln!(
            output,
            "# HELP {} {}",
            self.desc.name,
            escape_help(self.desc.help)
        )
        .ok();
        writeln!(output, "# TYPE {} gauge", self.desc.name).ok();

        for sample in &self.samples {
            writeln!(
                output,
                "{}{} {}",
                self.desc.name,
                sample.format_labels(),
                format_value(sample.value)
            )
            .ok();
        }
    }
}

/// Render families in Prometheus text exposition format (0.0.4).
pub fn render<'a>(families: impl IntoIterator<Item = &'a MetricFamily>) -> String {
    let mut output = String::new();
    for family in families {
        family.render_into(&mut output);
    }
    output
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape HELP text (quotes are legal there).
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
