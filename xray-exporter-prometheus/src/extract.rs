//! Extraction of metric families from an XRay status document.
//!
//! Five independent routines each own a fixed set of metric names. A routine
//! never fails: anomalies in its part of the document become diagnostics and
//! the routine returns whatever samples it could build, so a broken section
//! cannot take the others down with it.
//!
//! Two default policies coexist on purpose:
//! - memstats always yields its five samples, zero-valued when absent;
//! - keyed sections yield their families with no samples when absent.

use xray_common::{Field, FieldError, StatusDocument};

use crate::metrics::{MetricDesc, MetricFamily};

pub static MEMSTATS_ALLOC: MetricDesc = MetricDesc {
    name: "xray_memstats_alloc",
    help: "Memory allocated and not yet freed",
    labels: &[],
};

pub static MEMSTATS_TOTALALLOC: MetricDesc = MetricDesc {
    name: "xray_memstats_totalalloc",
    help: "Total memory allocated (even if freed)",
    labels: &[],
};

pub static MEMSTATS_SYS: MetricDesc = MetricDesc {
    name: "xray_memstats_sys",
    help: "Memory obtained from system",
    labels: &[],
};

pub static MEMSTATS_MALLOCS: MetricDesc = MetricDesc {
    name: "xray_memstats_mallocs",
    help: "Number of mallocs",
    labels: &[],
};

pub static MEMSTATS_FREES: MetricDesc = MetricDesc {
    name: "xray_memstats_frees",
    help: "Number of frees",
    labels: &[],
};

/// `memstats` keys and the gauges they feed, in emission order.
static MEMSTATS: [(&str, &MetricDesc); 5] = [
    ("Alloc", &MEMSTATS_ALLOC),
    ("TotalAlloc", &MEMSTATS_TOTALALLOC),
    ("Sys", &MEMSTATS_SYS),
    ("Mallocs", &MEMSTATS_MALLOCS),
    ("Frees", &MEMSTATS_FREES),
];

pub static OBSERVATORY_DELAY: MetricDesc = MetricDesc {
    name: "xray_observatory_delay",
    help: "Observatory delay metrics",
    labels: &["outbound_tag"],
};

pub static OBSERVATORY_ALIVE: MetricDesc = MetricDesc {
    name: "xray_observatory_alive",
    help: "Observatory alive status",
    labels: &["outbound_tag"],
};

pub static INBOUND_DOWNLINK: MetricDesc = MetricDesc {
    name: "xray_stats_inbound_downlink",
    help: "Inbound downlink traffic",
    labels: &["source"],
};

pub static INBOUND_UPLINK: MetricDesc = MetricDesc {
    name: "xray_stats_inbound_uplink",
    help: "Inbound uplink traffic",
    labels: &["source"],
};

pub static OUTBOUND_DOWNLINK: MetricDesc = MetricDesc {
    name: "xray_stats_outbound_downlink",
    help: "Outbound downlink traffic",
    labels: &["source"],
};

pub static OUTBOUND_UPLINK: MetricDesc = MetricDesc {
    name: "xray_stats_outbound_uplink",
    help: "Outbound uplink traffic",
    labels: &["source"],
};

pub static USER_DOWNLINK: MetricDesc = MetricDesc {
    name: "xray_stats_user_downlink",
    help: "User downlink traffic",
    labels: &["source"],
};

pub static USER_UPLINK: MetricDesc = MetricDesc {
    name: "xray_stats_user_uplink",
    help: "User uplink traffic",
    labels: &["source"],
};

/// A `stats.<direction>` map of `{uplink, downlink}` records.
struct TrafficSection {
    path: [&'static str; 2],
    downlink: &'static MetricDesc,
    uplink: &'static MetricDesc,
}

static INBOUND: TrafficSection = TrafficSection {
    path: ["stats", "inbound"],
    downlink: &INBOUND_DOWNLINK,
    uplink: &INBOUND_UPLINK,
};

static OUTBOUND: TrafficSection = TrafficSection {
    path: ["stats", "outbound"],
    downlink: &OUTBOUND_DOWNLINK,
    uplink: &OUTBOUND_UPLINK,
};

static USER: TrafficSection = TrafficSection {
    path: ["stats", "user"],
    downlink: &USER_DOWNLINK,
    uplink: &USER_UPLINK,
};

/// Output of one extraction routine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Families in a fixed order; present even when they have no samples.
    pub families: Vec<MetricFamily>,
    /// Anomalies found along the way.
    pub diagnostics: Vec<FieldError>,
}

impl Extraction {
    /// Numeric value of `field`, 0 when missing or mistyped.
    fn number_or_zero(&mut self, field: Field<'_>, path: &str) -> f64 {
        match field.as_number(path) {
            Ok(value) => value.unwrap_or(0.0),
            Err(e) => {
                self.diagnostics.push(e);
                0.0
            }
        }
    }

    /// Total number of samples across all families.
    pub fn sample_count(&self) -> usize {
        self.families.iter().map(|f| f.samples.len()).sum()
    }
}

/// The extraction routines, in the order a scrape runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    Memstats,
    Observatory,
    InboundStats,
    OutboundStats,
    UserStats,
}

impl Routine {
    pub const ALL: [Routine; 5] = [
        Routine::Memstats,
        Routine::Observatory,
        Routine::InboundStats,
        Routine::OutboundStats,
        Routine::UserStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Routine::Memstats => "memstats",
            Routine::Observatory => "observatory",
            Routine::InboundStats => "stats.inbound",
            Routine::OutboundStats => "stats.outbound",
            Routine::UserStats => "stats.user",
        }
    }

    /// Metric names this routine always declares.
    pub fn metric_names(&self) -> Vec<&'static str> {
        match self {
            Routine::Memstats => MEMSTATS.iter().map(|(_, desc)| desc.name).collect(),
            Routine::Observatory => vec![OBSERVATORY_DELAY.name, OBSERVATORY_ALIVE.name],
            Routine::InboundStats => INBOUND.metric_names(),
            Routine::OutboundStats => OUTBOUND.metric_names(),
            Routine::UserStats => USER.metric_names(),
        }
    }

    pub fn extract(&self, doc: &StatusDocument) -> Extraction {
        match self {
            Routine::Memstats => extract_memstats(doc),
            Routine::Observatory => extract_observatory(doc),
            Routine::InboundStats => extract_inbound(doc),
            Routine::OutboundStats => extract_outbound(doc),
            Routine::UserStats => extract_user(doc),
        }
    }
}

impl std::fmt::Display for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TrafficSection {
    fn metric_names(&self) -> Vec<&'static str> {
        vec![self.downlink.name, self.uplink.name]
    }
}

/// Five unlabeled gauges from `memstats`, each defaulting to 0.
pub fn extract_memstats(doc: &StatusDocument) -> Extraction {
    let mut out = Extraction::default();
    let memstats = doc.get("memstats");

    // A mistyped section still yields five zeroes: `get` on a non-object is Missing.
    if let Err(e) = doc.section(&["memstats"]) {
        out.diagnostics.push(e);
    }

    for &(key, desc) in &MEMSTATS {
        let value = out.number_or_zero(memstats.get(key), &format!("memstats.{key}"));
        let mut family = MetricFamily::new(desc);
        family.add(Vec::new(), value);
        out.families.push(family);
    }

    out
}

/// Delay and liveness per outbound tag from `observatory`.
pub fn extract_observatory(doc: &StatusDocument) -> Extraction {
    let mut out = Extraction::default();
    let mut delay = MetricFamily::new(&OBSERVATORY_DELAY);
    let mut alive = MetricFamily::new(&OBSERVATORY_ALIVE);

    match doc.section(&["observatory"]) {
        Ok(Some(entries)) => {
            for (tag, record) in entries {
                let record = Field::Present(record);
                let path = format!("observatory.{tag}");
                if let Err(e) = record.as_object(&path) {
                    out.diagnostics.push(e);
                    continue;
                }

                let delay_ms = out.number_or_zero(record.get("delay"), &format!("{path}.delay"));
                let is_alive = if record.get("alive").is_truthy() { 1.0 } else { 0.0 };

                delay.add(vec![tag.clone()], delay_ms);
                alive.add(vec![tag.clone()], is_alive);
            }
        }
        Ok(None) => {}
        Err(e) => out.diagnostics.push(e),
    }

    out.families.push(delay);
    out.families.push(alive);
    out
}

/// Downlink and uplink byte counters per key of a `stats.<direction>` map.
fn extract_traffic(doc: &StatusDocument, section: &TrafficSection) -> Extraction {
    let mut out = Extraction::default();
    let mut downlink = MetricFamily::new(section.downlink);
    let mut uplink = MetricFamily::new(section.uplink);

    match doc.section(&section.path) {
        Ok(Some(entries)) => {
            for (source, record) in entries {
                let record = Field::Present(record);
                let path = format!("{}.{source}", section.path.join("."));
                if let Err(e) = record.as_object(&path) {
                    out.diagnostics.push(e);
                    continue;
                }

                let down = out.number_or_zero(record.get("downlink"), &format!("{path}.downlink"));
                let up = out.number_or_zero(record.get("uplink"), &format!("{path}.uplink"));

                downlink.add(vec![source.clone()], down);
                uplink.add(vec![source.clone()], up);
            }
        }
        Ok(None) => {}
        Err(e) => out.diagnostics.push(e),
    }

    out.families.push(downlink);
    out.families.push(uplink);
    out
}

/// `stats.inbound` traffic.
pub fn extract_inbound(doc: &StatusDocument) -> Extraction {
    extract_traffic(doc, &INBOUND)
}

/// `stats.outbound` traffic.
pub fn extract_outbound(doc: &StatusDocument) -> Extraction {
    extract_traffic(doc, &OUTBOUND)
}

/// `stats.user` traffic.
pub fn extract_user(doc: &StatusDocument) -> Extraction {
    extract_traffic(doc, &USER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> StatusDocument {
        StatusDocument::from_value(value).unwrap()
    }

    fn names(extraction: &Extraction) -> Vec<&'static str> {
        extraction.families.iter().map(|f| f.name()).collect()
    }

    fn value_of(extraction: &Extraction, name: &str, label: Option<&str>) -> Option<f64> {
        extraction
            .families
            .iter()
            .filter(|f| f.name() == name)
            .flat_map(|f| &f.samples)
            .find(|s| label.is_none_or(|l| s.label_values.first().map(String::as_str) == Some(l)))
            .map(|s| s.value)
    }

    #[test]
    fn test_memstats_full() {
        let d = doc(json!({"memstats": {
            "Alloc": 1, "TotalAlloc": 2, "Sys": 3, "Mallocs": 4, "Frees": 5, "HeapIdle": 6
        }}));
        let out = extract_memstats(&d);

        assert_eq!(
            names(&out),
            vec![
                "xray_memstats_alloc",
                "xray_memstats_totalalloc",
                "xray_memstats_sys",
                "xray_memstats_mallocs",
                "xray_memstats_frees",
            ]
        );
        assert_eq!(value_of(&out, "xray_memstats_sys", None), Some(3.0));
        assert_eq!(value_of(&out, "xray_memstats_frees", None), Some(5.0));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_memstats_absent_yields_five_zeroes() {
        let out = extract_memstats(&doc(json!({})));

        assert_eq!(out.families.len(), 5);
        assert_eq!(out.sample_count(), 5);
        assert!(out.families.iter().all(|f| f.samples[0].value == 0.0));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_memstats_mistyped_section() {
        let out = extract_memstats(&doc(json!({"memstats": "oops"})));

        assert_eq!(out.sample_count(), 5);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_null_sections_are_quiet() {
        let d = doc(json!({
            "memstats": null,
            "observatory": null,
            "stats": {"inbound": null, "outbound": null, "user": null}
        }));

        let memstats = extract_memstats(&d);
        assert_eq!(memstats.sample_count(), 5);
        assert!(memstats.diagnostics.is_empty());

        for routine in &Routine::ALL[1..] {
            let out = routine.extract(&d);
            assert_eq!(out.families.len(), 2, "{routine}");
            assert_eq!(out.sample_count(), 0, "{routine}");
            assert!(out.diagnostics.is_empty(), "{routine}");
        }
    }

    #[test]
    fn test_memstats_mistyped_field() {
        let out = extract_memstats(&doc(json!({"memstats": {"Alloc": [1], "Sys": 9}})));

        assert_eq!(value_of(&out, "xray_memstats_alloc", None), Some(0.0));
        assert_eq!(value_of(&out, "xray_memstats_sys", None), Some(9.0));
        assert_eq!(
            out.diagnostics,
            vec![FieldError::NotNumeric {
                path: "memstats.Alloc".to_string(),
                found: "an array"
            }]
        );
    }

    #[test]
    fn test_observatory_cardinality() {
        let d = doc(json!({"observatory": {
            "a": {"delay": 10, "alive": true},
            "b": {"delay": 20, "alive": false},
            "c": {"delay": 30}
        }}));
        let out = extract_observatory(&d);

        assert_eq!(names(&out), vec!["xray_observatory_delay", "xray_observatory_alive"]);
        assert_eq!(out.families[0].samples.len(), 3);
        assert_eq!(out.families[1].samples.len(), 3);
        assert_eq!(value_of(&out, "xray_observatory_delay", Some("b")), Some(20.0));
    }

    #[test]
    fn test_observatory_alive_coercion() {
        let d = doc(json!({"observatory": {
            "up": {"alive": true},
            "down": {"alive": false},
            "unknown": {}
        }}));
        let out = extract_observatory(&d);

        assert_eq!(value_of(&out, "xray_observatory_alive", Some("up")), Some(1.0));
        assert_eq!(value_of(&out, "xray_observatory_alive", Some("down")), Some(0.0));
        assert_eq!(value_of(&out, "xray_observatory_alive", Some("unknown")), Some(0.0));
        assert_eq!(value_of(&out, "xray_observatory_delay", Some("unknown")), Some(0.0));
    }

    #[test]
    fn test_observatory_absent_declares_empty_families() {
        let out = extract_observatory(&doc(json!({"memstats": {}})));

        assert_eq!(out.families.len(), 2);
        assert_eq!(out.sample_count(), 0);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_observatory_bad_record_is_skipped() {
        let d = doc(json!({"observatory": {
            "broken": 42,
            "fine": {"delay": 5, "alive": true}
        }}));
        let out = extract_observatory(&d);

        assert_eq!(out.families[0].samples.len(), 1);
        assert_eq!(out.families[0].samples[0].label_values, vec!["fine".to_string()]);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_observatory_section_not_an_object() {
        let out = extract_observatory(&doc(json!({"observatory": [1, 2, 3]})));

        assert_eq!(out.families.len(), 2);
        assert_eq!(out.sample_count(), 0);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn test_inbound_example_document() {
        let d = doc(json!({
            "memstats": {"Alloc": 100},
            "stats": {"inbound": {"eth0": {"uplink": 5, "downlink": 7}}}
        }));

        let inbound = extract_inbound(&d);
        assert_eq!(
            names(&inbound),
            vec!["xray_stats_inbound_downlink", "xray_stats_inbound_uplink"]
        );
        assert_eq!(value_of(&inbound, "xray_stats_inbound_uplink", Some("eth0")), Some(5.0));
        assert_eq!(value_of(&inbound, "xray_stats_inbound_downlink", Some("eth0")), Some(7.0));

        assert_eq!(extract_outbound(&d).sample_count(), 0);
        assert_eq!(extract_user(&d).sample_count(), 0);
        assert_eq!(extract_user(&d).families.len(), 2);
    }

    #[test]
    fn test_traffic_missing_direction_defaults_to_zero() {
        let d = doc(json!({"stats": {"user": {"bob@example.com": {"uplink": 12}}}}));
        let out = extract_user(&d);

        assert_eq!(value_of(&out, "xray_stats_user_uplink", Some("bob@example.com")), Some(12.0));
        assert_eq!(value_of(&out, "xray_stats_user_downlink", Some("bob@example.com")), Some(0.0));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_traffic_broken_stats_isolated_per_direction() {
        let d = doc(json!({"stats": {
            "inbound": "garbage",
            "outbound": {"direct": {"uplink": 1, "downlink": 2}}
        }}));

        let inbound = extract_inbound(&d);
        assert_eq!(inbound.sample_count(), 0);
        assert_eq!(
            inbound.diagnostics,
            vec![FieldError::NotAnObject {
                path: "stats.inbound".to_string(),
                found: "a string"
            }]
        );

        assert_eq!(extract_outbound(&d).sample_count(), 2);
    }

    #[test]
    fn test_traffic_null_value_is_diagnosed() {
        let d = doc(json!({"stats": {"outbound": {"direct": {"uplink": null, "downlink": "64"}}}}));
        let out = extract_outbound(&d);

        assert_eq!(value_of(&out, "xray_stats_outbound_uplink", Some("direct")), Some(0.0));
        assert_eq!(value_of(&out, "xray_stats_outbound_downlink", Some("direct")), Some(64.0));
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].to_string().contains("stats.outbound.direct.uplink"));
    }

    #[test]
    fn test_routines_match_their_extractors() {
        let d = doc(json!({"stats": {
            "inbound": {"eth0": {"uplink": 5, "downlink": 7}},
            "outbound": {"direct": {"uplink": 1, "downlink": 2}},
            "user": {"a@b": {"uplink": 3, "downlink": 4}}
        }}));

        assert_eq!(Routine::InboundStats.extract(&d), extract_inbound(&d));
        assert_eq!(Routine::OutboundStats.extract(&d), extract_outbound(&d));
        assert_eq!(Routine::UserStats.extract(&d), extract_user(&d));
        assert_eq!(Routine::UserStats.extract(&d).sample_count(), 2);
    }

    #[test]
    fn test_routine_metric_names_match_extraction() {
        let d = doc(json!({}));
        for routine in Routine::ALL {
            assert_eq!(names(&routine.extract(&d)), routine.metric_names(), "{routine}");
        }
    }
}
