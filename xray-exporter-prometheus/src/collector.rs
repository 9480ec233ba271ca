//! Per-scrape collection: fetch the status document once, run every
//! extraction routine over it, hand back the result.

use std::sync::Arc;

use tracing::{debug, error, warn};
use xray_common::StatusDocument;

use crate::extract::Routine;
use crate::fetcher::{FetchError, Fetcher};
use crate::metrics::{MetricFamily, MetricSample, render};

/// Metric families produced by one scrape.
///
/// Built fresh on every call to [`XrayCollector::collect`] and never cached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scrape {
    families: Vec<MetricFamily>,
}

impl Scrape {
    /// A scrape with no families at all (the upstream could not be read).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    /// Look up a family by metric name.
    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.name() == name)
    }

    /// All samples, family by family.
    pub fn samples(&self) -> impl Iterator<Item = &MetricSample> {
        self.families.iter().flat_map(|f| f.samples.iter())
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        render(&self.families)
    }
}

fn into_samples(family: MetricFamily) -> Vec<MetricSample> {
    family.samples
}

impl IntoIterator for Scrape {
    type Item = MetricSample;
    type IntoIter = std::iter::FlatMap<
        std::vec::IntoIter<MetricFamily>,
        Vec<MetricSample>,
        fn(MetricFamily) -> Vec<MetricSample>,
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.families
            .into_iter()
            .flat_map(into_samples as fn(MetricFamily) -> Vec<MetricSample>)
    }
}

/// Run every extraction routine over `doc`, in order, and log diagnostics.
pub fn extract_all(doc: &StatusDocument) -> Scrape {
    let mut families = Vec::new();

    for routine in Routine::ALL {
        let extraction = routine.extract(doc);

        for diagnostic in &extraction.diagnostics {
            warn!(routine = %routine, error = %diagnostic, "Malformed status document section");
        }

        debug!(
            routine = %routine,
            samples = extraction.sample_count(),
            "Extracted metrics"
        );

        families.extend(extraction.families);
    }

    Scrape { families }
}

/// Translates the XRay `/debug/vars` page into metric families on demand.
///
/// Stateless apart from the immutable fetcher, so concurrent scrapes never
/// contend on anything.
#[derive(Debug, Clone)]
pub struct XrayCollector {
    fetcher: Fetcher,
}

impl XrayCollector {
    /// Create a collector around an existing fetcher.
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Create a collector for the given upstream URL.
    pub fn from_endpoint(endpoint: impl Into<String>) -> Result<Self, FetchError> {
        Ok(Self::new(Fetcher::new(endpoint)?))
    }

    /// The upstream URL.
    pub fn endpoint(&self) -> &str {
        self.fetcher.url()
    }

    /// Fetch once and extract. A failed fetch yields an empty scrape.
    pub async fn collect(&self) -> Scrape {
        match self.fetcher.fetch().await {
            Ok(doc) => extract_all(&doc),
            Err(e) => {
                error!(endpoint = %self.fetcher.url(), error = %e, "Error fetching metrics");
                Scrape::empty()
            }
        }
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<XrayCollector>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn example_doc() -> StatusDocument {
        StatusDocument::from_value(json!({
            "memstats": {"Alloc": 100},
            "stats": {"inbound": {"eth0": {"uplink": 5, "downlink": 7}}}
        }))
        .unwrap()
    }

    fn sample_value(scrape: &Scrape, name: &str, source: Option<&str>) -> Option<f64> {
        scrape
            .samples()
            .find(|s| s.name() == name && s.label("source") == source)
            .map(|s| s.value)
    }

    #[test]
    fn test_extract_all_family_order() {
        let scrape = extract_all(&example_doc());
        let names: Vec<&str> = scrape.families().iter().map(|f| f.name()).collect();

        assert_eq!(
            names,
            vec![
                "xray_memstats_alloc",
                "xray_memstats_totalalloc",
                "xray_memstats_sys",
                "xray_memstats_mallocs",
                "xray_memstats_frees",
                "xray_observatory_delay",
                "xray_observatory_alive",
                "xray_stats_inbound_downlink",
                "xray_stats_inbound_uplink",
                "xray_stats_outbound_downlink",
                "xray_stats_outbound_uplink",
                "xray_stats_user_downlink",
                "xray_stats_user_uplink",
            ]
        );
    }

    #[test]
    fn test_extract_all_example_values() {
        let scrape = extract_all(&example_doc());

        assert_eq!(sample_value(&scrape, "xray_memstats_alloc", None), Some(100.0));
        assert_eq!(sample_value(&scrape, "xray_memstats_totalalloc", None), Some(0.0));
        assert_eq!(
            sample_value(&scrape, "xray_stats_inbound_uplink", Some("eth0")),
            Some(5.0)
        );
        assert_eq!(
            sample_value(&scrape, "xray_stats_inbound_downlink", Some("eth0")),
            Some(7.0)
        );
        assert!(scrape.family("xray_observatory_delay").unwrap().samples.is_empty());
        assert!(scrape.family("xray_stats_user_uplink").unwrap().samples.is_empty());
        assert_eq!(scrape.samples().count(), 7);
    }

    #[test]
    fn test_one_broken_section_does_not_hide_others() {
        let doc = StatusDocument::from_value(json!({
            "memstats": {"Sys": 1},
            "observatory": "not a map",
            "stats": {
                "inbound": [],
                "outbound": {"direct": {"uplink": 1, "downlink": 2}},
                "user": {"u": {"uplink": 3, "downlink": 4}}
            }
        }))
        .unwrap();

        let scrape = extract_all(&doc);

        assert_eq!(scrape.families().len(), 13);
        assert_eq!(sample_value(&scrape, "xray_memstats_sys", None), Some(1.0));
        assert_eq!(
            sample_value(&scrape, "xray_stats_outbound_downlink", Some("direct")),
            Some(2.0)
        );
        assert_eq!(sample_value(&scrape, "xray_stats_user_uplink", Some("u")), Some(3.0));
        assert_eq!(scrape.family("xray_stats_inbound_uplink").unwrap().samples.len(), 0);
    }

    #[test]
    fn test_scrape_into_iter_flattens() {
        let samples: Vec<MetricSample> = extract_all(&example_doc()).into_iter().collect();

        assert_eq!(samples.len(), 7);
        assert_eq!(samples[0].name(), "xray_memstats_alloc");
    }

    #[test]
    fn test_empty_scrape_renders_nothing() {
        let scrape = Scrape::empty();

        assert!(scrape.is_empty());
        assert_eq!(scrape.render(), "");
        assert_eq!(scrape.into_iter().count(), 0);
    }

    #[tokio::test]
    async fn test_collect_with_unreachable_upstream_is_empty() {
        let fetcher =
            Fetcher::with_timeout("http://127.0.0.1:9/debug/vars", Duration::from_secs(1)).unwrap();
        let collector = XrayCollector::new(fetcher);

        let scrape = collector.collect().await;
        assert!(scrape.is_empty());
    }
}
