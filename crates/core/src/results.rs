//! Load generator reports.
//!
//! The shape follows oha's `--output-format=json` document. Timings are in
//! seconds; fields oha leaves `null` when nothing completed are optional.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub success_rate: f64,
    pub total: f64,
    pub slowest: Option<f64>,
    pub fastest: Option<f64>,
    pub average: Option<f64>,
    pub requests_per_sec: f64,
    pub total_data: u64,
    pub size_per_request: Option<u64>,
    pub size_per_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Percentiles {
    pub p10: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
    #[serde(rename = "p99.9")]
    pub p99_9: Option<f64>,
    #[serde(rename = "p99.99")]
    pub p99_99: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpsStats {
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub average: Option<f64>,
    pub fastest: Option<f64>,
    pub slowest: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Details {
    #[serde(rename = "DNSDialup")]
    pub dns_dialup: Timing,
    #[serde(rename = "DNSLookup")]
    pub dns_lookup: Timing,
}

/// Parsed load generator report. Never mutated after parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTestResult {
    pub summary: Summary,
    /// Bucket upper bound (seconds, as printed by oha) to request count.
    pub response_time_histogram: BTreeMap<String, u64>,
    pub latency_percentiles: Percentiles,
    pub rps: RpsStats,
    pub details: Details,
    pub status_code_distribution: BTreeMap<u16, u64>,
    pub error_distribution: BTreeMap<String, u64>,
}

impl LoadTestResult {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Error entries whose label is not in `tolerated`.
    pub fn unexpected_errors(&self, tolerated: &[String]) -> BTreeMap<String, u64> {
        self.error_distribution
            .iter()
            .filter(|(label, _)| !tolerated.iter().any(|t| t == *label))
            .map(|(label, count)| (label.clone(), *count))
            .collect()
    }

    /// Fails unless every reported error label is tolerated.
    pub fn ensure_no_errors(&self, tolerated: &[String]) -> Result<()> {
        let errors = self.unexpected_errors(tolerated);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::UnexpectedResponseErrors { errors })
        }
    }
}

/// A [`LoadTestResult`] tagged with the case that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedResult {
    pub name: String,
    #[serde(flatten)]
    pub result: LoadTestResult,
}

impl NamedResult {
    pub fn new(name: impl Into<String>, result: LoadTestResult) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OHA_REPORT: &str = r#"{
        "summary": {
            "successRate": 1.0,
            "total": 1.0012,
            "slowest": 0.0021,
            "fastest": 0.00004,
            "average": 0.0000612,
            "requestsPerSec": 16341.2,
            "totalData": 212472,
            "sizePerRequest": 13,
            "sizePerSec": 212216.9
        },
        "responseTimeHistogram": { "0.00004": 1, "0.0002": 16342 },
        "latencyPercentiles": {
            "p10": 0.00005, "p25": 0.000055, "p50": 0.00006, "p75": 0.000063,
            "p90": 0.00007, "p95": 0.000075, "p99": 0.0001,
            "p99.9": 0.0003, "p99.99": 0.0019
        },
        "rps": {
            "mean": 16341.0, "stddev": 120.5, "max": 16720.0, "min": 15950.0,
            "percentiles": {
                "p10": 16100.0, "p25": 16250.0, "p50": 16340.0, "p75": 16420.0,
                "p90": 16500.0, "p95": 16560.0, "p99": 16700.0,
                "p99.9": 16720.0, "p99.99": 16720.0
            }
        },
        "details": {
            "DNSDialup": { "average": 0.00002, "fastest": 0.00001, "slowest": 0.00004 },
            "DNSLookup": { "average": 0.000001, "fastest": 0.0000005, "slowest": 0.000002 }
        },
        "statusCodeDistribution": { "200": 16343 },
        "errorDistribution": {}
    }"#;

    #[test]
    fn parses_full_oha_report() {
        let result = LoadTestResult::from_json(OHA_REPORT).unwrap();
        assert_eq!(result.summary.success_rate, 1.0);
        assert_eq!(result.summary.size_per_request, Some(13));
        assert_eq!(result.latency_percentiles.p50, Some(0.00006));
        assert_eq!(result.latency_percentiles.p99_99, Some(0.0019));
        assert_eq!(result.rps.percentiles.p90, Some(16500.0));
        assert_eq!(result.details.dns_dialup.slowest, Some(0.00004));
        assert_eq!(result.status_code_distribution.get(&200), Some(&16343));
        assert!(result.error_distribution.is_empty());
    }

    #[test]
    fn null_fields_parse_as_missing() {
        let json = r#"{
            "summary": { "successRate": 0.0, "average": null, "sizePerRequest": null },
            "latencyPercentiles": { "p50": null },
            "errorDistribution": { "connection refused": 12 }
        }"#;
        let result = LoadTestResult::from_json(json).unwrap();
        assert_eq!(result.summary.average, None);
        assert_eq!(result.latency_percentiles.p50, None);
        assert_eq!(result.error_distribution.get("connection refused"), Some(&12));
    }

    #[test]
    fn malformed_report_is_invalid() {
        let err = LoadTestResult::from_json("not json").unwrap_err();
        assert!(matches!(err, Error::InvalidReport(_)));
    }

    mod error_distribution {
        use super::*;

        fn with_errors(entries: &[(&str, u64)]) -> LoadTestResult {
            LoadTestResult {
                error_distribution: entries
                    .iter()
                    .map(|(label, count)| (label.to_string(), *count))
                    .collect(),
                ..LoadTestResult::default()
            }
        }

        #[test]
        fn empty_distribution_passes() {
            assert!(with_errors(&[]).ensure_no_errors(&[]).is_ok());
        }

        #[test]
        fn untolerated_label_fails_with_distribution() {
            let result = with_errors(&[("connection closed before message completed", 2)]);
            match result.ensure_no_errors(&[]) {
                Err(Error::UnexpectedResponseErrors { errors }) => {
                    assert_eq!(
                        errors.get("connection closed before message completed"),
                        Some(&2)
                    );
                }
                other => panic!("expected UnexpectedResponseErrors, got {other:?}"),
            }
        }

        #[test]
        fn tolerated_label_passes() {
            let result = with_errors(&[("aborted due to deadline", 3)]);
            let tolerated = vec!["aborted due to deadline".to_string()];
            assert!(result.ensure_no_errors(&tolerated).is_ok());
        }

        #[test]
        fn tolerated_label_does_not_hide_others() {
            let result = with_errors(&[("aborted due to deadline", 3), ("connection reset", 1)]);
            let tolerated = vec!["aborted due to deadline".to_string()];
            let errors = result.unexpected_errors(&tolerated);
            assert_eq!(errors.len(), 1);
            assert_eq!(errors.get("connection reset"), Some(&1));
        }
    }

    #[test]
    fn named_result_serializes_flat() {
        let named = NamedResult::new("native", LoadTestResult::default());
        let value = serde_json::to_value(&named).unwrap();
        assert_eq!(value["name"], "native");
        assert!(value.get("summary").is_some());
    }
}
