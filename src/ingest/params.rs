use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::parser::Format;
use super::IngestError;
use crate::attime::{AtTime, TimeResolver};
use crate::segment::{Key, KeyParser, SegmentKeyParser};

/// Sample rate assumed when the request does not carry a usable one
pub const DEFAULT_SAMPLE_RATE: u32 = 100;
pub const DEFAULT_SPY_NAME: &str = "unknown";
pub const DEFAULT_UNITS: &str = "samples";
pub const DEFAULT_AGGREGATION_TYPE: &str = "sum";

pub const CONTENT_TYPE_TREE: &str = "binary/octet-stream+tree";
pub const CONTENT_TYPE_TRIE: &str = "binary/octet-stream+trie";

/// Fully defaulted metadata for one ingest request
#[derive(Debug, Clone)]
pub struct IngestParams {
    pub format: Format,
    pub key: Key,
    pub spy_name: String,
    pub sample_rate: u32,
    pub units: String,
    pub aggregation_type: String,
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
    /// Malformed values that were replaced by defaults
    pub warnings: Vec<ParamWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamWarning {
    InvalidSampleRate(String),
}

/// Resolves ingest parameters from the query string and headers
#[derive(Clone)]
pub struct ParamResolver {
    time: Arc<dyn TimeResolver>,
    keys: Arc<dyn KeyParser>,
    default_sample_rate: u32,
}

impl ParamResolver {
    pub fn new(
        time: Arc<dyn TimeResolver>,
        keys: Arc<dyn KeyParser>,
        default_sample_rate: u32,
    ) -> Self {
        Self {
            time,
            keys,
            default_sample_rate,
        }
    }

    pub fn default_sample_rate(&self) -> u32 {
        self.default_sample_rate
    }

    pub fn resolve(
        &self,
        query: &HashMap<String, String>,
        headers: &HeaderMap,
    ) -> Result<IngestParams, IngestError> {
        let param = |name: &str| query.get(name).map(String::as_str).filter(|v| !v.is_empty());
        let mut warnings = Vec::new();

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type)
            .unwrap_or_default();
        let format = select_format(param("format"), &content_type);

        let from = param("from").map_or_else(|| self.time.now(), |t| self.time.resolve(t));
        let until = param("until").map_or_else(|| self.time.now(), |t| self.time.resolve(t));

        let sample_rate = match param("sampleRate") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(rate) if rate > 0 => rate,
                _ => {
                    tracing::warn!(
                        "invalid sample rate '{}', using default {}",
                        raw,
                        self.default_sample_rate
                    );
                    warnings.push(ParamWarning::InvalidSampleRate(raw.to_string()));
                    self.default_sample_rate
                }
            },
            None => self.default_sample_rate,
        };

        let spy_name = param("spyName").unwrap_or(DEFAULT_SPY_NAME).to_string();
        let units = param("units").unwrap_or(DEFAULT_UNITS).to_string();
        let aggregation_type = param("aggregationType")
            .unwrap_or(DEFAULT_AGGREGATION_TYPE)
            .to_string();

        let key = self
            .keys
            .parse_key(param("name").unwrap_or_default())
            .map_err(|source| IngestError::InvalidParameter {
                field: "name",
                source,
            })?;

        Ok(IngestParams {
            format,
            key,
            spy_name,
            sample_rate,
            units,
            aggregation_type,
            from,
            until,
            warnings,
        })
    }
}

impl Default for ParamResolver {
    fn default() -> Self {
        Self::new(
            Arc::new(AtTime::new()),
            Arc::new(SegmentKeyParser),
            DEFAULT_SAMPLE_RATE,
        )
    }
}

/// First match wins: tree, trie, lines, then the groups default.
fn select_format(format: Option<&str>, content_type: &str) -> Format {
    match (format, content_type) {
        (Some("tree"), _) | (_, CONTENT_TYPE_TREE) => Format::Tree,
        (Some("trie"), _) | (_, CONTENT_TYPE_TRIE) => Format::Trie,
        (Some("lines"), _) => Format::Lines,
        _ => Format::Groups,
    }
}

/// Media type without parameters, lowercased
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn resolver() -> ParamResolver {
        ParamResolver::new(
            Arc::new(AtTime::fixed(fixed_now())),
            Arc::new(SegmentKeyParser),
            DEFAULT_SAMPLE_RATE,
        )
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    fn format_of(pairs: &[(&str, &str)], headers: &HeaderMap) -> Format {
        let mut pairs = pairs.to_vec();
        pairs.push(("name", "app.name"));
        resolver().resolve(&query(&pairs), headers).unwrap().format
    }

    #[test]
    fn test_defaults() {
        let params = resolver()
            .resolve(&query(&[("name", "app.name")]), &HeaderMap::new())
            .unwrap();

        assert_eq!(params.format, Format::Groups);
        assert_eq!(params.key.app_name(), "app.name");
        assert_eq!(params.spy_name, "unknown");
        assert_eq!(params.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(params.units, "samples");
        assert_eq!(params.aggregation_type, "sum");
        assert_eq!(params.from, fixed_now());
        assert_eq!(params.until, fixed_now());
        assert!(params.warnings.is_empty());
    }

    #[test]
    fn test_explicit_values_pass_through() {
        let params = resolver()
            .resolve(
                &query(&[
                    ("name", "app.cpu{env=prod}"),
                    ("spyName", "pyspy"),
                    ("sampleRate", "250"),
                    ("units", "objects"),
                    ("aggregationType", "average"),
                    ("from", "1600000000"),
                    ("until", "now"),
                ]),
                &HeaderMap::new(),
            )
            .unwrap();

        assert_eq!(params.spy_name, "pyspy");
        assert_eq!(params.sample_rate, 250);
        assert_eq!(params.units, "objects");
        assert_eq!(params.aggregation_type, "average");
        assert_eq!(params.from.timestamp(), 1_600_000_000);
        assert_eq!(params.until, fixed_now());
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let params = resolver()
            .resolve(
                &query(&[("name", "app.name"), ("spyName", ""), ("units", ""), ("sampleRate", "")]),
                &HeaderMap::new(),
            )
            .unwrap();

        assert_eq!(params.spy_name, "unknown");
        assert_eq!(params.units, "samples");
        assert_eq!(params.sample_rate, DEFAULT_SAMPLE_RATE);
        assert!(params.warnings.is_empty());
    }

    #[test]
    fn test_format_selection() {
        let none = HeaderMap::new();

        assert_eq!(format_of(&[("format", "tree")], &none), Format::Tree);
        assert_eq!(format_of(&[("format", "trie")], &none), Format::Trie);
        assert_eq!(format_of(&[("format", "lines")], &none), Format::Lines);
        assert_eq!(format_of(&[("format", "groups")], &none), Format::Groups);
        assert_eq!(format_of(&[("format", "bogus")], &none), Format::Groups);
        assert_eq!(format_of(&[], &none), Format::Groups);

        assert_eq!(format_of(&[], &content_type(CONTENT_TYPE_TREE)), Format::Tree);
        assert_eq!(format_of(&[], &content_type(CONTENT_TYPE_TRIE)), Format::Trie);
        assert_eq!(
            format_of(&[], &content_type("binary/octet-stream+trie; charset=binary")),
            Format::Trie
        );
        assert_eq!(format_of(&[], &content_type("text/plain")), Format::Groups);
    }

    #[test]
    fn test_format_precedence() {
        // tree wins over a trie content type, trie content type wins over lines
        assert_eq!(
            format_of(&[("format", "tree")], &content_type(CONTENT_TYPE_TRIE)),
            Format::Tree
        );
        assert_eq!(
            format_of(&[("format", "trie")], &content_type(CONTENT_TYPE_TREE)),
            Format::Tree
        );
        assert_eq!(
            format_of(&[("format", "lines")], &content_type(CONTENT_TYPE_TRIE)),
            Format::Trie
        );
    }

    #[test]
    fn test_malformed_sample_rate_is_lenient() {
        for raw in ["notanumber", "-5", "0", "1.5", "99999999999"] {
            let params = resolver()
                .resolve(&query(&[("name", "app.name"), ("sampleRate", raw)]), &HeaderMap::new())
                .unwrap();

            assert_eq!(params.sample_rate, DEFAULT_SAMPLE_RATE, "input {}", raw);
            assert_eq!(
                params.warnings,
                vec![ParamWarning::InvalidSampleRate(raw.to_string())]
            );
        }
    }

    #[test]
    fn test_missing_or_invalid_name_fails() {
        for q in [query(&[]), query(&[("name", "")]), query(&[("name", "app{env")])] {
            let err = resolver().resolve(&q, &HeaderMap::new()).unwrap_err();
            assert!(matches!(
                err,
                IngestError::InvalidParameter { field: "name", .. }
            ));
            assert!(err.to_string().starts_with("name:"));
        }
    }

    #[test]
    fn test_time_range_is_not_cross_validated() {
        let params = resolver()
            .resolve(
                &query(&[("name", "app.name"), ("from", "now"), ("until", "now-1h")]),
                &HeaderMap::new(),
            )
            .unwrap();

        assert!(params.from > params.until);
    }
}
