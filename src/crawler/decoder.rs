//! Response decoding
//!
//! The crawler does not know the shape of the endpoint's responses. It is
//! handed a [`RecordDecoder`] at construction and only relies on what that
//! returns: the records worth keeping, every identifier the endpoint
//! reported, and the reported result count.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while decoding a response body
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unexpected response shape: {0}")]
    InvalidShape(String),

    #[error("item {index} has an empty key")]
    EmptyKey { index: usize },
}

/// A single identifier and its descriptive fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier; records are deduplicated on this key
    pub key: String,

    /// Descriptive fields as reported by the endpoint
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Adds a descriptive field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// One decoded result page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPage {
    /// Records to keep in the collected set
    pub records: Vec<Record>,

    /// Keys of every item on the page, kept or not
    pub observed: Vec<String>,

    /// Result count the endpoint reported for the query
    pub count: usize,
}

/// Turns a raw endpoint response into records
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, raw: &Value) -> Result<DecodedPage, DecodeError>;
}

/// Decoder for search-assist style responses
///
/// Expects `{"data": {"items": [{"symbol": .., "name": .., "exch": ..,
/// "type": .., "exchDisp": .., "typeDisp": ..}]}}`. The reported count is
/// the number of items on the page; records are the items whose `type`
/// matches `record_type`, or all items when no type is configured.
#[derive(Debug, Clone, Default)]
pub struct SearchAssistDecoder {
    record_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchAssistResponse {
    data: SearchAssistData,
}

#[derive(Debug, Deserialize)]
struct SearchAssistData {
    #[serde(default)]
    items: Vec<SearchAssistItem>,
}

#[derive(Debug, Deserialize)]
struct SearchAssistItem {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exch: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, rename = "exchDisp")]
    exch_disp: Option<String>,
    #[serde(default, rename = "typeDisp")]
    type_disp: Option<String>,
}

impl SearchAssistDecoder {
    pub fn new(record_type: Option<String>) -> Self {
        Self { record_type }
    }

    fn keeps(&self, item: &SearchAssistItem) -> bool {
        match &self.record_type {
            Some(wanted) => item.kind.as_deref() == Some(wanted.as_str()),
            None => true,
        }
    }
}

impl RecordDecoder for SearchAssistDecoder {
    fn decode(&self, raw: &Value) -> Result<DecodedPage, DecodeError> {
        let response = SearchAssistResponse::deserialize(raw)
            .map_err(|e| DecodeError::InvalidShape(e.to_string()))?;
        let items = response.data.items;

        let mut page = DecodedPage {
            count: items.len(),
            ..DecodedPage::default()
        };

        for (index, item) in items.into_iter().enumerate() {
            if item.symbol.trim().is_empty() {
                return Err(DecodeError::EmptyKey { index });
            }
            page.observed.push(item.symbol.clone());

            if !self.keeps(&item) {
                continue;
            }

            let mut record = Record::new(item.symbol);
            for (name, value) in [
                ("name", item.name),
                ("exchange", item.exch),
                ("type", item.kind),
                ("exchange_display", item.exch_disp),
                ("type_display", item.type_disp),
            ] {
                if let Some(value) = value {
                    record.fields.insert(name.to_string(), value);
                }
            }
            page.records.push(record);
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> Value {
        json!({
            "data": {
                "items": [
                    {"symbol": "AAPL", "name": "Apple Inc.", "exch": "NMS", "type": "S",
                     "exchDisp": "NASDAQ", "typeDisp": "Equity"},
                    {"symbol": "AAPL.MX", "name": "Apple Inc.", "exch": "MEX", "type": "S"},
                    {"symbol": "^AAPL", "name": "Apple index", "exch": "IDX", "type": "I"}
                ]
            },
            "meta": {}
        })
    }

    #[test]
    fn test_decode_all_items() {
        let decoder = SearchAssistDecoder::default();
        let page = decoder.decode(&sample_response()).unwrap();

        assert_eq!(page.count, 3);
        assert_eq!(page.records.len(), 3);
        assert_eq!(page.observed, vec!["AAPL", "AAPL.MX", "^AAPL"]);

        let apple = &page.records[0];
        assert_eq!(apple.key, "AAPL");
        assert_eq!(apple.field("name"), Some("Apple Inc."));
        assert_eq!(apple.field("exchange_display"), Some("NASDAQ"));
        assert_eq!(page.records[1].field("type_display"), None);
    }

    #[test]
    fn test_record_type_filter_keeps_count() {
        let decoder = SearchAssistDecoder::new(Some("I".to_string()));
        let page = decoder.decode(&sample_response()).unwrap();

        assert_eq!(page.count, 3);
        assert_eq!(page.observed.len(), 3);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].key, "^AAPL");
    }

    #[test]
    fn test_empty_items() {
        let decoder = SearchAssistDecoder::default();
        let page = decoder.decode(&json!({"data": {"items": []}})).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_missing_data_is_decode_error() {
        let decoder = SearchAssistDecoder::default();
        let result = decoder.decode(&json!({"error": "bad request"}));
        assert!(matches!(result, Err(DecodeError::InvalidShape(_))));
    }

    #[test]
    fn test_empty_symbol_is_decode_error() {
        let decoder = SearchAssistDecoder::default();
        let result = decoder.decode(&json!({"data": {"items": [{"symbol": " "}]}}));
        assert!(matches!(result, Err(DecodeError::EmptyKey { index: 0 })));
    }
}
