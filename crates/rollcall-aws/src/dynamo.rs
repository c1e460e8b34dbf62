//! DynamoDB-backed record store.
//!
//! Items come back as attribute maps; [`attr_to_json`] flattens them into
//! the JSON records the rest of the workflow consumes, and [`json_to_attr`]
//! goes the other way for enrollment.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose, Engine as _};
use rollcall_core::records::{RecordStore, RecordStoreError};
use rollcall_core::types::Record;

/// One table keyed by a single string attribute (the identifier derived
/// from a reference image's key).
#[derive(Clone)]
pub struct DynamoRecordStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
    key_field: String,
}

impl DynamoRecordStore {
    pub fn new(
        client: aws_sdk_dynamodb::Client,
        table: impl Into<String>,
        key_field: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            key_field: key_field.into(),
        }
    }

    fn key_attr(&self, identifier: &str) -> AttributeValue {
        AttributeValue::S(identifier.to_string())
    }

    /// Writes a record under `identifier`, overwriting any existing item.
    /// The key attribute is always set from `identifier`, even when the
    /// record carries a conflicting value for it.
    pub async fn store(&self, identifier: &str, record: &Record) -> Result<(), RecordStoreError> {
        let mut item: HashMap<String, AttributeValue> = record
            .iter()
            .map(|(name, value)| (name.clone(), json_to_attr(value)))
            .collect();
        item.insert(self.key_field.clone(), self.key_attr(identifier));

        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| RecordStoreError::Write {
                identifier: identifier.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;
        tracing::debug!(identifier, table = %self.table, "record stored");
        Ok(())
    }

    pub async fn remove(&self, identifier: &str) -> Result<(), RecordStoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(&self.key_field, self.key_attr(identifier))
            .send()
            .await
            .map_err(|err| RecordStoreError::Write {
                identifier: identifier.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DynamoRecordStore {
    async fn fetch(&self, identifier: &str) -> Result<Option<Record>, RecordStoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(&self.key_field, self.key_attr(identifier))
            .send()
            .await
            .map_err(|err| RecordStoreError::Lookup {
                identifier: identifier.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;

        Ok(output.item().map(|item| {
            item.iter()
                .map(|(name, attr)| (name.clone(), attr_to_json(attr)))
                .collect()
        }))
    }
}

/// Converts one DynamoDB attribute to JSON. Total: unrepresentable inputs
/// degrade (numbers JSON cannot carry stay strings, unknown attribute
/// kinds become null) instead of failing the lookup.
pub fn attr_to_json(attr: &AttributeValue) -> serde_json::Value {
    match attr {
        AttributeValue::S(s) => serde_json::Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n),
        AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
        AttributeValue::Null(_) => serde_json::Value::Null,
        AttributeValue::B(blob) => {
            serde_json::Value::String(general_purpose::STANDARD.encode(blob.as_ref()))
        }
        AttributeValue::L(items) => {
            serde_json::Value::Array(items.iter().map(attr_to_json).collect())
        }
        AttributeValue::M(map) => map
            .iter()
            .map(|(name, value)| (name.clone(), attr_to_json(value)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        AttributeValue::Ss(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|s| serde_json::Value::String(s.clone()))
                .collect(),
        ),
        AttributeValue::Ns(items) => {
            serde_json::Value::Array(items.iter().map(|n| parse_number(n)).collect())
        }
        AttributeValue::Bs(blobs) => serde_json::Value::Array(
            blobs
                .iter()
                .map(|blob| {
                    serde_json::Value::String(general_purpose::STANDARD.encode(blob.as_ref()))
                })
                .collect(),
        ),
        _ => serde_json::Value::Null,
    }
}

/// Converts one JSON value to a DynamoDB attribute.
pub fn json_to_attr(value: &serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null(true),
        serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
        serde_json::Value::Number(n) => AttributeValue::N(n.to_string()),
        serde_json::Value::String(s) => AttributeValue::S(s.clone()),
        serde_json::Value::Array(items) => {
            AttributeValue::L(items.iter().map(json_to_attr).collect())
        }
        serde_json::Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(name, value)| (name.clone(), json_to_attr(value)))
                .collect(),
        ),
    }
}

/// DynamoDB numbers are decimal strings wider than f64; keep the exact
/// string whenever JSON cannot represent the value.
fn parse_number(n: &str) -> serde_json::Value {
    if let Ok(i) = n.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(n.to_string()))
}
