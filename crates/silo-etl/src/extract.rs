//! Record extraction: one raw object into one validated tabular batch.
//!
//! Failure handling follows the run taxonomy strictly: a malformed line is
//! skipped with a warning, a schema mismatch or empty result drops the
//! whole batch with a warning, and any other failure (transport, encoding,
//! coercion) is logged as an error and yields nothing for that object.
//! Nothing in this module can abort a sibling extraction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use silo_core::storage::StorageBackend;

use crate::error::{EtlError, Result};
use crate::payload::{self, Literal};
use crate::schema::{self, TabularBatch};

/// Marker prefix on the embedded payload string.
const PAYLOAD_PREFIX: &str = "payload=";

/// Fetches and parses one raw object into a [`TabularBatch`].
///
/// Returns `None` when the object contributes nothing to the run, for any
/// reason; the reason has already been logged. Never propagates an error.
pub async fn extract(storage: &Arc<dyn StorageBackend>, key: &str) -> Option<TabularBatch> {
    match try_extract(storage, key).await {
        Ok(batch) => batch,
        Err(err) => {
            tracing::error!(key = %key, error = %err, "critical error while processing raw object");
            None
        }
    }
}

async fn try_extract(
    storage: &Arc<dyn StorageBackend>,
    key: &str,
) -> Result<Option<TabularBatch>> {
    tracing::debug!(key = %key, "processing raw object");

    let body = storage.get(key).await?;
    let text = std::str::from_utf8(&body).map_err(|e| EtlError::Parse {
        message: format!("object body is not valid UTF-8: {e}"),
    })?;

    let mut records: Vec<BTreeMap<String, Literal>> = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let line_no = index + 1;
        let outer: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %key, line = line_no, error = %err, "skipping malformed line");
                continue;
            }
        };

        // Lines without a payload carry no data and are passed over silently.
        let Some(data) = outer.get("data") else {
            continue;
        };
        let payload_str = data.as_str().ok_or_else(|| EtlError::Parse {
            message: format!("'data' field on line {line_no} is not a string"),
        })?;
        if payload_str.is_empty() {
            continue;
        }

        let literal = payload_str.strip_prefix(PAYLOAD_PREFIX).unwrap_or(payload_str);
        match payload::parse_mapping(literal) {
            Ok(fields) => records.push(fields),
            Err(err) => {
                tracing::warn!(key = %key, line = line_no, error = %err, "skipping malformed line");
            }
        }
    }

    if records.is_empty() {
        tracing::warn!(key = %key, "no valid records found");
        return Ok(None);
    }

    // Column set is the union of keys observed across all lines, matching
    // how a columnar frame would assemble the object.
    let observed: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        rows.push(schema::coerce_record(record)?);
    }

    if observed != schema::expected_columns() {
        tracing::warn!(
            key = %key,
            observed = ?observed,
            "final column mismatch after processing; ignoring object"
        );
        return Ok(None);
    }

    Ok(Some(TabularBatch {
        source_key: key.to_string(),
        rows,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use silo_core::storage::MemoryBackend;

    const VALID_LINE: &str = r#"{"data":"payload={'store_id':1,'transaction_id':2,'product_id':3,'quantity':5,'datetime':'2025-01-01'}"}"#;

    async fn store_with(key: &str, body: &str) -> Arc<dyn StorageBackend> {
        let backend = MemoryBackend::new();
        backend
            .put(key, Bytes::from(body.to_string()), None)
            .await
            .unwrap();
        Arc::new(backend)
    }

    #[tokio::test]
    async fn valid_object_yields_batch() {
        let body = format!("{VALID_LINE}\n{VALID_LINE}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        let batch = extract(&storage, "in/a.jsonl").await.expect("batch");
        assert_eq!(batch.source_key, "in/a.jsonl");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].quantity, Some(5));
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let body = format!("{VALID_LINE}\nnot json at all\n");
        let storage = store_with("in/a.jsonl", &body).await;

        let batch = extract(&storage, "in/a.jsonl").await.expect("batch");
        assert_eq!(batch.rows.len(), 1);
    }

    #[tokio::test]
    async fn malformed_inner_literal_is_skipped() {
        let bad_inner = r#"{"data":"payload={'store_id': __import__}"}"#;
        let body = format!("{VALID_LINE}\n{bad_inner}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        let batch = extract(&storage, "in/a.jsonl").await.expect("batch");
        assert_eq!(batch.rows.len(), 1);
    }

    #[tokio::test]
    async fn lines_without_data_field_are_passed_over() {
        let body = format!("{{\"other\": 1}}\n{VALID_LINE}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        let batch = extract(&storage, "in/a.jsonl").await.expect("batch");
        assert_eq!(batch.rows.len(), 1);
    }

    #[tokio::test]
    async fn all_lines_malformed_yields_nothing() {
        let storage = store_with("in/a.jsonl", "garbage\nmore garbage\n").await;
        assert!(extract(&storage, "in/a.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn empty_object_yields_nothing() {
        let storage = store_with("in/a.jsonl", "").await;
        assert!(extract(&storage, "in/a.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn column_superset_drops_whole_batch() {
        let extra = r#"{"data":"payload={'store_id':1,'transaction_id':2,'product_id':3,'quantity':5,'datetime':'2025-01-01','surprise':9}"}"#;
        let body = format!("{VALID_LINE}\n{extra}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        assert!(extract(&storage, "in/a.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn column_subset_drops_whole_batch() {
        let partial = r#"{"data":"payload={'store_id':1,'quantity':5}"}"#;
        let storage = store_with("in/a.jsonl", partial).await;

        assert!(extract(&storage, "in/a.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn uncoercible_value_drops_whole_batch() {
        let bad_type = r#"{"data":"payload={'store_id':'one','transaction_id':2,'product_id':3,'quantity':5,'datetime':'2025-01-01'}"}"#;
        let body = format!("{VALID_LINE}\n{bad_type}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        assert!(extract(&storage, "in/a.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn missing_object_yields_nothing() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        assert!(extract(&storage, "in/absent.jsonl").await.is_none());
    }

    #[tokio::test]
    async fn missing_key_in_one_line_becomes_null() {
        // One line omits quantity; the object still observes the full column
        // set through its other lines, so the batch survives with a null.
        let no_quantity = r#"{"data":"payload={'store_id':1,'transaction_id':2,'product_id':3,'datetime':'2025-01-01'}"}"#;
        let body = format!("{VALID_LINE}\n{no_quantity}\n");
        let storage = store_with("in/a.jsonl", &body).await;

        let batch = extract(&storage, "in/a.jsonl").await.expect("batch");
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[1].quantity, None);
    }
}
