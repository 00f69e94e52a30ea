//! Change-feed dispatcher.
//!
//! Consumes store change records and starts one workflow execution per newly
//! inserted `Requested` record. Records are handled independently: a failure
//! to start one execution is logged and the batch continues.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use vending_core::{fields, AccountStatus};

use crate::ports::WorkflowLauncher;

// ── Change records ───────────────────────────────────────────────────────

/// Kind of change carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
    #[serde(other)]
    Unknown,
}

/// Images attached to a change record, in typed attribute form
/// (`{"S": "..."}`, `{"BOOL": true}`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeImages {
    #[serde(rename = "Keys", default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Map<String, Value>>,
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Map<String, Value>>,
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Map<String, Value>>,
}

/// One change record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventName")]
    pub event_name: ChangeKind,
    #[serde(default)]
    pub dynamodb: ChangeImages,
}

/// A batch of change records as delivered by the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<StreamRecord>,
}

impl StreamRecord {
    /// New image of an insert whose `Status` is `Requested`.
    #[must_use]
    pub fn requested_insert(&self) -> Option<&Map<String, Value>> {
        if self.event_name != ChangeKind::Insert {
            return None;
        }
        let image = self.dynamodb.new_image.as_ref()?;
        let status = image.get(fields::STATUS)?.get("S")?.as_str()?;
        (AccountStatus::from(status) == AccountStatus::Requested).then_some(image)
    }
}

// ── Typed attribute conversion ───────────────────────────────────────────

/// Convert a typed image into plain JSON.
#[must_use]
pub fn flatten_image(image: &Map<String, Value>) -> Map<String, Value> {
    image
        .iter()
        .map(|(key, value)| (key.clone(), flatten_attribute(value)))
        .collect()
}

/// Convert one typed attribute into plain JSON.
///
/// Numbers stay strings, as the feed delivers them.
#[must_use]
pub fn flatten_attribute(value: &Value) -> Value {
    let Some(typed) = value.as_object().filter(|o| o.len() == 1) else {
        return value.clone();
    };
    let Some((tag, inner)) = typed.iter().next() else {
        return value.clone();
    };

    match (tag.as_str(), inner) {
        ("NULL", _) => Value::Null,
        ("L", Value::Array(items)) => Value::Array(items.iter().map(flatten_attribute).collect()),
        ("M", Value::Object(map)) => Value::Object(flatten_image(map)),
        ("S" | "N" | "B" | "BOOL" | "SS" | "NS" | "BS", inner) => inner.clone(),
        _ => value.clone(),
    }
}

/// Convert a plain JSON object into a typed image.
#[must_use]
pub fn typed_image(record: &Map<String, Value>) -> Map<String, Value> {
    record
        .iter()
        .map(|(key, value)| (key.clone(), typed_attribute(value)))
        .collect()
}

/// Convert plain JSON into one typed attribute.
#[must_use]
pub fn typed_attribute(value: &Value) -> Value {
    let mut typed = Map::new();
    match value {
        Value::Null => typed.insert("NULL".into(), Value::Bool(true)),
        Value::Bool(b) => typed.insert("BOOL".into(), Value::Bool(*b)),
        Value::Number(n) => typed.insert("N".into(), Value::String(n.to_string())),
        Value::String(s) => typed.insert("S".into(), Value::String(s.clone())),
        Value::Array(items) => typed.insert(
            "L".into(),
            Value::Array(items.iter().map(typed_attribute).collect()),
        ),
        Value::Object(map) => typed.insert("M".into(), Value::Object(typed_image(map))),
    };
    Value::Object(typed)
}

// ── Dispatcher ───────────────────────────────────────────────────────────

/// Outcome of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    #[serde(rename = "Status")]
    pub status: &'static str,
    pub started: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Default for DispatchSummary {
    fn default() -> Self {
        Self {
            status: "processed",
            started: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Starts workflow executions for qualifying change records.
pub struct ChangeDispatcher {
    launcher: Arc<dyn WorkflowLauncher>,
}

impl ChangeDispatcher {
    pub fn new(launcher: Arc<dyn WorkflowLauncher>) -> Self {
        Self { launcher }
    }

    /// Process a batch. Never fails as a whole.
    #[instrument(skip_all, fields(records = batch.records.len()))]
    pub async fn dispatch(&self, batch: &StreamBatch) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for record in &batch.records {
            let Some(image) = record.requested_insert() else {
                debug!(event_name = ?record.event_name, "Skipping change record");
                summary.skipped += 1;
                continue;
            };

            let payload = flatten_image(image);
            let account_email = payload
                .get(fields::ACCOUNT_EMAIL)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let execution_name = payload
                .get(fields::REQUEST_ID)
                .and_then(Value::as_str)
                .filter(|id| is_valid_execution_name(id))
                .map(str::to_string);

            match self
                .launcher
                .start_execution(execution_name.as_deref(), &Value::Object(payload))
                .await
            {
                Ok(execution_id) => {
                    info!(
                        account_email = %account_email,
                        execution_id = %execution_id,
                        "Started provisioning workflow"
                    );
                    summary.started += 1;
                }
                Err(e) => {
                    error!(
                        account_email = %account_email,
                        error = %e,
                        "Failed to start provisioning workflow"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

/// Execution names are 1-80 characters of `[A-Za-z0-9_-]`.
fn is_valid_execution_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 80
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
