//! In-memory account store.
//!
//! Used for local runs and tests. Besides storing records it keeps a change
//! feed with the same shape the durable store emits, so the dispatcher can be
//! driven from it.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

use vending_core::{fields, AccountRequest};

use crate::dispatcher::{typed_attribute, typed_image, ChangeImages, ChangeKind, StreamBatch, StreamRecord};
use crate::ports::{AccountStore, RecordUpdate, StoreError, StoreResult, UpdateMode};

type Item = Map<String, Value>;

/// Account store kept in process memory.
#[derive(Default)]
pub struct InMemoryAccountStore {
    items: RwLock<BTreeMap<String, Item>>,
    changes: Mutex<Vec<StreamRecord>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored item, for inspection.
    pub async fn item(&self, account_email: &str) -> Option<Item> {
        self.items.read().await.get(account_email).cloned()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Take every change recorded since the last call.
    pub fn drain_changes(&self) -> StreamBatch {
        let mut changes = self.changes.lock().unwrap_or_else(|e| e.into_inner());
        StreamBatch {
            records: std::mem::take(&mut *changes),
        }
    }

    fn record_change(&self, kind: ChangeKind, key: &str, old: Option<&Item>, new: Option<&Item>) {
        let mut keys = Map::new();
        keys.insert(
            fields::ACCOUNT_EMAIL.to_string(),
            typed_attribute(&Value::String(key.to_string())),
        );

        let record = StreamRecord {
            event_name: kind,
            dynamodb: ChangeImages {
                keys: Some(keys),
                new_image: new.map(typed_image),
                old_image: old.map(typed_image),
            },
        };
        self.changes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

fn to_item(record: &AccountRequest) -> StoreResult<Item> {
    match serde_json::to_value(record.clone().without_markers())? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Backend(format!(
            "record serialized to non-object: {other}"
        ))),
    }
}

fn from_item(item: &Item) -> StoreResult<AccountRequest> {
    Ok(serde_json::from_value(Value::Object(item.clone()))?)
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, account_email: &str) -> StoreResult<Option<AccountRequest>> {
        self.items
            .read()
            .await
            .get(account_email)
            .map(from_item)
            .transpose()
    }

    async fn find_by_account_id(&self, account_id: &str) -> StoreResult<Option<AccountRequest>> {
        let items = self.items.read().await;
        items
            .values()
            .find(|item| item.get(fields::ACCOUNT_ID).and_then(Value::as_str) == Some(account_id))
            .map(from_item)
            .transpose()
    }

    async fn find_by_account_name(&self, account_name: &str) -> StoreResult<Vec<AccountRequest>> {
        let items = self.items.read().await;
        items
            .values()
            .filter(|item| {
                item.get(fields::ACCOUNT_NAME).and_then(Value::as_str) == Some(account_name)
            })
            .map(from_item)
            .collect()
    }

    async fn insert_new(&self, record: &AccountRequest) -> StoreResult<()> {
        let item = to_item(record)?;
        let mut items = self.items.write().await;
        if items.contains_key(&record.account_email) {
            return Err(StoreError::AlreadyExists {
                account_email: record.account_email.clone(),
            });
        }
        self.record_change(ChangeKind::Insert, &record.account_email, None, Some(&item));
        items.insert(record.account_email.clone(), item);
        Ok(())
    }

    async fn update(&self, account_email: &str, update: RecordUpdate) -> StoreResult<()> {
        let mut items = self.items.write().await;
        let old = items.get(account_email).cloned();

        let item = items.entry(account_email.to_string()).or_insert_with(|| {
            let mut item = Map::new();
            item.insert(
                fields::ACCOUNT_EMAIL.to_string(),
                Value::String(account_email.to_string()),
            );
            item
        });

        for assignment in update.iter() {
            match assignment.mode {
                UpdateMode::Overwrite => {
                    item.insert(assignment.field.clone(), assignment.value.clone());
                }
                UpdateMode::IfAbsent => {
                    item.entry(assignment.field.clone())
                        .or_insert_with(|| assignment.value.clone());
                }
            }
        }

        let kind = if old.is_some() {
            ChangeKind::Modify
        } else {
            ChangeKind::Insert
        };
        let new = item.clone();
        self.record_change(kind, account_email, old.as_ref(), Some(&new));
        Ok(())
    }

    async fn delete(&self, account_email: &str) -> StoreResult<()> {
        if let Some(old) = self.items.write().await.remove(account_email) {
            self.record_change(ChangeKind::Remove, account_email, Some(&old), None);
        }
        Ok(())
    }
}
