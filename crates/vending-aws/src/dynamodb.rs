//! DynamoDB-backed account store.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_json::Value;

use vending_core::{fields, AccountRequest};
use vending_provisioning::ports::{AccountStore, RecordUpdate, StoreError, StoreResult};

use crate::attributes::{from_item, to_item, update_expression, Item};

/// Account store backed by a DynamoDB table keyed on `AccountEmail`.
#[derive(Debug, Clone)]
pub struct DynamoAccountStore {
    client: Client,
    table: String,
}

impl DynamoAccountStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn key(account_email: &str) -> (String, AttributeValue) {
        (
            fields::ACCOUNT_EMAIL.to_string(),
            AttributeValue::S(account_email.to_string()),
        )
    }

    /// Full scan with a single equality filter.
    async fn scan_eq(&self, field: &str, value: &str) -> StoreResult<Vec<AccountRequest>> {
        let mut pages = self
            .client
            .scan()
            .table_name(&self.table)
            .filter_expression("#f = :v")
            .expression_attribute_names("#f", field)
            .expression_attribute_values(":v", AttributeValue::S(value.to_string()))
            .into_paginator()
            .send();

        let mut records = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| backend("scan", e))?;
            for item in page.items() {
                records.push(record_from_item(item)?);
            }
        }
        Ok(records)
    }
}

fn backend(operation: &str, error: impl std::error::Error) -> StoreError {
    StoreError::Backend(format!("{operation} failed: {}", DisplayErrorContext(error)))
}

fn record_from_item(item: &Item) -> StoreResult<AccountRequest> {
    Ok(serde_json::from_value(Value::Object(from_item(item)))?)
}

fn item_from_record(record: &AccountRequest) -> StoreResult<Item> {
    match serde_json::to_value(record.clone().without_markers())? {
        Value::Object(map) => Ok(to_item(&map)),
        _ => Err(StoreError::Backend(
            "account request did not serialize to an object".to_string(),
        )),
    }
}

#[async_trait]
impl AccountStore for DynamoAccountStore {
    async fn get(&self, account_email: &str) -> StoreResult<Option<AccountRequest>> {
        let (key, value) = Self::key(account_email);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(key, value)
            .send()
            .await
            .map_err(|e| backend("get_item", e))?;

        output.item().map(record_from_item).transpose()
    }

    async fn find_by_account_id(&self, account_id: &str) -> StoreResult<Option<AccountRequest>> {
        Ok(self
            .scan_eq(fields::ACCOUNT_ID, account_id)
            .await?
            .into_iter()
            .next())
    }

    async fn find_by_account_name(&self, account_name: &str) -> StoreResult<Vec<AccountRequest>> {
        self.scan_eq(fields::ACCOUNT_NAME, account_name).await
    }

    async fn insert_new(&self, record: &AccountRequest) -> StoreResult<()> {
        let item = item_from_record(record)?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(#k)")
            .expression_attribute_names("#k", fields::ACCOUNT_EMAIL)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::AlreadyExists {
                    account_email: record.account_email.clone(),
                })
            }
            Err(e) => Err(backend("put_item", e)),
        }
    }

    async fn update(&self, account_email: &str, update: RecordUpdate) -> StoreResult<()> {
        let Some(built) = update_expression(&update) else {
            return Ok(());
        };
        let (key, value) = Self::key(account_email);

        self.client
            .update_item()
            .table_name(&self.table)
            .key(key, value)
            .update_expression(built.expression)
            .set_expression_attribute_names(Some(built.names))
            .set_expression_attribute_values(Some(built.values))
            .send()
            .await
            .map_err(|e| backend("update_item", e))?;
        Ok(())
    }

    async fn delete(&self, account_email: &str) -> StoreResult<()> {
        let (key, value) = Self::key(account_email);
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(key, value)
            .send()
            .await
            .map_err(|e| backend("delete_item", e))?;
        tracing::debug!(account_email = %account_email, table = %self.table, "Deleted account record");
        Ok(())
    }
}
