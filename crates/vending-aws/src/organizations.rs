//! AWS Organizations directory.

use async_trait::async_trait;
use aws_sdk_organizations::error::DisplayErrorContext;
use aws_sdk_organizations::primitives::DateTime;
use aws_sdk_organizations::types::ParentType;
use aws_sdk_organizations::Client;
use chrono::{TimeZone, Utc};

use vending_core::Tag;
use vending_provisioning::ports::{
    OrgAccount, OrgDirectory, OrgNode, ParentKind, ParentRef, ServiceError, ServiceResult,
};

const SERVICE: &str = "organizations";

fn unavailable(error: impl std::error::Error) -> ServiceError {
    ServiceError::unavailable(SERVICE, DisplayErrorContext(error))
}

fn to_chrono(value: &DateTime) -> Option<chrono::DateTime<Utc>> {
    Utc.timestamp_opt(value.secs(), value.subsec_nanos()).single()
}

/// Organization directory backed by AWS Organizations.
#[derive(Debug, Clone)]
pub struct OrganizationsDirectory {
    client: Client,
}

impl OrganizationsDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OrgDirectory for OrganizationsDirectory {
    async fn list_roots(&self) -> ServiceResult<Vec<OrgNode>> {
        let mut pages = self.client.list_roots().into_paginator().send();
        let mut roots = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            roots.extend(page.roots().iter().filter_map(|root| {
                Some(OrgNode::new(root.id()?, root.name().unwrap_or_default()))
            }));
        }
        Ok(roots)
    }

    async fn list_organizational_units(&self, parent_id: &str) -> ServiceResult<Vec<OrgNode>> {
        let mut pages = self
            .client
            .list_organizational_units_for_parent()
            .parent_id(parent_id)
            .into_paginator()
            .send();
        let mut units = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            units.extend(page.organizational_units().iter().filter_map(|unit| {
                Some(OrgNode::new(unit.id()?, unit.name().unwrap_or_default()))
            }));
        }
        Ok(units)
    }

    async fn list_parents(&self, child_id: &str) -> ServiceResult<Vec<ParentRef>> {
        let mut pages = self
            .client
            .list_parents()
            .child_id(child_id)
            .into_paginator()
            .send();
        let mut parents = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            parents.extend(page.parents().iter().filter_map(|parent| {
                let kind = match parent.r#type()? {
                    ParentType::Root => ParentKind::Root,
                    _ => ParentKind::OrganizationalUnit,
                };
                Some(ParentRef {
                    id: parent.id()?.to_string(),
                    kind,
                })
            }));
        }
        Ok(parents)
    }

    async fn list_accounts(&self) -> ServiceResult<Vec<OrgAccount>> {
        let mut pages = self.client.list_accounts().into_paginator().send();
        let mut accounts = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            accounts.extend(page.accounts().iter().filter_map(|account| {
                Some(OrgAccount {
                    id: account.id()?.to_string(),
                    name: account.name().unwrap_or_default().to_string(),
                    email: account.email().unwrap_or_default().to_string(),
                    status: account
                        .status()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_default(),
                    joined_at: account.joined_timestamp().and_then(to_chrono),
                })
            }));
        }
        tracing::debug!(accounts = accounts.len(), "Listed organization accounts");
        Ok(accounts)
    }

    async fn list_tags(&self, resource_id: &str) -> ServiceResult<Vec<Tag>> {
        let mut pages = self
            .client
            .list_tags_for_resource()
            .resource_id(resource_id)
            .into_paginator()
            .send();
        let mut tags = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(unavailable)?;
            tags.extend(page.tags().iter().map(|t| Tag::new(t.key(), t.value())));
        }
        Ok(tags)
    }
}
