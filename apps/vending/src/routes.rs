//! Request API router.
//!
//! - `POST /accounts` creates a `Requested` record (201)
//! - `GET /accounts?accountEmail=...` or `?accountId=...` looks one up
//! - `GET /health` liveness

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use vending_core::AccountRequest;
use vending_provisioning::{AccountIntake, CreateAccountBody};

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<AccountIntake>,
}

/// Lookup query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    pub account_email: Option<String>,
    pub account_id: Option<String>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/accounts", get(get_account).post(create_account))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_account(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<AccountRequest>, ApiError> {
    let record = state
        .intake
        .get(query.account_email.as_deref(), query.account_id.as_deref())
        .await?;
    Ok(Json(record))
}

async fn create_account(
    State(state): State<AppState>,
    Json(body): Json<CreateAccountBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record = state.intake.create(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account request created",
            "RequestID": record.request_id,
            "AccountEmail": record.account_email,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;
    use vending_core::Tag;
    use vending_provisioning::ports::{OrgAccount, OrgDirectory, OrgNode, ParentRef, ServiceResult};
    use vending_provisioning::{InMemoryAccountStore, OrgUnitResolver};

    /// Root "Root" with a single unit "Engineering".
    struct SingleUnitDirectory;

    #[async_trait]
    impl OrgDirectory for SingleUnitDirectory {
        async fn list_roots(&self) -> ServiceResult<Vec<OrgNode>> {
            Ok(vec![OrgNode::new("r-1", "Root")])
        }

        async fn list_organizational_units(&self, parent_id: &str) -> ServiceResult<Vec<OrgNode>> {
            Ok(if parent_id == "r-1" {
                vec![OrgNode::new("ou-eng", "Engineering")]
            } else {
                Vec::new()
            })
        }

        async fn list_parents(&self, _child_id: &str) -> ServiceResult<Vec<ParentRef>> {
            Ok(Vec::new())
        }

        async fn list_accounts(&self) -> ServiceResult<Vec<OrgAccount>> {
            Ok(Vec::new())
        }

        async fn list_tags(&self, _resource_id: &str) -> ServiceResult<Vec<Tag>> {
            Ok(Vec::new())
        }
    }

    fn app() -> Router {
        crate::logging::init_test_logging();
        let store = Arc::new(InMemoryAccountStore::new());
        let resolver = Arc::new(OrgUnitResolver::new(Arc::new(SingleUnitDirectory)));
        router(AppState {
            intake: Arc::new(AccountIntake::new(store, resolver)),
        })
    }

    fn post(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/accounts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_body() -> Value {
        json!({
            "AccountEmail": "Dev@Co.com",
            "AccountName": "Team X",
            "OrgUnit": "engineering",
            "SSOUserEmail": "sso@co.com",
            "SSOUserFirstName": "jane",
            "SSOUserLastName": "doe"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let app = app();

        let response = app.clone().oneshot(post(valid_body())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["AccountEmail"], "dev@co.com");

        let response = app
            .oneshot(get("/accounts?accountEmail=DEV@co.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record = json_body(response).await;
        assert_eq!(record["Status"], "Requested");
        assert_eq!(record["SSOUserFirstName"], "Jane");
        assert_eq!(record["RequestID"], created["RequestID"]);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let app = app();
        app.clone().oneshot(post(valid_body())).await.unwrap();

        let mut again = valid_body();
        again["AccountName"] = json!("Team Y");
        let response = app.oneshot(post(again)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["message"], "Account already exists");
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let app = app();
        app.clone().oneshot(post(valid_body())).await.unwrap();

        let mut again = valid_body();
        again["AccountEmail"] = json!("other@co.com");
        let response = app.oneshot(post(again)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["message"], "AccountName already exists");
    }

    #[tokio::test]
    async fn test_missing_fields_and_bad_org_unit() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("SSOUserEmail");
        let response = app().oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Missing fields: SSOUserEmail");

        let mut body = valid_body();
        body["OrgUnit"] = json!("Sales");
        let response = app().oneshot(post(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Invalid OrgUnit: Sales");
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let response = app().oneshot(get("/accounts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Provide accountEmail or accountId"
        );

        let response = app()
            .oneshot(get("/accounts?accountId=123456789012"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["message"], "Account not found");
    }
}
