//! Router-level test harness over the in-memory store and mailer.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::tokens;
use crate::config::Config;
use crate::db::models::{NewUser, User};
use crate::mail::MemoryMailer;
use crate::state::AppState;
use crate::store::{MemoryStore, Store};

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(MemoryStore::with_default_roles(), MemoryMailer::new())
    }

    pub fn with(store: MemoryStore, mailer: MemoryMailer) -> Self {
        let store = Arc::new(store);
        let mailer = Arc::new(mailer);
        let state = AppState::new(store.clone(), mailer.clone(), Config::for_tests());
        Self {
            state,
            store,
            mailer,
        }
    }

    pub fn router(&self) -> Router {
        crate::create_app(self.state.clone())
    }

    /// Insert a verified user directly and return it with an access token.
    pub async fn user(&self, username: &str, is_staff: bool) -> (User, String) {
        let user = self
            .store
            .insert_user(NewUser {
                email: format!("{}@example.com", username),
                username: username.to_string(),
                password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
                first_name: None,
                last_name: None,
                phone: None,
                role_id: None,
                is_verified: true,
                is_staff,
                otp_code: None,
                otp_expires_at: None,
            })
            .await
            .unwrap();
        let token = tokens::issue_access(&user, &self.state.config).unwrap();
        (user, token)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
            None => Body::empty(),
        };

        let res = self
            .router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }
}
