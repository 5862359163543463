#![allow(dead_code)]

use std::sync::Arc;

use account_portal::{
    AppConfig, AppState, InMemoryRepository, Role,
    credentials::hash_password,
    models::{NewUser, User},
};
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-value-1234567890";

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_SECRET.to_string(),
        ..AppConfig::default()
    }
}

/// AppState over a fresh in-memory store.
pub fn test_state() -> AppState {
    AppState::new(test_config(), Arc::new(InMemoryRepository::new()))
        .expect("test config is valid")
}

/// Inserts an account directly into the store, bypassing signup so any role can be seeded.
pub async fn seed_user(state: &AppState, name: &str, email: &str, password: &str, role: Role) -> User {
    state
        .repo
        .create_user(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password).unwrap(),
            role,
        })
        .await
        .unwrap()
}

pub fn token_for(state: &AppState, user: &User) -> String {
    state.tokens.issue(user.id, user.role, Utc::now()).unwrap()
}

pub fn build_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn into_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

/// Runs one request through the router and returns the status and JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, into_json(response).await)
}

pub fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}
