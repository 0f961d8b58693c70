#![allow(dead_code)]

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

use chartboard::{
    config::{AppState, Config},
    router::create_router,
};

pub const CLINIC: &str = "gangnam";

/// Configuração de teste: o banco vem do `#[sqlx::test]`.
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "segredo-de-teste".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        db_max_connections: 5,
        jwt_expiry_days: 1,
        lock_lease: chrono::Duration::seconds(300),
        lock_reap_interval: Duration::from_secs(30),
        ws_heartbeat: Duration::from_secs(30),
    }
}

pub fn build_test_state(pool: PgPool) -> AppState {
    AppState::with_pool(pool, test_config())
}

pub fn build_test_app(pool: PgPool) -> Router {
    create_router(build_test_state(pool))
}

/// Monta e envia uma requisição; `token` e `clinic` viram cabeçalhos quando presentes.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    clinic: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(clinic) = clinic {
        builder = builder.header("x-clinic-tag", clinic);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Registra um usuário pela API, faz login e devolve `(token, id)`.
pub async fn register_and_login(app: &Router, login_id: &str, role: &str) -> (String, i64) {
    let response = send(
        app,
        Method::POST,
        "/api/register",
        None,
        None,
        Some(json!({
            "userId": login_id,
            "password": "senha-forte",
            "role": role,
            "firstName": "Test",
            "lastName": login_id,
        })),
    )
    .await;
    assert_eq!(response.status(), 200, "registro de {login_id} falhou");

    let response = send(
        app,
        Method::POST,
        "/api/login",
        None,
        None,
        Some(json!({ "userId": login_id, "password": "senha-forte" })),
    )
    .await;
    assert_eq!(response.status(), 200, "login de {login_id} falhou");

    let body = body_json(response).await;
    (
        body["token"].as_str().unwrap().to_string(),
        body["user"]["id"].as_i64().unwrap(),
    )
}

/// Cria registros na clínica de teste e devolve os ids.
pub async fn insert_records(app: &Router, token: &str, records: Value) -> Vec<i64> {
    let response = send(
        app,
        Method::POST,
        "/api/insertRecords",
        Some(token),
        Some(CLINIC),
        Some(json!({ "records": records })),
    )
    .await;
    assert_eq!(response.status(), 200);

    body_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect()
}

pub async fn lock(app: &Router, token: &str, ids: &[i64], locking_user: Option<i64>, force: bool) -> Response<Body> {
    send(
        app,
        Method::PUT,
        "/api/lockOrUnlockRecords",
        Some(token),
        Some(CLINIC),
        Some(json!({ "recordIds": ids, "lockingUser": locking_user, "force": force })),
    )
    .await
}

pub async fn list(app: &Router, token: &str, filters: Value) -> Vec<Value> {
    let response = send(
        app,
        Method::POST,
        "/api/getRecords",
        Some(token),
        Some(CLINIC),
        Some(json!({ "filters": filters })),
    )
    .await;
    assert_eq!(response.status(), 200);
    body_json(response).await.as_array().unwrap().clone()
}
