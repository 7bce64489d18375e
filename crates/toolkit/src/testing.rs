//! Local stand-in for the toolkit service used by the HTTP tests.

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

pub const API_KEY: &str = "test_key";

const TOOLKITS: &[&str] = &["OutlookMail", "Search", "Microsoft_Mail"];

/// Start the fake service on an ephemeral port and return its base URL.
pub async fn spawn_server() -> String {
    let app = Router::new()
        .route("/v1/tools", get(list_tools))
        .route("/v1/tools/definition", get(tool_definition))
        .route("/v1/tools/authorize", post(authorize))
        .route("/v1/auth/status", get(auth_status))
        .route("/v1/tools/execute", post(execute));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", API_KEY))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "invalid api key").into_response()
}

fn spec(toolkit: &str, name: &str) -> Value {
    let parameters = if name == "ListEmails" {
        json!([{"name": "limit", "required": false, "value_schema": {"val_type": "integer"}}])
    } else {
        json!([])
    };
    json!({
        "name": name,
        "qualified_name": format!("{}.{}", toolkit, name),
        "description": format!("{} tool", name),
        "toolkit": {"name": toolkit, "version": "1.0.0"},
        "input": {"parameters": parameters}
    })
}

async fn list_tools(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let items = match params.get("toolkit").map(String::as_str) {
        Some("OutlookMail") => vec![
            spec("OutlookMail", "ListEmails"),
            spec("OutlookMail", "SendEmail"),
            spec("OutlookMail", "DeleteEmail"),
        ],
        _ => Vec::new(),
    };
    Json(json!({ "items": items, "total_count": items.len() })).into_response()
}

async fn tool_definition(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match params.get("name").and_then(|n| n.split_once('.')) {
        Some((toolkit, name)) => Json(spec(toolkit, name)).into_response(),
        None => (StatusCode::NOT_FOUND, "no such tool").into_response(),
    }
}

async fn authorize(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let known = body["tool_name"]
        .as_str()
        .and_then(|name| name.split_once('.'))
        .is_some_and(|(toolkit, _)| TOOLKITS.contains(&toolkit));
    if !known {
        return (StatusCode::NOT_FOUND, "no such tool").into_response();
    }
    match body["tool_name"].as_str() {
        Some("OutlookMail.SendEmail") => Json(json!({
            "id": "auth_send",
            "status": "pending",
            "url": "https://login.example.com/consent"
        }))
        .into_response(),
        Some("OutlookMail.DeleteEmail") => {
            (StatusCode::FORBIDDEN, "tool not permitted for this user").into_response()
        }
        _ => Json(json!({ "id": "auth_ok", "status": "completed" })).into_response(),
    }
}

async fn auth_status(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let id = params.get("id").cloned().unwrap_or_default();
    Json(json!({ "id": id, "status": "completed" })).into_response()
}

async fn execute(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    match body["tool_name"].as_str() {
        Some("OutlookMail.SendEmail") => Json(json!({
            "success": false,
            "output": {"error": {"message": "mailbox unavailable"}}
        }))
        .into_response(),
        _ => Json(json!({
            "success": true,
            "output": {"value": {"user": body["user_id"], "limit": body["input"]["limit"], "emails": []}}
        }))
        .into_response(),
    }
}
