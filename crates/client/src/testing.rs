//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, StatusCode};
use serde_json::{Value, json};

use crate::error::TransportError;
use crate::transport::{ApiResponse, Transport};

/// What the double saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

struct Scripted {
    delay: Option<Duration>,
    outcome: Result<ApiResponse, TransportError>,
}

/// Replays queued responses in call order and records every request.
///
/// An exhausted script answers 500 so a missing expectation shows up as a
/// failed assertion rather than a hang.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: StatusCode, body: Value) -> Self {
        self.push(None, Ok(ApiResponse::json_body(status, &body)))
    }

    pub fn respond_after(self, delay: Duration, status: StatusCode, body: Value) -> Self {
        self.push(Some(delay), Ok(ApiResponse::json_body(status, &body)))
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.push(None, Err(error))
    }

    fn push(self, delay: Option<Duration>, outcome: Result<ApiResponse, TransportError>) -> Self {
        self.script.lock().unwrap().push_back(Scripted { delay, outcome });
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: Request) -> Result<ApiResponse, TransportError> {
        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .and_then(|bytes| serde_json::from_slice(bytes).ok());
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method().clone(),
            url: request.url().to_string(),
            headers: request.headers().clone(),
            body,
        });

        let next = self.script.lock().unwrap().pop_front();
        let Some(next) = next else {
            return Ok(ApiResponse::json_body(StatusCode::INTERNAL_SERVER_ERROR, &json!({})));
        };
        if let Some(delay) = next.delay {
            tokio::time::sleep(delay).await;
        }
        next.outcome
    }
}

/// A signed access token carrying `permissions`.
pub fn access_token(sub: &str, permissions: &[&str]) -> String {
    let claims = json!({
        "sub": sub,
        "permissions": permissions,
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"test-secret"),
    )
    .expect("failed to encode jwt")
}

/// A login/refresh body in the `{ message, statusCode, data }` envelope.
pub fn auth_body(token: &str, refresh_token: &str, id: u64, roles: &[&str]) -> Value {
    json!({
        "message": "ok",
        "statusCode": 200,
        "data": {
            "token": token,
            "refreshToken": refresh_token,
            "user": {
                "id": id,
                "name": "Demo User",
                "email": "demo@blasmusik.com",
                "roles": roles,
            }
        }
    })
}

pub fn profile_body(id: u64, roles: &[&str]) -> Value {
    json!({
        "message": "ok",
        "statusCode": 200,
        "data": {
            "id": id,
            "username": "demo",
            "email": "demo@blasmusik.com",
            "roles": roles,
        }
    })
}
