//! Control endpoint: request contract on top of the lock controller.
//!
//! Routes (query strings ignored):
//!   POST /options/lock     {"options": {"body_size_limit": "3m"}}  -> 200 {}
//!   POST /options/unlock   (body ignored)                          -> 200 {}
//!   GET  /options/lock     -> 200 {"active": true, "saved": {...}}
//!   GET  /, /health, /ready -> 200 OK
//!   GET  /metrics          -> Prometheus text
//!
//! Failures are JSON objects: {"error": kind, "message": ..., "key"?: ...}.
//! Malformed bodies never reach the controller.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;

use crate::controller::OptionLockController;
use crate::error::{ControlError, Result};
use crate::options::OverrideSet;

pub const LOCK_PATH: &str = "/options/lock";
pub const UNLOCK_PATH: &str = "/options/unlock";
pub const METRICS_PATH: &str = "/metrics";

pub const CONTENT_JSON: &str = "application/json";
pub const CONTENT_TEXT: &str = "text/plain; charset=utf-8";
pub const CONTENT_PROMETHEUS: &str = "text/plain; version=0.0.4";

#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl ControlResponse {
    fn json(status: u16, v: serde_json::Value) -> Self {
        Self {
            status,
            content_type: CONTENT_JSON,
            body: v.to_string(),
        }
    }

    fn empty_ok() -> Self {
        Self::json(200, json!({}))
    }

    fn text(status: u16, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn from_error(e: &ControlError) -> Self {
        let mut body = json!({
            "error": e.kind(),
            "message": e.to_string(),
        });
        if let Some(key) = e.key() {
            body["key"] = json!(key);
        }
        Self::json(e.http_status(), body)
    }

    pub fn not_found() -> Self {
        Self::json(404, json!({"error": "not_found", "message": "no such control route"}))
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::json(
            413,
            json!({
                "error": "malformed_request",
                "message": format!("request body exceeds {} bytes", limit),
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
struct LockRequest {
    #[serde(default)]
    options: Option<OverrideSet>,
}

/// Parse a lock request body. A missing or null `options` is an empty set.
pub fn parse_lock_request(body: &[u8]) -> Result<OverrideSet> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ControlError::malformed("empty body"));
    }
    let v: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ControlError::malformed(format!("invalid JSON: {}", e)))?;
    if !v.is_object() {
        return Err(ControlError::malformed("body must be a JSON object"));
    }
    let req: LockRequest = serde_json::from_value(v)
        .map_err(|e| ControlError::malformed(format!("expected {{\"options\": {{...}}}}: {}", e)))?;
    Ok(req.options.unwrap_or_default())
}

/// Serve one control request.
pub fn handle(
    controller: &OptionLockController,
    method: &str,
    url: &str,
    body: &[u8],
) -> ControlResponse {
    controller.metrics().record_request();
    let path = url.split(['?', '#']).next().unwrap_or(url);
    debug!("control request {} {}", method, path);

    match (method, path) {
        ("POST", LOCK_PATH) => {
            let overrides = match parse_lock_request(body) {
                Ok(o) => o,
                Err(e) => {
                    controller.metrics().record_malformed();
                    warn!("rejecting lock request: {}", e);
                    return ControlResponse::from_error(&e);
                }
            };
            respond(controller.lock(&overrides))
        }
        ("POST", UNLOCK_PATH) => respond(controller.unlock()),
        ("GET", LOCK_PATH) => match serde_json::to_value(controller.status()) {
            Ok(v) => ControlResponse::json(200, v),
            Err(e) => ControlResponse::json(500, json!({"error": "internal", "message": e.to_string()})),
        },
        ("GET", "/") | ("GET", "/health") | ("GET", "/ready") => {
            ControlResponse::text(200, CONTENT_TEXT, "OK\n".to_string())
        }
        ("GET", METRICS_PATH) => {
            let status = controller.status();
            let body = controller
                .metrics()
                .snapshot()
                .to_prometheus(status.active, status.saved.len());
            ControlResponse::text(200, CONTENT_PROMETHEUS, body)
        }
        (_, LOCK_PATH) | (_, UNLOCK_PATH) | (_, METRICS_PATH) => ControlResponse::json(
            405,
            json!({"error": "method_not_allowed", "message": format!("{} not allowed on {}", method, path)}),
        ),
        _ => ControlResponse::not_found(),
    }
}

fn respond(r: Result<()>) -> ControlResponse {
    match r {
        Ok(()) => ControlResponse::empty_ok(),
        Err(e) => {
            warn!("control request failed: {}", e);
            ControlResponse::from_error(&e)
        }
    }
}
