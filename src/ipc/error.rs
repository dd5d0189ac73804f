use serde_json::json;

use crate::gateway::GatewayError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Wire code for a gateway failure. `session_expired` is the one the shell
/// reacts to; everything else is shown to the user as-is.
pub fn gateway_code(e: &GatewayError) -> &'static str {
    match e {
        GatewayError::Unauthorized => "session_expired",
        GatewayError::NotFound(_) => "not_found",
        GatewayError::Rejected(_) => "backend_rejected",
        GatewayError::Network(_) => "network_failed",
        GatewayError::Decode(_) => "bad_payload",
    }
}
