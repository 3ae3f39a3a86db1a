use crate::util::parse_bool_str;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;

const DEBUG_PAYLOAD_ENV: &str = "MCT_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "MCT_API_LOG_PATH";
const REDACTED: &str = "<redacted>";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

/// Logs an outgoing request body with credentials masked.
pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let mut redacted = payload.clone();
    redact_secrets(&mut redacted);
    let formatted_payload = serde_json::to_string_pretty(&redacted)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());

    if let Some(path) = resolve_log_path() {
        let message = format!("MCT_API DEBUG payload_request url={request_url}\npayload:\n{formatted_payload}\n");
        match append_log_file(&path, &message) {
            Ok(()) => return,
            Err(error) => tracing::warn!(%error, path, "cannot append to API log file"),
        }
    }

    tracing::debug!(url = request_url, payload = %formatted_payload, "payload_request");
}

fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_secret_key(key) {
                    if matches!(field, Value::String(s) if !s.is_empty()) {
                        *field = Value::String(REDACTED.to_string());
                    }
                } else {
                    redact_secrets(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("api_key") || key.contains("token_value")
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}
