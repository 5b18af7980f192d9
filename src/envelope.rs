use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported when a request never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

const ERROR_MESSAGE_KEYS: [&str; 3] = ["error", "message", "detail"];

/// Uniform result of every session client call.
///
/// HTTP failures, expired sessions and transport problems are all reported through
/// this envelope rather than as `Err`, so callers branch on `success` and `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: u16,
    /// Set when the caller cancelled the operation. Never paired with an error message.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cancelled: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, status: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status,
            cancelled: false,
        }
    }

    /// A 2xx response whose body could not be shaped into `T`.
    pub fn ok_without_data(status: u16) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            status,
            cancelled: false,
        }
    }

    pub fn failure(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            status,
            cancelled: false,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::failure(401, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::failure(TRANSPORT_FAILURE_STATUS, message)
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            data: None,
            error: None,
            status: TRANSPORT_FAILURE_STATUS,
            cancelled: true,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        !self.success && self.status == 401
    }

    /// True when the request never reached the server (and was not cancelled).
    pub fn is_transport_failure(&self) -> bool {
        !self.success && !self.cancelled && self.status == TRANSPORT_FAILURE_STATUS
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status: self.status,
            cancelled: self.cancelled,
        }
    }

    /// Re-types an envelope, dropping any payload.
    pub fn without_data<U>(self) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: None,
            error: self.error,
            status: self.status,
            cancelled: self.cancelled,
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Returns the first of `keys` that carries a usable value in `body`.
///
/// Strings must be non-empty; `null` and `false` are skipped; any other JSON value is
/// rendered as compact JSON.
pub fn first_present(body: &Value, keys: &[&str]) -> Option<String> {
    let object = body.as_object()?;
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    })
}

/// Best-effort error message for a rejected request.
pub fn extract_error_message(body: &Value) -> String {
    first_present(body, &ERROR_MESSAGE_KEYS).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

/// Parses a response body, treating empty or malformed JSON as an empty object.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(Map::new()))
}
