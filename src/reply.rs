//! The uniform result envelope returned by every JSON handler.
//!
//! Success and failure share one wire shape:
//!
//! ```json
//! {"code": 0, "message": "OK", "data": {...}, "dev_message": ""}
//! ```
//!
//! `code` is an application-level signal — it never drives the transport
//! status. `dev_message` carries diagnostics and is cleared before
//! serialization unless the app runs in debug mode.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CODE_OK: i32 = 0;
pub const CODE_INTERNAL_ERROR: i32 = -1;
pub const MESSAGE_OK: &str = "OK";
pub const MESSAGE_INTERNAL_ERROR: &str = "internal server error";

/// The envelope. Field declaration order is wire order.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Reply {
    pub code: i32,
    pub message: String,
    pub data: Value,
    pub dev_message: String,
}

impl Reply {
    /// `code 0` / `"OK"` with the given payload.
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            code: CODE_OK,
            message: MESSAGE_OK.to_owned(),
            data: data.into(),
            dev_message: String::new(),
        }
    }

    pub fn new(
        code: i32,
        message: impl Into<String>,
        data: impl Into<Value>,
        dev_message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            data: data.into(),
            dev_message: dev_message.into(),
        }
    }

    /// The generic failure envelope: `code -1`, fixed message, no data.
    /// Details go to `dev_message` only.
    pub(crate) fn internal_error(dev_message: impl Into<String>) -> Self {
        Self {
            code: CODE_INTERNAL_ERROR,
            message: MESSAGE_INTERNAL_ERROR.to_owned(),
            data: Value::Null,
            dev_message: dev_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_wire_shape() {
        let body = serde_json::to_string(&Reply::ok(json!({"id": 1}))).unwrap();
        assert_eq!(
            body,
            r#"{"code":0,"message":"OK","data":{"id":1},"dev_message":""}"#
        );
    }

    #[test]
    fn failure_wire_shape() {
        let body = serde_json::to_string(&Reply::internal_error("boom")).unwrap();
        assert_eq!(
            body,
            r#"{"code":-1,"message":"internal server error","data":null,"dev_message":"boom"}"#
        );
    }
}
