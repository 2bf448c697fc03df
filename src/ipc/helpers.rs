use crate::attendance::AttendanceError;
use crate::ipc::error::err;
use crate::marks::{BulkError, MarkError};
use crate::reports::ReportError;
use crate::store::StoreError;
use crate::workflow::{Role, WorkflowError};
use serde_json::{json, Value};

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

macro_rules! coded_error {
    ($($t:ty),*) => {
        $(impl From<$t> for HandlerErr {
            fn from(e: $t) -> Self {
                HandlerErr::new(e.code(), e.to_string())
            }
        })*
    };
}

coded_error!(StoreError, MarkError, WorkflowError, ReportError, AttendanceError);

impl From<BulkError> for HandlerErr {
    fn from(e: BulkError) -> Self {
        HandlerErr::new(e.source.code(), e.to_string()).with_details(json!({ "index": e.index }))
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a number", key)))
}

pub fn get_optional_u32(params: &Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                HandlerErr::new("bad_params", format!("{} must be a non-negative integer", key))
            }),
    }
}

pub fn get_role(params: &Value) -> Result<Role, HandlerErr> {
    let raw = get_required_str(params, "role")?;
    Role::parse(&raw).ok_or_else(|| {
        HandlerErr::new("bad_params", format!("unknown role: {}", raw))
            .with_details(json!({ "allowed": ["student", "parent", "staff", "admin1", "admin2"] }))
    })
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
