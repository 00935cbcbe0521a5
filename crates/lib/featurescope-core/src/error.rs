use std::{error::Error, fmt};

use serde_json::{Map, Value};

/// Root error for every featurescope operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerError {
    /// Upstream HTTP or warehouse failure.
    Api {
        message: String,
        status: Option<u16>,
        endpoint: Option<String>,
    },
    /// Value could not be encoded for caching. Tier unavailability is never reported here.
    Cache(String),
    Validation {
        message: String,
        field: Option<String>,
        value: Option<Value>,
    },
    /// 401/403 from an HTTP collaborator.
    Authentication(String),
    Permission {
        message: String,
        required_permission: Option<String>,
    },
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status: None,
            endpoint: None,
        }
    }

    pub fn api_at(message: impl Into<String>, status: Option<u16>, endpoint: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            status,
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            value: None,
        }
    }

    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: None,
        }
    }

    pub fn invalid_value(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: Some(value.into()),
        }
    }

    /// Stable machine-readable code carried to tool callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Api { .. } => "API_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Permission { .. } => "PERMISSION_ERROR",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Api { message, .. }
            | Self::Validation { message, .. }
            | Self::Permission { message, .. }
            | Self::Cache(message)
            | Self::Authentication(message) => message,
        }
    }

    /// Structured context for the error (status/endpoint, field/value, permission).
    #[must_use]
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            Self::Api {
                status, endpoint, ..
            } => {
                if let Some(status) = status {
                    details.insert("status_code".to_string(), Value::from(*status));
                }
                if let Some(endpoint) = endpoint {
                    details.insert("endpoint".to_string(), Value::from(endpoint.as_str()));
                }
            }
            Self::Validation { field, value, .. } => {
                if let Some(field) = field {
                    details.insert("field".to_string(), Value::from(field.as_str()));
                }
                if let Some(value) = value {
                    details.insert("value".to_string(), value.clone());
                }
            }
            Self::Permission {
                required_permission: Some(permission),
                ..
            } => {
                details.insert(
                    "required_permission".to_string(),
                    Value::from(permission.as_str()),
                );
            }
            Self::Permission { .. } | Self::Cache(_) | Self::Authentication(_) => {}
        }
        details
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api {
                message,
                status: Some(status),
                ..
            } => write!(f, "{message} (status {status})"),
            Self::Cache(message) => write!(f, "cache write failed: {message}"),
            _ => f.write_str(self.message()),
        }
    }
}

impl Error for ServerError {}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::api(format!("invalid response payload: {err}"))
    }
}
