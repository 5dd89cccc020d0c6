//! # Agent Errors
//!
//! Every failure a caller can see, one variant per kind. Nothing is retried
//! here; [`AgentError::is_retryable`] tells the caller whether trying again
//! could help.

use std::fmt;

use serde::Serialize;

use crate::core::config::ConfigError;
use crate::core::validate::ValidationError;
use crate::inference::ProviderError;

#[derive(Debug)]
pub enum AgentError {
    /// Missing credential or unusable config file. Fatal at startup.
    Config(ConfigError),
    /// The generation service failed, timed out, or answered off-protocol.
    Upstream(ProviderError),
    /// The question or the model's output broke the schema.
    Validation(ValidationError),
    /// The router picked a tool that has no builder.
    UnsupportedMethod(String),
}

impl AgentError {
    /// Stable, machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "config",
            AgentError::Upstream(_) => "upstream",
            AgentError::Validation(_) => "validation",
            AgentError::UnsupportedMethod(_) => "unsupported_method",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Upstream(e) => e.is_retryable(),
            // A fresh generation may well pass.
            AgentError::Validation(e) => e.method.is_some(),
            AgentError::Config(_) | AgentError::UnsupportedMethod(_) => false,
        }
    }

    /// JSON body printed for a failed question.
    pub fn report(&self, question: &str) -> ErrorReport {
        let violations = match self {
            AgentError::Validation(e) => e.violations.clone(),
            _ => Vec::new(),
        };
        ErrorReport {
            error: ErrorBody {
                kind: self.kind(),
                detail: self.to_string(),
                retryable: self.is_retryable(),
                question: question.to_string(),
                violations,
            },
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Config(e) => write!(f, "{e}"),
            AgentError::Upstream(e) => write!(f, "upstream {e}"),
            AgentError::Validation(e) => write!(f, "{e}"),
            AgentError::UnsupportedMethod(name) => {
                write!(f, "no builder for representation method \"{name}\"")
            }
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Config(e) => Some(e),
            AgentError::Upstream(e) => Some(e),
            AgentError::Validation(e) => Some(e),
            AgentError::UnsupportedMethod(_) => None,
        }
    }
}

impl From<ConfigError> for AgentError {
    fn from(e: ConfigError) -> Self {
        AgentError::Config(e)
    }
}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        AgentError::Upstream(e)
    }
}

impl From<ValidationError> for AgentError {
    fn from(e: ValidationError) -> Self {
        AgentError::Validation(e)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub detail: String,
    pub retryable: bool,
    pub question: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<crate::core::validate::Violation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::method::RepresentationMethod;
    use crate::core::validate::{Rule, Violation};

    #[test]
    fn test_kinds() {
        assert_eq!(AgentError::from(ProviderError::Timeout("30s".into())).kind(), "upstream");
        assert_eq!(AgentError::UnsupportedMethod("x".into()).kind(), "unsupported_method");
        assert_eq!(
            AgentError::from(ConfigError::MissingCredential {
                provider: "gemini".into(),
                env_var: "GOOGLE_API_KEY",
            })
            .kind(),
            "config"
        );
    }

    #[test]
    fn test_report_serialization() {
        let err = AgentError::Validation(ValidationError {
            method: Some(RepresentationMethod::Division),
            violations: vec![Violation {
                field: "groupCount".into(),
                rule: Rule::Range,
                detail: "must be at least 1, got 0 (division by zero)".into(),
            }],
        });
        let json = serde_json::to_value(err.report("12 / 0")).unwrap();
        assert_eq!(json["error"]["kind"], "validation");
        assert_eq!(json["error"]["retryable"], true);
        assert_eq!(json["error"]["question"], "12 / 0");
        assert_eq!(json["error"]["violations"][0]["field"], "groupCount");
        assert_eq!(json["error"]["violations"][0]["rule"], "range");
    }

    #[test]
    fn test_report_omits_empty_violations() {
        let err = AgentError::Upstream(ProviderError::Api {
            status: 401,
            message: "Unauthorized".into(),
        });
        let json = serde_json::to_value(err.report("1 + 2")).unwrap();
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"].get("violations").is_none());
        assert_eq!(json["error"]["detail"], "upstream API error (HTTP 401): Unauthorized");
    }
}
