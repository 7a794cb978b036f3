//! Error types for dbdesk.
//!
//! Every operation that touches configuration, a pooled connection or a
//! backend statement reports failures through [`DeskError`]. Backend errors
//! keep the server's own message, SQLSTATE and hint so an operator can
//! diagnose them.

use thiserror::Error;

/// Main error type for dbdesk.
#[derive(Debug, Error)]
pub enum DeskError {
    /// Invalid target descriptor, unknown product or malformed URL template.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Opening or using a physical connection failed.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// Statement rejected by the backend, reported verbatim.
    #[error("{message}")]
    Statement {
        /// Backend error message.
        message: String,
        /// Additional detail from the backend.
        detail: Option<String>,
        /// Backend hint.
        hint: Option<String>,
        /// Position in the statement (1-indexed).
        position: Option<usize>,
        /// SQLSTATE code (e.g., "42P01").
        code: Option<String>,
    },

    /// Caller input rejected before any statement was sent.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable error message.
        message: String,
    },

    /// Operation not available on this backend.
    #[error("Unsupported: {message}")]
    Unsupported {
        /// Human-readable error message.
        message: String,
    },

    /// Writing dump output failed.
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DeskError {
    // ========== Constructors ==========

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            hint: Some("Check username and password".to_string()),
        }
    }

    /// Create a new authentication error with custom hint.
    pub fn authentication_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), hint: Some(hint.into()) }
    }

    /// Create a new statement error with full backend details.
    pub fn statement(
        message: impl Into<String>,
        detail: Option<String>,
        hint: Option<String>,
        position: Option<usize>,
        code: Option<String>,
    ) -> Self {
        Self::Statement { message: message.into(), detail, hint, position, code }
    }

    /// Create a new invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Create a new internal error with source.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Box::new(source)) }
    }

    // ========== Methods ==========

    /// Check if this error means the physical connection is unusable.
    ///
    /// The pool closes such connections instead of returning them to the idle set.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Connection { .. } => "Connection",
            Self::Authentication { .. } => "Authentication",
            Self::Statement { .. } => "Statement",
            Self::InvalidInput { .. } => "Input",
            Self::Unsupported { .. } => "Unsupported",
            Self::Io { .. } => "I/O",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => Some("Check the database product configuration"),
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Authentication { hint, .. } => hint.as_deref(),
            Self::Statement { hint, .. } => hint.as_deref(),
            Self::InvalidInput { .. } => None,
            Self::Unsupported { .. } => {
                Some("This database product does not support the operation")
            }
            Self::Io { .. } => Some("Check the output destination"),
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get the SQLSTATE code (if applicable).
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Statement { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Get position in the statement (if applicable).
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Statement { position, .. } => *position,
            _ => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let error_type = format!("{} Error", self.category());
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Statement { detail, code, position, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(pos) = position {
                    parts.push(format!("Position: {pos}"));
                }
                if let Some(detail) = detail {
                    parts.push(format!("Detail: {detail}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            _ => None,
        };

        ErrorInfo { error_type, message, hint, technical_detail }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Category name (e.g., "Connection Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail for a "Show Details" expansion.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from tokio_postgres::Error to DeskError.
impl From<tokio_postgres::Error> for DeskError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = db_err.message().to_string();
            let detail = db_err.detail().map(String::from);
            let hint = db_err.hint().map(String::from);
            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos as usize),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            let code_str = db_err.code().code();

            return match code_str {
                "28P01" => DeskError::Authentication {
                    message,
                    hint: Some("Invalid password - check your credentials".to_string()),
                },
                "28000" => DeskError::Authentication {
                    message,
                    hint: Some(
                        "Authentication failed - check username and permissions".to_string(),
                    ),
                },
                // Connection exceptions (08xxx)
                _ if code_str.starts_with("08") => {
                    DeskError::Connection { message, source: Some(Box::new(err)) }
                }
                _ => DeskError::Statement {
                    message,
                    detail,
                    hint,
                    position,
                    code: Some(code_str.to_string()),
                },
            };
        }

        if err.is_closed() {
            return DeskError::Connection {
                message: "Connection closed".to_string(),
                source: Some(Box::new(err)),
            };
        }

        DeskError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from sqlx::Error to DeskError.
impl From<sqlx::Error> for DeskError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned());
                let errno = db_err
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());

                // 1045: access denied for user
                if errno == Some(1045) || code.as_deref() == Some("28000") {
                    return DeskError::Authentication {
                        message,
                        hint: Some(
                            "Access denied - check username, password and host grants"
                                .to_string(),
                        ),
                    };
                }

                DeskError::Statement { message, detail: None, hint: None, position: None, code }
            }
            sqlx::Error::Configuration(source) => DeskError::Config {
                message: format!("Invalid connection options: {source}"),
            },
            err @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => {
                DeskError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
            }
            err => DeskError::Internal { message: err.to_string(), source: Some(Box::new(err)) },
        }
    }
}

/// Convert from std::io::Error to DeskError.
impl From<std::io::Error> for DeskError {
    fn from(err: std::io::Error) -> Self {
        DeskError::Io { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from serde_json::Error to DeskError.
impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        DeskError::Config { message: format!("Invalid configuration document: {err}") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_info_lists_details() {
        let err = DeskError::statement(
            "relation \"ordrs\" does not exist",
            Some("table lookup".to_string()),
            Some("Check the table name".to_string()),
            Some(15),
            Some("42P01".to_string()),
        );

        let info = err.to_error_info();
        assert_eq!(info.error_type, "Statement Error");
        assert_eq!(info.message, "relation \"ordrs\" does not exist");
        assert_eq!(info.hint.as_deref(), Some("Check the table name"));
        let detail = info.technical_detail.unwrap();
        assert!(detail.contains("Code: 42P01"));
        assert!(detail.contains("Position: 15"));
        assert!(detail.contains("Detail: table lookup"));
        assert_eq!(err.sql_state(), Some("42P01"));
        assert_eq!(err.position(), Some(15));
    }

    #[test]
    fn test_connection_errors_are_connection_lost() {
        assert!(DeskError::connection("reset by peer").is_connection_lost());
        assert!(!DeskError::config("bad template").is_connection_lost());
        assert!(!DeskError::invalid_input("mismatch").is_connection_lost());
    }

    #[test]
    fn test_categories_and_hints() {
        assert_eq!(DeskError::config("x").category(), "Config");
        assert_eq!(DeskError::unsupported("x").category(), "Unsupported");
        assert!(DeskError::connection("x").hint().is_some());
        assert_eq!(DeskError::authentication("x").hint(), Some("Check username and password"));
        assert!(DeskError::invalid_input("x").hint().is_none());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: DeskError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.category(), "I/O");
        assert!(err.to_string().contains("pipe"));
    }

    #[test]
    fn test_json_error_is_config_error() {
        let err: DeskError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, DeskError::Config { .. }));
    }
}
