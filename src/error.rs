//! Error types shared by the stores, the facade and the report renderers.

use thiserror::Error;

use crate::models::Milestone;

/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Network, auth, timeout or schema failure against the hosted store.
    /// The facade absorbs this and falls back to the local backup.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Input rejected against the student catalog or school year.
    #[error("validation error: {0}")]
    Validation(String),

    /// The local backup file could not be read or written.
    #[error("local backup error: {0}")]
    LocalIo(String),
}

impl PersistError {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteUnavailable(_))
    }
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}

/// Failures raised while rendering a summary.
#[derive(Debug, Error)]
pub enum ReportRenderError {
    #[error("malformed {milestone} rating {value:?} for {student} / {subject}")]
    MalformedRating {
        student: String,
        milestone: Milestone,
        subject: String,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures raised while loading `academy.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display() {
        let err = PersistError::RemoteUnavailable("connection refused".into());
        assert_eq!(err.to_string(), "remote store unavailable: connection refused");
        assert!(err.is_remote());
    }

    #[test]
    fn validation_is_not_remote() {
        let err = PersistError::Validation("unknown student Max".into());
        assert!(!err.is_remote());
        assert_eq!(err.to_string(), "validation error: unknown student Max");
    }

    #[test]
    fn sqlx_errors_map_to_remote_unavailable() {
        let err = PersistError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_remote());
    }

    #[test]
    fn malformed_rating_names_the_record() {
        let err = ReportRenderError::MalformedRating {
            student: "Lucy".into(),
            milestone: Milestone::Day90,
            subject: "Math".into(),
            value: "Great".into(),
        };
        let text = err.to_string();
        assert!(text.contains("Lucy"));
        assert!(text.contains("Math"));
        assert!(text.contains("90-Day"));
        assert!(text.contains("\"Great\""));
    }

    #[test]
    fn invalid_config_display() {
        let err = ConfigError::Invalid("no students".into());
        assert_eq!(err.to_string(), "invalid config: no students");
    }
}
