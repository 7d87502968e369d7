use std::sync::Arc;

/// Error is the failure taxonomy of the synchronization layer.
///
/// Remote failures wrap the client's anyhow::Error in an Arc, so that a single
/// failed fetch may be shared by every reader of a de-duplicated query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Bad credentials, or a failure of the session itself.
    #[error("authentication failed: {0}")]
    AuthFailure(Arc<anyhow::Error>),
    /// The user authenticated, but their Profile could not be read.
    #[error("failed to load user profile: {0}")]
    ProfileLoadFailure(Arc<anyhow::Error>),
    /// The current profile has no warehouse, and the operation requires one.
    #[error("no warehouse is assigned to the current profile")]
    ScopeUnavailable,
    #[error("remote read failed: {0}")]
    RemoteRead(Arc<anyhow::Error>),
    #[error("remote write failed: {0}")]
    RemoteWrite(Arc<anyhow::Error>),
    /// Required form fields are missing.
    #[error("missing required fields: {}", .0.join(", "))]
    Validation(Vec<String>),
}

impl Error {
    /// Short name of the error kind.
    pub fn name(&self) -> &'static str {
        match self {
            Error::AuthFailure(_) => "AuthFailure",
            Error::ProfileLoadFailure(_) => "ProfileLoadFailure",
            Error::ScopeUnavailable => "ScopeUnavailable",
            Error::RemoteRead(_) => "RemoteReadFailure",
            Error::RemoteWrite(_) => "RemoteWriteFailure",
            Error::Validation(_) => "Validation",
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();

        fields.sort();
        Error::Validation(fields)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::RemoteWrite(Arc::new(anyhow::anyhow!("permission denied")));
        assert_eq!(err.to_string(), "remote write failed: permission denied");
        assert_eq!(err.name(), "RemoteWriteFailure");

        let err = Error::Validation(vec!["priority".to_string(), "task_type".to_string()]);
        assert_eq!(err.to_string(), "missing required fields: priority, task_type");
    }
}
