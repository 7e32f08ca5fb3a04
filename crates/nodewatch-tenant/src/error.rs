/// Errors raised by the tenant collaborators.
///
/// The reconciler itself never fails; these only surface from fetching the
/// inputs, and the poll loop logs them and carries on.
///
/// # Examples
///
/// ```rust
/// use nodewatch_tenant::error::TenantError;
///
/// let err = TenantError::DirectoryStatus { status: 503, body: "down".into() };
/// assert!(err.to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// Transport-level failure talking to the tenant directory.
    #[error("Tenant directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The directory answered with a non-success status.
    #[error("Tenant directory returned status={status}, body={body}")]
    DirectoryStatus { status: u16, body: String },

    /// A response or record could not be decoded.
    #[error("Tenant JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The supervisor records directory could not be read.
    #[error("Supervisor records unavailable at {path}: {source}")]
    SupervisorIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience `Result` alias for tenant collaborator operations.
pub type Result<T> = std::result::Result<T, TenantError>;
