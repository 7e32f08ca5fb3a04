/// Errors raised by the notification sinks.
///
/// # Examples
///
/// ```rust
/// use nodewatch_notify::error::NotifyError;
///
/// let err = NotifyError::Api { status: 502, body: "bad gateway".into() };
/// assert!(err.to_string().contains("502"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request never produced a response.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The alert could not be encoded.
    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The management plane answered with a non-success status.
    #[error("Notify: webhook returned status={status}, body={body}")]
    Api { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, NotifyError>;
