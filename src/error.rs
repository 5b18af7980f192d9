use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error")]
    Network(#[from] reqwest::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorStatus {
    Unauthorized,
    RateLimited,
    Error,
}

pub fn map_http_status(status_code: u16) -> HttpErrorStatus {
    match status_code {
        401 | 403 => HttpErrorStatus::Unauthorized,
        429 => HttpErrorStatus::RateLimited,
        _ => HttpErrorStatus::Error,
    }
}

/// Reported through `StreamObserver::on_error`. Deliberate closes never produce one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("stream rejected with status {0}")]
    Status(u16),
    #[error("stream unauthorized")]
    Unauthorized,
    #[error("stream response has no body")]
    MissingBody,
    #[error("stream read failed: {0}")]
    Read(String),
    #[error("stream transport failed: {0}")]
    Transport(String),
    #[error("stream frame exceeded {0} bytes")]
    FrameTooLarge(usize),
}
