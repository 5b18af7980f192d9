//! Authenticated session client for the CLM backend.
//!
//! [`SessionClient`] holds no tokens of its own: every call reloads the credential pair
//! from an injected [`CredentialStore`], refreshes once on a 401 and reports every
//! outcome through an [`ApiResponse`]. Event streams ([`stream`]) and the fallback
//! poller ([`poll`]) share the same credentials and refresh rules.

pub mod api;
mod client;
mod config;
pub mod credentials;
mod envelope;
mod error;
pub mod poll;
mod redact;
pub mod stream;

pub use client::{
    ApiRequest, AuthTokens, Blob, ByteStream, LogoutReason, RegisterRequest, SessionClient,
    SessionEvent, SessionEventKind, UploadFile, UploadForm, UploadProgress, UploadSource,
    UserProfile,
};
pub use config::{
    ClientConfig, DEFAULT_API_PREFIX, DEFAULT_BASE_URL, DEFAULT_FALLBACK_POLL_INTERVAL,
    DEFAULT_REFRESH_PATH, ENV_BASE_URL, MIN_POLL_INTERVAL,
};
pub use credentials::{CredentialPair, CredentialStore, KeyringCredentialStore, MemoryCredentialStore, StoreError};
pub use envelope::{
    extract_error_message, first_present, parse_body, ApiResponse, GENERIC_FAILURE_MESSAGE,
    TRANSPORT_FAILURE_STATUS,
};
pub use error::{map_http_status, ClientError, HttpErrorStatus, StreamError};
pub use redact::redact_secrets;
