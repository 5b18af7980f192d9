use super::{decode_json, describe_transport_error, ApiRequest, SendPolicy, SessionClient};
use super::{LogoutReason, SessionEventKind};
use crate::api::types::deserialize_optional_id;
use crate::credentials::{CredentialPair, StoreError};
use crate::envelope::ApiResponse;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const LOGOUT_PATH: &str = "/api/auth/logout/";
pub const ME_PATH: &str = "/api/auth/me/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tokens (and profile) returned by login or registration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl SessionClient {
    pub async fn login(&self, email: &str, password: &str) -> ApiResponse<AuthTokens> {
        let body = json!({"email": email, "password": password});
        let response: ApiResponse<Value> = self
            .request(ApiRequest::post(LOGIN_PATH).json(&body).without_auth())
            .await;

        if !response.success {
            return response.without_data();
        }
        let status = response.status;
        let tokens = response
            .data
            .and_then(|value| serde_json::from_value::<AuthTokens>(value).ok());
        let Some(tokens) = tokens else {
            return ApiResponse::failure(status, "Login response did not include credentials");
        };

        match self.adopt_tokens(&tokens) {
            Ok(()) => ApiResponse::ok(tokens, status),
            Err(err) => ApiResponse::failure(status, err.to_string()),
        }
    }

    /// Registers an account. Tokens in the response, when present, start a session.
    pub async fn register(&self, request: &RegisterRequest) -> ApiResponse<Value> {
        let response: ApiResponse<Value> = self
            .request(ApiRequest::post(REGISTER_PATH).json(request).without_auth())
            .await;

        let tokens = response
            .data
            .as_ref()
            .filter(|_| response.success)
            .and_then(|value| serde_json::from_value::<AuthTokens>(value.clone()).ok());
        if let Some(tokens) = tokens {
            if let Err(err) = self.adopt_tokens(&tokens) {
                return ApiResponse::failure(response.status, err.to_string());
            }
        }
        response
    }

    fn adopt_tokens(&self, tokens: &AuthTokens) -> Result<(), StoreError> {
        let pair = CredentialPair::new(&tokens.access, &tokens.refresh)
            .normalized()
            .ok_or_else(|| StoreError::Backend("received empty tokens".to_string()))?;
        self.store.save(&pair)?;
        tracing::info!("session started");
        self.events.emit(SessionEventKind::LoggedIn);
        Ok(())
    }

    /// Tells the backend to revoke the refresh token, then always clears local credentials.
    pub async fn logout(&self) -> ApiResponse<Value> {
        let body = match self.load_credentials() {
            Some(pair) => json!({"refresh": pair.refresh_token}),
            None => json!({}),
        };
        let url = self.config.url(LOGOUT_PATH);
        let payload = body.to_string();
        let policy = SendPolicy {
            auth: true,
            allow_retry: false,
            replayable: false,
            expire_session: false,
        };

        let outcome = self
            .dispatch(policy, None, |http, token| {
                let mut builder = http
                    .post(&url)
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.clone());
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
                builder
            })
            .await;
        let response = match outcome {
            Ok(response) => decode_json(response, None, LOGOUT_PATH).await,
            Err(failure) => failure.into_envelope(),
        };

        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear credentials on logout");
        }
        tracing::info!(status = response.status, "logged out");
        self.events.emit(SessionEventKind::LoggedOut {
            reason: LogoutReason::UserInitiated,
        });
        response
    }

    pub async fn me(&self) -> ApiResponse<UserProfile> {
        self.get(ME_PATH).await
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Returns `false` without touching the store when no refresh token is held or the
    /// exchange fails in any way.
    pub async fn refresh_access_token(&self) -> bool {
        let Some(pair) = self.load_credentials() else {
            tracing::debug!("no refresh token held, skipping refresh");
            return false;
        };

        let url = self.config.url(&self.config.refresh_path);
        let res = self
            .http
            .post(url)
            .json(&RefreshRequest {
                refresh: &pair.refresh_token,
            })
            .send()
            .await;

        let res = match res {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(error = %describe_transport_error(&err), "token refresh failed");
                return false;
            }
        };

        if !res.status().is_success() {
            tracing::warn!(status = res.status().as_u16(), "token refresh rejected");
            return false;
        }

        let parsed: RefreshResponse = match res.json().await {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("token refresh returned an unreadable body");
                return false;
            }
        };
        let Some(access_token) = non_empty(parsed.access) else {
            tracing::warn!("token refresh response has no access token");
            return false;
        };
        let refresh_token = non_empty(parsed.refresh).unwrap_or(pair.refresh_token);

        let next = CredentialPair {
            access_token,
            refresh_token,
        };
        if let Err(err) = self.store.save(&next) {
            tracing::warn!(error = %err, "failed to persist refreshed credentials");
            return false;
        }

        tracing::info!("access token refreshed");
        self.events.emit(SessionEventKind::TokensRefreshed);
        true
    }

    /// Refresh triggered by a 401 carrying `rejected` as its bearer.
    ///
    /// With single-flight enabled, concurrent callers queue on one gate and skip the
    /// exchange when the token they were rejected with has already been replaced.
    pub(crate) async fn refresh_after_rejection(&self, rejected: Option<&str>) -> bool {
        if !self.config.single_flight_refresh {
            return self.refresh_access_token().await;
        }

        let _guard = self.refresh_gate.lock().await;
        let current = self.current_access_token();
        if current.is_some() && current.as_deref() != rejected {
            tracing::debug!("token already refreshed by a concurrent request");
            return true;
        }
        self.refresh_access_token().await
    }

    pub fn set_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        self.store.save(pair)
    }

    pub fn clear_credentials(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    pub fn is_authenticated(&self) -> bool {
        self.load_credentials().is_some()
    }
}
