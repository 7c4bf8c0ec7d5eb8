//! REST backend client built on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};

use campus_core::domain::{AuthToken, BackendSession, Profile, Role};
use campus_core::ports::{BackendApi, BackendError, Registration};
use campus_shared::ErrorResponse;
use campus_shared::dto::{LookupUserResponse, ProfileBody, RegisterUserRequest};

/// Backend connection configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// API root, e.g. http://localhost:4000/api
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4000/api".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:4000/api".to_string()),
            timeout: Duration::from_secs(
                std::env::var("BACKEND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// HTTP implementation of the backend port.
///
/// Every call except registration carries the backend-issued bearer token.
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| BackendError::Transport(format!("invalid BACKEND_URL: {}", e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "invalid BACKEND_URL: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        tracing::info!(url = %base, "Backend client configured");

        Ok(Self { client, base })
    }

    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(BackendConfig::from_env())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(Self::error_from(response).await)
    }

    async fn error_from(response: Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status {
            StatusCode::NOT_FOUND => BackendError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
            _ => BackendError::Status {
                status: status.as_u16(),
                detail: ErrorResponse::from_body(&body)
                    .map(|problem| problem.summary().to_string())
                    .unwrap_or(body),
            },
        }
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn lookup_user(&self, provider_id: &str) -> Result<BackendSession, BackendError> {
        let url = self.endpoint(&["auth", "user", provider_id]);
        let response = self.send(self.client.get(url)).await?;

        let body: LookupUserResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let role: Role = body
            .role
            .parse()
            .map_err(|e: campus_core::domain::UnknownRole| BackendError::Decode(e.to_string()))?;

        Ok(BackendSession {
            role,
            user_id: body.user_id,
            token: AuthToken::new(body.token),
        })
    }

    async fn register(&self, registration: &Registration) -> Result<(), BackendError> {
        let body = RegisterUserRequest {
            provider_id: registration.provider_id.clone(),
            name: registration.name.clone(),
            email: registration.email.clone(),
            role: registration.role.as_str().to_string(),
        };

        let url = self.endpoint(&["auth", "register"]);
        self.send(self.client.post(url).json(&body)).await?;

        tracing::debug!(
            provider_id = %registration.provider_id,
            role = %registration.role,
            "User registered"
        );
        Ok(())
    }

    async fn fetch_profile(&self, token: &AuthToken) -> Result<Profile, BackendError> {
        let url = self.endpoint(&["profile"]);
        let response = self
            .send(self.client.get(url).bearer_auth(token.as_str()))
            .await?;

        let body: ProfileBody = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(profile_from_body(body))
    }

    async fn update_profile(
        &self,
        token: &AuthToken,
        profile: &Profile,
    ) -> Result<Profile, BackendError> {
        let url = self.endpoint(&["profile"]);
        let response = self
            .send(
                self.client
                    .put(url)
                    .bearer_auth(token.as_str())
                    .json(&body_from_profile(profile)),
            )
            .await?;

        let body: ProfileBody = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(profile_from_body(body))
    }
}

fn profile_from_body(body: ProfileBody) -> Profile {
    Profile {
        name: body.name,
        email: body.email,
        college_name: body.college_name,
        year: body.year,
        subject: body.subject,
        roll_number: body.roll_number,
    }
}

fn body_from_profile(profile: &Profile) -> ProfileBody {
    ProfileBody {
        name: profile.name.clone(),
        email: profile.email.clone(),
        college_name: profile.college_name.clone(),
        year: profile.year.clone(),
        subject: profile.subject.clone(),
        roll_number: profile.roll_number.clone(),
    }
}
