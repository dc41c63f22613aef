//! Google sign-in using the OAuth 2.0 device authorization grant.
//!
//! The user opens the verification URL on any device, enters the user code
//! and approves the request; meanwhile the token endpoint is polled until it
//! returns an ID token, whose verified email identifies the user.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{IdentityProvider, LoginPrompt};
use crate::config::GoogleConfig;
use crate::error::QuizError;

const GOOGLE_OAUTH_BASE_URL: &str = "https://oauth2.googleapis.com";
const OAUTH_SCOPE: &str = "openid email";
const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

pub struct GoogleIdentity {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    #[serde(alias = "verification_uri")]
    verification_url: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    email: Option<String>,
    /// Google sends this as the string "true" or "false"
    #[serde(default)]
    email_verified: serde_json::Value,
}

impl TokenInfo {
    fn verified_email(self) -> Option<String> {
        let verified = match &self.email_verified {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s == "true",
            _ => false,
        };
        if verified { self.email } else { None }
    }
}

enum Poll {
    Pending,
    SlowDown,
    Complete(String),
    Abandoned,
}

impl GoogleIdentity {
    pub fn new(client_id: &str, client_secret: &str, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            base_url: base_url
                .unwrap_or(GOOGLE_OAUTH_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        if config.client_id.is_empty() {
            return Err(QuizError::MissingCredential("Google OAuth client", "google").into());
        }
        Ok(Self::new(&config.client_id, &config.client_secret, None))
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let response = self
            .client
            .post(format!("{}/device/code", self.base_url))
            .form(&[("client_id", self.client_id.as_str()), ("scope", OAUTH_SCOPE)])
            .send()
            .await
            .context("Failed to start Google sign-in")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Google sign-in error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Google device code response")
    }

    async fn poll_token(&self, device_code: &str) -> Result<Poll> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ])
            .send()
            .await
            .context("Failed to poll Google token endpoint")?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let token: TokenResponse =
                serde_json::from_str(&body).context("Failed to parse Google token response")?;
            let id_token = token
                .id_token
                .context("Google token response did not include an ID token")?;
            return Ok(Poll::Complete(id_token));
        }

        let error: OAuthError = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected Google token response ({}): {}", status, body))?;

        match error.error.as_str() {
            "authorization_pending" => Ok(Poll::Pending),
            "slow_down" => Ok(Poll::SlowDown),
            "access_denied" | "expired_token" => {
                warn!(reason = %error.error, "Google sign-in not completed");
                Ok(Poll::Abandoned)
            }
            other => anyhow::bail!(
                "Google sign-in failed: {}",
                error.error_description.unwrap_or_else(|| other.to_string())
            ),
        }
    }

    async fn verified_email(&self, id_token: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/tokeninfo", self.base_url))
            .query(&[("id_token", id_token)])
            .send()
            .await
            .context("Failed to verify Google ID token")?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Google rejected the ID token ({})", status);
        }

        let info: TokenInfo = response
            .json()
            .await
            .context("Failed to parse Google token info")?;
        Ok(info.verified_email())
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn sign_in(
        &self,
        show: &(dyn for<'p> Fn(&'p LoginPrompt) + Sync),
    ) -> Result<Option<String>> {
        let device = self.request_device_code().await?;
        debug!(expires_in = device.expires_in, interval = device.interval, "Device code issued");

        show(&LoginPrompt {
            verification_url: device.verification_url.clone(),
            user_code: device.user_code.clone(),
        });

        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let mut interval = device.interval;

        let id_token = loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;

            if Instant::now() > deadline {
                warn!("Google sign-in code expired");
                return Ok(None);
            }

            match self.poll_token(&device.device_code).await? {
                Poll::Pending => continue,
                Poll::SlowDown => interval += SLOW_DOWN_INCREMENT_SECS,
                Poll::Complete(id_token) => break id_token,
                Poll::Abandoned => return Ok(None),
            }
        };

        let email = self.verified_email(&id_token).await?;
        match &email {
            Some(_) => info!("Signed in with Google"),
            None => warn!("Google account email is not verified"),
        }
        Ok(email)
    }
}
