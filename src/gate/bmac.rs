use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CancelOutcome, PaymentProvider, PaymentProviderKind};
use crate::config::Config;
use crate::error::QuizError;

/// Buy Me a Coffee memberships
pub struct BmacProvider {
    client: Client,
    api_key: String,
    link: String,
    base_url: String,
}

#[derive(Deserialize)]
struct SubscriptionPage {
    data: Vec<Payer>,
    next_page_url: Option<String>,
}

#[derive(Deserialize)]
struct Payer {
    payer_email: Option<String>,
}

impl BmacProvider {
    pub fn new(api_key: &str, link: &str, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            link: link.to_string(),
            base_url: base_url
                .unwrap_or("https://developers.buymeacoffee.com/api/v1")
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.bmac.api_key.is_empty() {
            return Err(QuizError::MissingCredential("Buy Me a Coffee API key", "bmac").into());
        }

        Ok(Self::new(
            &config.bmac.api_key,
            &config.bmac.link,
            config.bmac.base_url.as_deref(),
        ))
    }

    /// Emails of every active member, following pagination
    pub async fn active_payers(&self) -> Result<Vec<String>> {
        let mut payers = Vec::new();
        let mut next = Some(format!("{}/subscriptions?status=active", self.base_url));

        while let Some(url) = next {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .context("Failed to send request to Buy Me a Coffee API")?;

            if !response.status().is_success() {
                let status = response.status();
                anyhow::bail!("Error fetching active subscriptions ({})", status);
            }

            let page: SubscriptionPage = response
                .json()
                .await
                .context("Failed to parse Buy Me a Coffee response")?;

            payers.extend(page.data.into_iter().filter_map(|p| p.payer_email));
            next = page.next_page_url;
        }

        debug!(payers = payers.len(), "Fetched Buy Me a Coffee members");
        Ok(payers)
    }
}

#[async_trait]
impl PaymentProvider for BmacProvider {
    async fn is_active_subscriber(&self, email: &str) -> Result<bool> {
        Ok(self.active_payers().await?.iter().any(|p| p == email))
    }

    async fn cancel_subscription(&self, _email: &str) -> Result<CancelOutcome> {
        Ok(CancelOutcome::Unsupported)
    }

    fn checkout_url(&self, _email: &str) -> Result<String> {
        Ok(self.link.clone())
    }

    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Bmac
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> BmacProvider {
        BmacProvider::new("bmac-token", "https://buymeacoffee.com/quiz", Some(&server.uri()))
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(BmacProvider::from_config(&Config::default()).is_err());
    }

    #[tokio::test]
    async fn test_active_payers_follow_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subscriptions"))
            .and(query_param("status", "active"))
            .and(header("authorization", "Bearer bmac-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"payer_email": "ada@example.com"}, {"payer_email": null}],
                "next_page_url": format!("{}/subscriptions-page-2", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subscriptions-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"payer_email": "grace@example.com"}],
                "next_page_url": null
            })))
            .mount(&server)
            .await;

        let bmac = provider(&server);
        assert_eq!(
            bmac.active_payers().await.unwrap(),
            vec!["ada@example.com".to_string(), "grace@example.com".to_string()]
        );
        assert!(bmac.is_active_subscriber("grace@example.com").await.unwrap());
        assert!(!bmac.is_active_subscriber("eve@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = provider(&server).active_payers().await.unwrap_err();
        assert!(err.to_string().contains("Error fetching active subscriptions"));
    }

    #[tokio::test]
    async fn test_cancel_is_unsupported_and_checkout_is_static() {
        let server = MockServer::start().await;
        let bmac = provider(&server);
        assert_eq!(
            bmac.cancel_subscription("ada@example.com").await.unwrap(),
            CancelOutcome::Unsupported
        );
        assert_eq!(bmac.checkout_url("ada@example.com").unwrap(), "https://buymeacoffee.com/quiz");
    }
}
