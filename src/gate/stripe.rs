use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{CancelOutcome, PaymentProvider, PaymentProviderKind};
use crate::config::Config;
use crate::error::QuizError;

/// Stripe customers and subscriptions over the REST API
pub struct StripeProvider {
    client: Client,
    api_key: String,
    payment_link: String,
    base_url: String,
}

#[derive(Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Customer {
    id: String,
}

#[derive(Deserialize)]
struct Subscription {
    id: String,
    status: String,
}

impl StripeProvider {
    pub fn new(api_key: &str, payment_link: &str, base_url: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            payment_link: payment_link.to_string(),
            base_url: base_url
                .unwrap_or("https://api.stripe.com/v1")
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Uses the test key and link when `testing_mode` is set
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.stripe_api_key();
        if api_key.is_empty() {
            return Err(QuizError::MissingCredential("Stripe API key", "stripe").into());
        }

        Ok(Self::new(
            api_key,
            config.stripe_link(),
            config.stripe.base_url.as_deref(),
        ))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await
            .context("Failed to send request to Stripe API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Stripe API error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Stripe response")
    }

    /// Customers registered under `email`, newest first
    async fn customers_by_email(&self, email: &str) -> Result<Vec<Customer>> {
        let customers: List<Customer> = self.get("customers", &[("email", email)]).await?;
        Ok(customers.data)
    }

    /// Subscriptions of a customer that are not canceled
    async fn subscriptions(&self, customer_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions: List<Subscription> = self
            .get("subscriptions", &[("customer", customer_id)])
            .await?;
        Ok(subscriptions.data)
    }

    async fn delete_subscription(&self, subscription_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/subscriptions/{}", self.base_url, subscription_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Failed to send request to Stripe API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Stripe API error ({}): {}", status, error_text);
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn is_active_subscriber(&self, email: &str) -> Result<bool> {
        let customers = self.customers_by_email(email).await?;
        let Some(customer) = customers.first() else {
            return Ok(false);
        };

        let subscriptions = self.subscriptions(&customer.id).await?;
        debug!(
            customer = %customer.id,
            subscriptions = subscriptions.len(),
            "Stripe subscriptions"
        );
        Ok(!subscriptions.is_empty())
    }

    async fn cancel_subscription(&self, email: &str) -> Result<CancelOutcome> {
        let customers = self.customers_by_email(email).await?;
        let Some(customer) = customers.first() else {
            return Ok(CancelOutcome::NoCustomer);
        };

        for subscription in self.subscriptions(&customer.id).await? {
            debug!(subscription = %subscription.id, status = %subscription.status, "Canceling");
            self.delete_subscription(&subscription.id).await?;
        }

        Ok(CancelOutcome::Canceled)
    }

    fn checkout_url(&self, email: &str) -> Result<String> {
        let url = Url::parse_with_params(&self.payment_link, &[("prefilled_email", email)])
            .with_context(|| format!("Invalid Stripe payment link: {}", self.payment_link))?;
        Ok(url.to_string())
    }

    fn kind(&self) -> PaymentProviderKind {
        PaymentProviderKind::Stripe
    }
}
