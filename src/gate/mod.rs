//! Identity and subscription checks that guard the quiz session.

mod bmac;
mod google;
mod stripe;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

pub use bmac::BmacProvider;
pub use google::GoogleIdentity;
pub use stripe::StripeProvider;

use crate::config::Config;
use crate::error::QuizError;

/// Which billing service decides whether a user is subscribed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProviderKind {
    Stripe,
    Bmac,
}

impl PaymentProviderKind {
    pub fn parse(value: &str) -> Result<Self, QuizError> {
        match value {
            "stripe" => Ok(Self::Stripe),
            "bmac" => Ok(Self::Bmac),
            other => Err(QuizError::InvalidPaymentProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for PaymentProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentProviderKind::Stripe => write!(f, "stripe"),
            PaymentProviderKind::Bmac => write!(f, "bmac"),
        }
    }
}

/// Result of asking a payment provider to cancel a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    /// No billing customer matches the email
    NoCustomer,
    /// The provider offers no cancellation API
    Unsupported,
}

/// Subscription capability, one implementation per billing service
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn is_active_subscriber(&self, email: &str) -> Result<bool>;

    async fn cancel_subscription(&self, email: &str) -> Result<CancelOutcome>;

    /// URL where the user completes payment
    fn checkout_url(&self, email: &str) -> Result<String>;

    fn kind(&self) -> PaymentProviderKind;
}

/// What the login affordance shows while a sign-in is pending
#[derive(Debug, Clone)]
pub struct LoginPrompt {
    pub verification_url: String,
    pub user_code: String,
}

/// External sign-in returning the user's verified email
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the login flow; `None` when the user did not complete it
    async fn sign_in(
        &self,
        show: &(dyn for<'p> Fn(&'p LoginPrompt) + Sync),
    ) -> Result<Option<String>>;
}

/// Identity and subscription state for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSession {
    pub email: Option<String>,
    pub user_subscribed: Option<bool>,
}

impl AuthSession {
    pub fn is_subscribed(&self) -> bool {
        self.user_subscribed == Some(true)
    }

    fn clear(&mut self) {
        self.email = None;
        self.user_subscribed = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    LoginRequired,
    SubscribeRequired { checkout_url: String },
    Granted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    Canceled,
    NoCustomer,
    NotSubscribed,
    Unsupported,
}

/// Identity + subscription precondition in front of the quiz flow
pub struct AccessGate {
    identity: Box<dyn IdentityProvider>,
    payments: Box<dyn PaymentProvider>,
}

impl AccessGate {
    pub fn new(identity: Box<dyn IdentityProvider>, payments: Box<dyn PaymentProvider>) -> Self {
        Self { identity, payments }
    }

    /// Build the gate for the configured payment provider
    ///
    /// An unknown `payment_provider` is fatal.
    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = PaymentProviderKind::parse(&config.payment_provider)?;

        let payments: Box<dyn PaymentProvider> = match kind {
            PaymentProviderKind::Stripe => Box::new(StripeProvider::from_config(config)?),
            PaymentProviderKind::Bmac => Box::new(BmacProvider::from_config(config)?),
        };
        let identity = Box::new(GoogleIdentity::from_config(&config.google)?);

        Ok(Self::new(identity, payments))
    }

    pub fn payment_provider(&self) -> PaymentProviderKind {
        self.payments.kind()
    }

    /// Check identity, then subscription; records the subscription flag on the session
    pub async fn evaluate(&self, session: &mut AuthSession) -> Result<GateDecision> {
        let Some(email) = session.email.clone() else {
            return Ok(GateDecision::LoginRequired);
        };

        if self.payments.is_active_subscriber(&email).await? {
            session.user_subscribed = Some(true);
            info!(provider = %self.payments.kind(), "Subscription verified");
            Ok(GateDecision::Granted)
        } else {
            session.user_subscribed = Some(false);
            info!(provider = %self.payments.kind(), "No active subscription");
            Ok(GateDecision::SubscribeRequired {
                checkout_url: self.payments.checkout_url(&email)?,
            })
        }
    }

    /// Run the login flow and store the verified email; returns whether the user signed in
    pub async fn sign_in(
        &self,
        session: &mut AuthSession,
        show: &(dyn for<'p> Fn(&'p LoginPrompt) + Sync),
    ) -> Result<bool> {
        match self.identity.sign_in(show).await? {
            Some(email) => {
                session.email = Some(email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn logout(&self, session: &mut AuthSession) {
        session.clear();
        info!("Logged out");
    }

    /// Cancel the current user's subscription and log them out on success
    pub async fn cancel(&self, session: &mut AuthSession) -> Result<CancelResult> {
        let email = match (&session.email, session.is_subscribed()) {
            (Some(email), true) => email.clone(),
            _ => {
                warn!("Cancellation requested without an active subscription");
                return Ok(CancelResult::NotSubscribed);
            }
        };

        match self.payments.cancel_subscription(&email).await? {
            CancelOutcome::Canceled => {
                session.clear();
                info!("Subscription canceled");
                Ok(CancelResult::Canceled)
            }
            CancelOutcome::NoCustomer => {
                warn!("No billing customer found for the current user");
                Ok(CancelResult::NoCustomer)
            }
            CancelOutcome::Unsupported => {
                warn!(provider = %self.payments.kind(), "Provider does not support cancellation");
                Ok(CancelResult::Unsupported)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakePayments {
        subscribers: Vec<String>,
        cancel: CancelOutcome,
        cancel_calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PaymentProvider for FakePayments {
        async fn is_active_subscriber(&self, email: &str) -> Result<bool> {
            Ok(self.subscribers.iter().any(|s| s == email))
        }

        async fn cancel_subscription(&self, email: &str) -> Result<CancelOutcome> {
            self.cancel_calls.lock().unwrap().push(email.to_string());
            Ok(self.cancel)
        }

        fn checkout_url(&self, email: &str) -> Result<String> {
            Ok(format!("https://pay.example/?prefilled_email={email}"))
        }

        fn kind(&self) -> PaymentProviderKind {
            PaymentProviderKind::Stripe
        }
    }

    struct FakeIdentity(Option<&'static str>);

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn sign_in(
            &self,
            show: &(dyn for<'p> Fn(&'p LoginPrompt) + Sync),
        ) -> Result<Option<String>> {
            show(&LoginPrompt {
                verification_url: "https://www.google.com/device".into(),
                user_code: "ABCD-EFGH".into(),
            });
            Ok(self.0.map(String::from))
        }
    }

    fn gate(
        identity: Option<&'static str>,
        subscribers: &[&str],
        cancel: CancelOutcome,
    ) -> (AccessGate, Arc<Mutex<Vec<String>>>) {
        let cancel_calls = Arc::new(Mutex::new(Vec::new()));
        let payments = FakePayments {
            subscribers: subscribers.iter().map(|s| s.to_string()).collect(),
            cancel,
            cancel_calls: cancel_calls.clone(),
        };
        (
            AccessGate::new(Box::new(FakeIdentity(identity)), Box::new(payments)),
            cancel_calls,
        )
    }

    fn subscribed_session() -> AuthSession {
        AuthSession {
            email: Some("ada@example.com".into()),
            user_subscribed: Some(true),
        }
    }

    #[test]
    fn test_parse_payment_provider() {
        assert_eq!(PaymentProviderKind::parse("stripe").unwrap(), PaymentProviderKind::Stripe);
        assert_eq!(PaymentProviderKind::parse("bmac").unwrap(), PaymentProviderKind::Bmac);
        assert!(matches!(
            PaymentProviderKind::parse("paypal"),
            Err(QuizError::InvalidPaymentProvider(p)) if p == "paypal"
        ));
        assert!(PaymentProviderKind::parse("Stripe").is_err());
    }

    #[test]
    fn test_invalid_provider_in_config_is_fatal() {
        let mut config = Config::default();
        config.payment_provider = "paypal".into();
        let err = AccessGate::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("payment_provider must be 'stripe' or 'bmac'"));
    }

    #[tokio::test]
    async fn test_unauthenticated_user_must_log_in() {
        let (gate, _) = gate(None, &[], CancelOutcome::Canceled);
        let mut session = AuthSession::default();
        assert_eq!(gate.evaluate(&mut session).await.unwrap(), GateDecision::LoginRequired);
        assert_eq!(session.user_subscribed, None);
    }

    #[tokio::test]
    async fn test_sign_in_stores_email() {
        let (gate, _) = gate(Some("ada@example.com"), &[], CancelOutcome::Canceled);
        let mut session = AuthSession::default();
        let shown = Mutex::new(Vec::new());

        let signed_in = gate
            .sign_in(&mut session, &|p: &LoginPrompt| shown.lock().unwrap().push(p.user_code.clone()))
            .await
            .unwrap();

        assert!(signed_in);
        assert_eq!(session.email.as_deref(), Some("ada@example.com"));
        assert_eq!(*shown.lock().unwrap(), vec!["ABCD-EFGH".to_string()]);
    }

    #[tokio::test]
    async fn test_abandoned_sign_in_leaves_session_anonymous() {
        let (gate, _) = gate(None, &[], CancelOutcome::Canceled);
        let mut session = AuthSession::default();
        assert!(!gate.sign_in(&mut session, &|_: &LoginPrompt| {}).await.unwrap());
        assert_eq!(session, AuthSession::default());
    }

    #[tokio::test]
    async fn test_unsubscribed_user_sees_checkout() {
        let (gate, _) = gate(None, &["someone@example.com"], CancelOutcome::Canceled);
        let mut session = AuthSession {
            email: Some("ada@example.com".into()),
            user_subscribed: None,
        };

        let decision = gate.evaluate(&mut session).await.unwrap();
        assert_eq!(
            decision,
            GateDecision::SubscribeRequired {
                checkout_url: "https://pay.example/?prefilled_email=ada@example.com".into()
            }
        );
        assert_eq!(session.user_subscribed, Some(false));
    }

    #[tokio::test]
    async fn test_subscribed_user_is_granted() {
        let (gate, _) = gate(None, &["ada@example.com"], CancelOutcome::Canceled);
        let mut session = AuthSession {
            email: Some("ada@example.com".into()),
            user_subscribed: None,
        };

        assert_eq!(gate.evaluate(&mut session).await.unwrap(), GateDecision::Granted);
        assert!(session.is_subscribed());
    }

    #[tokio::test]
    async fn test_logout_clears_identity() {
        let (gate, _) = gate(None, &[], CancelOutcome::Canceled);
        let mut session = subscribed_session();
        gate.logout(&mut session);
        assert_eq!(session, AuthSession::default());
        assert_eq!(gate.evaluate(&mut session).await.unwrap(), GateDecision::LoginRequired);
    }

    #[tokio::test]
    async fn test_cancel_clears_session() {
        let (gate, calls) = gate(None, &["ada@example.com"], CancelOutcome::Canceled);
        let mut session = subscribed_session();

        assert_eq!(gate.cancel(&mut session).await.unwrap(), CancelResult::Canceled);
        assert_eq!(session, AuthSession::default());
        assert_eq!(*calls.lock().unwrap(), vec!["ada@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_without_customer_keeps_state() {
        let (gate, _) = gate(None, &["ada@example.com"], CancelOutcome::NoCustomer);
        let mut session = subscribed_session();

        assert_eq!(gate.cancel(&mut session).await.unwrap(), CancelResult::NoCustomer);
        assert_eq!(session, subscribed_session());
    }

    #[tokio::test]
    async fn test_cancel_when_not_subscribed_is_a_warning() {
        let (gate, calls) = gate(None, &[], CancelOutcome::Canceled);
        let mut session = AuthSession {
            email: Some("ada@example.com".into()),
            user_subscribed: Some(false),
        };

        assert_eq!(gate.cancel(&mut session).await.unwrap(), CancelResult::NotSubscribed);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_cancel_keeps_state() {
        let (gate, _) = gate(None, &["ada@example.com"], CancelOutcome::Unsupported);
        let mut session = subscribed_session();
        assert_eq!(gate.cancel(&mut session).await.unwrap(), CancelResult::Unsupported);
        assert!(session.is_subscribed());
    }
}
