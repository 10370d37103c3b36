//! Card payments through the Stripe REST API (form-encoded requests).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{http_client, provider_error};
use crate::config::StripeConfig;
use crate::error::IntegrationError;

const PROVIDER: &str = "stripe";
const API_BASE: &str = "https://api.stripe.com/v1";
const EPHEMERAL_KEY_VERSION: &str = "2024-12-18.acacia";

/// Stripe rejects smaller charges.
pub const MIN_AMOUNT: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateIntent {
    /// Smallest currency unit.
    pub amount: i64,
    /// Lower-case ISO code.
    pub currency: String,
    /// Existing Stripe customer id supplied by the client.
    pub customer_id: Option<String>,
    /// Signed-in customer; used to find or create the Stripe customer.
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CreateIntent {
    pub fn validate(&self) -> Result<(), IntegrationError> {
        if self.amount < MIN_AMOUNT {
            return Err(IntegrationError::InvalidRequest(format!(
                "Amount must be at least {MIN_AMOUNT} (smallest currency unit)"
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(IntegrationError::InvalidRequest("currency is required".into()));
        }
        Ok(())
    }

    fn form(&self, customer: Option<&str>) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(c) = customer {
            form.push(("customer".to_string(), c.to_string()));
        }
        for (k, v) in &self.metadata {
            form.push((format!("metadata[{k}]"), v.clone()));
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub ephemeral_key: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Unix seconds.
    pub created: i64,
}

impl PaymentIntent {
    pub fn is_succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    #[default]
    RequestedByCustomer,
}

impl RefundReason {
    /// Anything Stripe does not know becomes `requested_by_customer`.
    pub fn from_client(reason: Option<&str>) -> Self {
        match reason {
            Some("duplicate") => RefundReason::Duplicate,
            Some("fraudulent") => RefundReason::Fraudulent,
            _ => RefundReason::RequestedByCustomer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::RequestedByCustomer => "requested_by_customer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    /// Partial refund; the full amount when `None`.
    pub amount: Option<i64>,
    pub reason: RefundReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub status: String,
    pub amount: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, IntegrationError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, IntegrationError>;

    async fn refund(&self, request: RefundRequest) -> Result<Refund, IntegrationError>;
}

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct StripeIntent {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    created: i64,
}

impl From<StripeIntent> for PaymentIntent {
    fn from(s: StripeIntent) -> Self {
        PaymentIntent {
            id: s.id,
            client_secret: s.client_secret,
            status: s.status,
            amount: s.amount,
            currency: s.currency,
            customer_id: s.customer,
            ephemeral_key: None,
            metadata: s.metadata,
            created: s.created,
        }
    }
}

#[derive(Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Deserialize)]
struct StripeSecret {
    secret: String,
}

#[derive(Deserialize)]
struct StripeRefund {
    id: String,
    #[serde(default)]
    status: Option<String>,
    amount: i64,
}

impl StripeGateway {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: http_client(),
            secret_key: config.secret_key.clone(),
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, IntegrationError> {
        if !response.status().is_success() {
            return Err(provider_error(PROVIDER, response).await);
        }
        response.json().await.map_err(|e| IntegrationError::transport(PROVIDER, e))
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        stripe_version: Option<&str>,
    ) -> Result<T, IntegrationError> {
        let mut request = self.client.post(self.url(path)).bearer_auth(&self.secret_key).form(form);
        if let Some(version) = stripe_version {
            request = request.header("Stripe-Version", version);
        }
        let response = request.send().await.map_err(|e| IntegrationError::transport(PROVIDER, e))?;
        Self::read(response).await
    }

    async fn find_or_create_customer(&self, email: &str, name: Option<&str>) -> Result<String, IntegrationError> {
        let response = self
            .client
            .get(self.url("customers"))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await
            .map_err(|e| IntegrationError::transport(PROVIDER, e))?;
        let existing: StripeList<StripeObject> = Self::read(response).await?;
        if let Some(customer) = existing.data.into_iter().next() {
            return Ok(customer.id);
        }

        let mut form = vec![("email".to_string(), email.to_string())];
        if let Some(n) = name {
            form.push(("name".to_string(), n.to_string()));
        }
        let created: StripeObject = self.post_form("customers", &form, None).await?;
        Ok(created.id)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip_all, fields(amount = request.amount, currency = %request.currency), err)]
    async fn create_intent(&self, request: CreateIntent) -> Result<PaymentIntent, IntegrationError> {
        request.validate()?;

        let mut customer = request.customer_id.clone();
        let mut ephemeral_key = None;
        if let (None, Some(email)) = (&customer, request.customer_email.as_deref()) {
            let id = self.find_or_create_customer(email, request.customer_name.as_deref()).await?;
            let key: StripeSecret = self
                .post_form(
                    "ephemeral_keys",
                    &[("customer".to_string(), id.clone())],
                    Some(EPHEMERAL_KEY_VERSION),
                )
                .await?;
            ephemeral_key = Some(key.secret);
            customer = Some(id);
        }

        let intent: StripeIntent = self
            .post_form("payment_intents", &request.form(customer.as_deref()), None)
            .await?;
        let mut intent = PaymentIntent::from(intent);
        intent.customer_id = customer;
        intent.ephemeral_key = ephemeral_key;
        tracing::info!(intent_id = %intent.id, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self), err)]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, IntegrationError> {
        if intent_id.trim().is_empty() {
            return Err(IntegrationError::InvalidRequest("Transaction ID is required".into()));
        }
        let response = self
            .client
            .get(self.url(&format!("payment_intents/{intent_id}")))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| IntegrationError::transport(PROVIDER, e))?;
        let intent: StripeIntent = Self::read(response).await?;
        Ok(intent.into())
    }

    #[instrument(skip_all, fields(intent_id = %request.payment_intent_id, reason = request.reason.as_str()), err)]
    async fn refund(&self, request: RefundRequest) -> Result<Refund, IntegrationError> {
        if request.payment_intent_id.trim().is_empty() {
            return Err(IntegrationError::InvalidRequest("Transaction ID is required".into()));
        }
        let mut form = vec![
            ("payment_intent".to_string(), request.payment_intent_id.clone()),
            ("reason".to_string(), request.reason.as_str().to_string()),
        ];
        if let Some(amount) = request.amount {
            form.push(("amount".to_string(), amount.to_string()));
        }

        let refund: StripeRefund = self.post_form("refunds", &form, None).await?;
        Ok(Refund {
            id: refund.id,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
            amount: refund.amount,
        })
    }
}

/// Used when `STRIPE_SECRET_KEY` is not set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_intent(&self, _: CreateIntent) -> Result<PaymentIntent, IntegrationError> {
        Err(IntegrationError::Disabled("stripe"))
    }

    async fn retrieve_intent(&self, _: &str) -> Result<PaymentIntent, IntegrationError> {
        Err(IntegrationError::Disabled("stripe"))
    }

    async fn refund(&self, _: RefundRequest) -> Result<Refund, IntegrationError> {
        Err(IntegrationError::Disabled("stripe"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_below_minimum_are_rejected() {
        let req = CreateIntent { amount: 99, currency: "bdt".into(), ..CreateIntent::default() };
        assert!(matches!(req.validate(), Err(IntegrationError::InvalidRequest(m)) if m.contains("at least 100")));

        let req = CreateIntent { amount: 100, currency: "bdt".into(), ..CreateIntent::default() };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn form_flattens_metadata_and_customer() {
        let mut metadata = BTreeMap::new();
        metadata.insert("userId".to_string(), "guest".to_string());
        let req = CreateIntent { amount: 5000, currency: "BDT".into(), metadata, ..CreateIntent::default() };

        let form = req.form(Some("cus_1"));
        assert!(form.contains(&("currency".into(), "bdt".into())));
        assert!(form.contains(&("customer".into(), "cus_1".into())));
        assert!(form.contains(&("metadata[userId]".into(), "guest".into())));
        assert!(form.contains(&("automatic_payment_methods[enabled]".into(), "true".into())));
    }

    #[test]
    fn refund_reasons_fall_back_to_customer_request() {
        assert_eq!(RefundReason::from_client(Some("duplicate")), RefundReason::Duplicate);
        assert_eq!(RefundReason::from_client(Some("fraudulent")), RefundReason::Fraudulent);
        assert_eq!(RefundReason::from_client(Some("changed my mind")), RefundReason::RequestedByCustomer);
        assert_eq!(RefundReason::from_client(None).as_str(), "requested_by_customer");
    }

    #[tokio::test]
    async fn disabled_gateway_refuses_everything() {
        assert_eq!(DisabledGateway.retrieve_intent("pi_1").await.unwrap_err(), IntegrationError::Disabled("stripe"));
    }
}
