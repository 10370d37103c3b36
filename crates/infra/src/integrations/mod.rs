//! Outbound integrations.
//!
//! Each provider sits behind a trait with a live client and a fallback that
//! is used when credentials are missing, so the rest of the system never
//! branches on configuration.

pub mod conversions;
pub mod mailer;
pub mod openrouter;
pub mod payments;

pub use conversions::{
    ActionSource, ConversionEvent, ConversionTracker, CustomData, FacebookCapi, NoopTracker, StandardEvent, UserData,
};
pub use mailer::{DisabledMailer, Mailer, OutgoingEmail, ResendMailer};
pub use openrouter::{DisabledLlm, OpenRouterClient};
pub use payments::{
    CreateIntent, DisabledGateway, PaymentGateway, PaymentIntent, Refund, RefundReason, RefundRequest,
    StripeGateway,
};

use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Pull a human-readable message out of a provider error body.
pub(crate) async fn provider_error(provider: &'static str, response: reqwest::Response) -> crate::IntegrationError {
    let status = response.status().as_u16();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body
        .pointer("/error/message")
        .or_else(|| body.get("message"))
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"));
    crate::IntegrationError::Provider {
        provider,
        status,
        message,
    }
}
