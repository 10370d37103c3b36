//! Transactional email through the Resend REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use storefront_core::{Currency, Money};
use storefront_sales::{OrderLine, OrderPlaced, OrderStatus, PaymentMethod};

use super::{http_client, provider_error};
use crate::config::{BrandConfig, ResendConfig};
use crate::error::IntegrationError;

const PROVIDER: &str = "resend";
const ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message; returns the provider's message id.
    async fn send(&self, email: OutgoingEmail) -> Result<String, IntegrationError>;
}

#[derive(Debug, Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    #[serde(default)]
    id: Option<String>,
}

impl ResendMailer {
    pub fn new(config: &ResendConfig) -> Self {
        Self {
            client: http_client(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            endpoint: ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    #[instrument(skip_all, fields(subject = %email.subject, recipients = email.to.len()), err)]
    async fn send(&self, email: OutgoingEmail) -> Result<String, IntegrationError> {
        if email.to.is_empty() {
            return Err(IntegrationError::InvalidRequest("email has no recipients".into()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ResendRequest {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                html: &email.html,
            })
            .send()
            .await
            .map_err(|e| IntegrationError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(provider_error(PROVIDER, response).await);
        }

        let body: ResendResponse = response.json().await.map_err(|e| IntegrationError::transport(PROVIDER, e))?;
        let id = body.id.unwrap_or_default();
        tracing::info!(message_id = %id, "email sent");
        Ok(id)
    }
}

/// Used when `RESEND_API_KEY` is not set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, IntegrationError> {
        tracing::debug!(subject = %email.subject, "email service not configured; dropping message");
        Err(IntegrationError::Disabled("email"))
    }
}

pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cod => "Cash on Delivery",
        PaymentMethod::Stripe => "Card (Stripe)",
        PaymentMethod::Bkash => "bKash",
    }
}

pub(crate) fn item_row(line: &OrderLine, currency: &Currency) -> String {
    let name = match &line.variant_name {
        Some(v) => format!("{} ({})", escape(&line.name), escape(v)),
        None => escape(&line.name),
    };
    format!(
        r#"<tr><td style="padding:12px;border-bottom:1px solid #eee;"><strong>{name}</strong><br><span style="color:#666;">Qty: {qty}</span></td><td style="padding:12px;border-bottom:1px solid #eee;text-align:right;">{amount}</td></tr>"#,
        qty = line.quantity,
        amount = line.line_total().display_with(currency),
    )
}

pub(crate) fn summary_row(label: &str, value: &str) -> String {
    format!(r#"<tr><td style="color:#666;padding:4px 0;">{label}</td><td style="text-align:right;padding:4px 0;">{value}</td></tr>"#)
}

/// Order confirmation; `None` when the customer left no email address.
pub fn order_confirmation(brand: &BrandConfig, order: &OrderPlaced) -> Option<OutgoingEmail> {
    let to = order.customer.email.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
    let currency = &order.currency;
    let totals = &order.totals;

    let items: String = order.lines.iter().map(|l| item_row(l, currency)).collect();
    let shipping = if totals.shipping_cost == Money::ZERO {
        "FREE".to_string()
    } else {
        totals.shipping_cost.display_with(currency)
    };
    let mut summary = summary_row("Subtotal", &totals.subtotal.display_with(currency));
    if totals.discount.is_positive() {
        summary.push_str(&summary_row("Discount", &format!("-{}", totals.discount.display_with(currency))));
    }
    summary.push_str(&summary_row("Shipping", &shipping));
    summary.push_str(&summary_row("<strong>Total</strong>", &format!("<strong>{}</strong>", totals.total.display_with(currency))));

    let address = order
        .shipping_address
        .as_ref()
        .map(|a| {
            format!(
                r#"<h3>Shipping Address</h3><p><strong>{}</strong><br>{}<br>{}<br>{}</p>"#,
                escape(&a.name),
                escape(&a.phone),
                escape(&a.address),
                escape(&a.city)
            )
        })
        .unwrap_or_default();

    let html = format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>Order Confirmation - {number}</title></head>
<body style="margin:0;padding:0;font-family:'Segoe UI',sans-serif;background:#f5f5f5;">
<div style="max-width:600px;margin:0 auto;padding:20px;background:white;">
<h1 style="text-align:center;">{store}</h1>
<h2 style="text-align:center;">Thank you for your order!</h2>
<p>Hi {customer}, your order has been received.</p>
<p style="text-align:center;font-size:20px;"><strong>{number}</strong></p>
<h3>Order Items</h3><table style="width:100%;border-collapse:collapse;">{items}</table>
<table style="width:100%;margin-top:16px;">{summary}</table>
{address}
<p>Payment method: <strong>{payment}</strong></p>
<p style="text-align:center;"><a href="{url}/track-order">Track Your Order</a></p>
<p style="text-align:center;color:#666;font-size:12px;">Questions? Call us at {phone}<br><a href="{url}">{url}</a></p>
</div></body></html>"#,
        number = order.order_number,
        store = escape(&brand.name),
        customer = escape(&order.customer.name),
        payment = payment_label(order.payment_method),
        url = brand.url,
        phone = escape(&brand.phone),
    );

    Some(OutgoingEmail {
        to: vec![to.to_string()],
        subject: format!("Order Confirmed - {} | {}", order.order_number, brand.name),
        html,
    })
}

fn status_copy(status: OrderStatus) -> (String, String, &'static str) {
    let (title, message, color) = match status {
        OrderStatus::Confirmed => (
            "Order Confirmed!",
            "Your order has been confirmed and is being prepared.",
            "#10b981",
        ),
        OrderStatus::Preparing => ("Order Being Prepared", "Our kitchen is preparing your order.", "#3b82f6"),
        OrderStatus::Ready => ("Order Ready!", "Your order is ready and will be with you soon.", "#8b5cf6"),
        OrderStatus::Delivered => (
            "Order Delivered!",
            "Your order has been delivered. Thank you for shopping with us!",
            "#10b981",
        ),
        OrderStatus::Cancelled => (
            "Order Cancelled",
            "Your order has been cancelled. If you have any questions, please contact us.",
            "#ef4444",
        ),
        other => {
            return (
                format!("Order Update: {}", other.as_str()),
                format!("Your order status has been updated to {}.", other.as_str()),
                "#6b7280",
            );
        }
    };
    (title.to_string(), message.to_string(), color)
}

pub fn status_update(
    brand: &BrandConfig,
    to: &str,
    customer_name: &str,
    order_number: &str,
    status: OrderStatus,
) -> OutgoingEmail {
    let (title, message, color) = status_copy(status);
    let html = format!(
        r#"<!DOCTYPE html><html><body style="margin:0;padding:20px;font-family:'Segoe UI',sans-serif;background:#f5f5f5;">
<div style="max-width:500px;margin:0 auto;background:white;border-radius:16px;overflow:hidden;">
<div style="background:{color};padding:30px;text-align:center;"><h1 style="color:white;margin:0;">{title}</h1></div>
<div style="padding:30px;"><p>Hi {name},</p><p>{message}</p>
<p style="text-align:center;">Order Number<br><strong>{number}</strong></p>
<p style="text-align:center;"><a href="{url}/track-order">Track Order</a></p></div>
</div></body></html>"#,
        name = escape(customer_name),
        number = escape(order_number),
        url = brand.url,
    );

    OutgoingEmail {
        to: vec![to.to_string()],
        subject: format!("{title} - {order_number} | {}", brand.name),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_catalog::ProductId;
    use storefront_core::TenantId;
    use storefront_sales::{CustomerInfo, OrderId, OrderNumber, OrderTotals, OrderType, PaymentStatus};

    fn placed(email: Option<&str>) -> OrderPlaced {
        let lines = vec![OrderLine {
            product_id: ProductId::generate(),
            variant_id: None,
            name: "Kacchi <Special>".into(),
            variant_name: Some("Full".into()),
            unit_price: Money::from_major(450),
            quantity: 2,
            image: None,
        }];
        OrderPlaced {
            tenant_id: TenantId::new(),
            order_id: OrderId::generate(),
            order_number: OrderNumber::parse("DC12345678ABCD").unwrap(),
            user_id: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            payment_intent_id: None,
            order_type: OrderType::Takeaway,
            totals: OrderTotals::compute(&lines, Money::ZERO, Money::ZERO, Money::ZERO),
            lines,
            currency: Currency::BDT,
            customer: CustomerInfo {
                name: "Rahim".into(),
                phone: "01700000000".into(),
                email: email.map(str::to_string),
            },
            shipping_address: None,
            notes: None,
            coupon_code: None,
            occurred_at: Utc::now(),
        }
    }

    fn brand() -> BrandConfig {
        BrandConfig::default()
    }

    #[test]
    fn confirmation_needs_an_email_address() {
        assert!(order_confirmation(&brand(), &placed(None)).is_none());
        assert!(order_confirmation(&brand(), &placed(Some("  "))).is_none());
    }

    #[test]
    fn confirmation_lists_items_and_escapes_names() {
        let email = order_confirmation(&brand(), &placed(Some("rahim@example.com"))).unwrap();

        assert_eq!(email.to, vec!["rahim@example.com".to_string()]);
        assert_eq!(email.subject, "Order Confirmed - DC12345678ABCD | DC Store");
        assert!(email.html.contains("Kacchi &lt;Special&gt; (Full)"));
        assert!(email.html.contains("BDT 900.00"));
        assert!(email.html.contains("FREE"));
        assert!(email.html.contains("Cash on Delivery"));
    }

    #[test]
    fn status_subjects_follow_the_status() {
        let e = status_update(&brand(), "a@b.c", "Rahim", "DC1", OrderStatus::Cancelled);
        assert_eq!(e.subject, "Order Cancelled - DC1 | DC Store");

        let e = status_update(&brand(), "a@b.c", "Rahim", "DC1", OrderStatus::Refunded);
        assert!(e.subject.starts_with("Order Update: refunded"));
        assert!(e.html.contains("updated to refunded"));
    }

    #[tokio::test]
    async fn disabled_mailer_reports_disabled() {
        let err = DisabledMailer
            .send(OutgoingEmail { to: vec!["a@b.c".into()], subject: "s".into(), html: String::new() })
            .await
            .unwrap_err();
        assert_eq!(err, IntegrationError::Disabled("email"));
    }
}
