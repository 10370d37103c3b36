//! Server-side conversion events for the Facebook Conversions API.
//!
//! Personal data is normalized (trimmed, lower-cased, phone reduced to
//! digits) and SHA-256 hashed before it leaves the process. Every event
//! carries an id so the browser pixel and the server can be deduplicated.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use sha2::{Digest, Sha256};
use tracing::instrument;

use storefront_core::{Currency, Money};
use storefront_sales::OrderPlaced;

use super::{http_client, provider_error};
use crate::config::FacebookConfig;
use crate::error::IntegrationError;

const PROVIDER: &str = "facebook";
const GRAPH_URL: &str = "https://graph.facebook.com/v18.0";
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Events the storefront reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandardEvent {
    ViewContent,
    AddToCart,
    InitiateCheckout,
    Purchase,
    Search,
    CompleteRegistration,
    Lead,
}

impl StandardEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            StandardEvent::ViewContent => "ViewContent",
            StandardEvent::AddToCart => "AddToCart",
            StandardEvent::InitiateCheckout => "InitiateCheckout",
            StandardEvent::Purchase => "Purchase",
            StandardEvent::Search => "Search",
            StandardEvent::CompleteRegistration => "CompleteRegistration",
            StandardEvent::Lead => "Lead",
        }
    }

    /// Events a browser may ask the server to relay. `Purchase` is only
    /// ever sent by the order notifier.
    pub fn from_client(name: &str) -> Option<Self> {
        match name {
            "ViewContent" => Some(StandardEvent::ViewContent),
            "AddToCart" => Some(StandardEvent::AddToCart),
            "InitiateCheckout" => Some(StandardEvent::InitiateCheckout),
            "Search" => Some(StandardEvent::Search),
            "CompleteRegistration" => Some(StandardEvent::CompleteRegistration),
            "Lead" => Some(StandardEvent::Lead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    #[default]
    Website,
    App,
    Email,
    PhoneCall,
    Chat,
    Other,
}

/// Raw (unhashed) customer data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub client_ip_address: Option<String>,
    #[serde(default)]
    pub client_user_agent: Option<String>,
    #[serde(default)]
    pub fbc: Option<String>,
    #[serde(default)]
    pub fbp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomData {
    #[serde(default)]
    pub currency: Option<String>,
    /// Value in major units.
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub content_ids: Vec<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub content_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub num_items: Option<i64>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub search_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEvent {
    pub event: StandardEvent,
    pub event_id: String,
    /// Unix seconds.
    pub event_time: i64,
    pub event_source_url: Option<String>,
    pub action_source: ActionSource,
    pub user_data: UserData,
    pub custom_data: Option<CustomData>,
}

/// `{millis}_{9 random base-36 chars}`.
pub fn generate_event_id(rng: &mut impl Rng) -> String {
    let suffix: String = (0..9).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect();
    format!("{}_{suffix}", Utc::now().timestamp_millis())
}

fn major(amount: Money) -> f64 {
    amount.minor() as f64 / 100.0
}

impl ConversionEvent {
    pub fn new(event: StandardEvent) -> Self {
        Self {
            event,
            event_id: generate_event_id(&mut rand::thread_rng()),
            event_time: Utc::now().timestamp(),
            event_source_url: None,
            action_source: ActionSource::Website,
            user_data: UserData::default(),
            custom_data: None,
        }
    }

    /// Reuse the browser pixel's id so both sides deduplicate.
    pub fn with_event_id(mut self, event_id: Option<String>) -> Self {
        if let Some(id) = event_id.filter(|id| !id.trim().is_empty()) {
            self.event_id = id;
        }
        self
    }

    pub fn with_user_data(mut self, user_data: UserData) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.event_source_url = url;
        self
    }

    /// Shape client-supplied custom data the way each event expects it.
    pub fn with_client_data(mut self, data: CustomData) -> Self {
        let currency = data.currency.clone().or_else(|| Some(Currency::BDT.code().to_string()));
        let product = Some("product".to_string());
        self.custom_data = match self.event {
            StandardEvent::ViewContent | StandardEvent::AddToCart => Some(CustomData {
                currency,
                value: Some(data.value.unwrap_or(0.0)),
                content_ids: vec![data.content_id.unwrap_or_default()],
                content_name: Some(data.content_name.unwrap_or_default()),
                content_type: product,
                ..CustomData::default()
            }),
            StandardEvent::InitiateCheckout | StandardEvent::Purchase => Some(CustomData {
                currency,
                value: Some(data.value.unwrap_or(0.0)),
                content_ids: data.content_ids,
                num_items: Some(data.num_items.unwrap_or(0)),
                content_type: product,
                order_id: data.order_id,
                ..CustomData::default()
            }),
            StandardEvent::Search => Some(CustomData {
                search_string: Some(data.search_string.unwrap_or_default()),
                ..CustomData::default()
            }),
            StandardEvent::CompleteRegistration | StandardEvent::Lead => None,
        };
        self
    }

    /// The `Purchase` event for a freshly placed order.
    pub fn purchase(order: &OrderPlaced, store_url: &str) -> Self {
        let (first_name, last_name) = order.customer.split_name();
        let user_data = UserData {
            email: order.customer.email.clone(),
            phone: Some(order.customer.phone.clone()),
            first_name: Some(first_name.to_string()),
            last_name: last_name.map(str::to_string),
            city: order.shipping_address.as_ref().map(|a| a.city.clone()),
            external_id: order.user_id.map(|u| u.to_string()),
            ..UserData::default()
        };
        let num_items = order.lines.iter().map(|l| l.quantity).sum();

        let mut event = Self::new(StandardEvent::Purchase)
            .with_user_data(user_data)
            .with_source_url(Some(format!("{store_url}/checkout")));
        event.custom_data = Some(CustomData {
            currency: Some(order.currency.code().to_string()),
            value: Some(major(order.totals.total)),
            content_ids: order.lines.iter().map(|l| l.product_id.to_string()).collect(),
            num_items: Some(num_items),
            content_type: Some("product".to_string()),
            order_id: Some(order.order_number.to_string()),
            ..CustomData::default()
        });
        event
    }
}

pub(crate) fn hash_pii(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

fn hashed_user_data(user: &UserData) -> Map<String, JsonValue> {
    let mut out = Map::new();
    let mut put_hashed = |key: &str, value: Option<String>| {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            out.insert(key.to_string(), JsonValue::String(hash_pii(&v)));
        }
    };
    put_hashed("em", user.email.clone());
    put_hashed("ph", user.phone.as_deref().map(digits));
    put_hashed("fn", user.first_name.clone());
    put_hashed("ln", user.last_name.clone());
    put_hashed("ct", user.city.clone());
    put_hashed("st", user.state.clone());
    put_hashed("country", user.country.clone());
    put_hashed("external_id", user.external_id.clone());

    for (key, value) in [
        ("client_ip_address", &user.client_ip_address),
        ("client_user_agent", &user.client_user_agent),
        ("fbc", &user.fbc),
        ("fbp", &user.fbp),
    ] {
        if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
            out.insert(key.to_string(), JsonValue::String(v.clone()));
        }
    }
    out
}

fn custom_data_json(data: &CustomData) -> JsonValue {
    let mut out = Map::new();
    out.insert(
        "currency".into(),
        json!(data.currency.clone().unwrap_or_else(|| Currency::BDT.code().to_string())),
    );
    if let Some(v) = data.value {
        out.insert("value".into(), json!(v));
    }
    if !data.content_ids.is_empty() {
        out.insert("content_ids".into(), json!(data.content_ids));
    }
    let optional = [
        ("content_name", data.content_name.as_ref()),
        ("content_type", data.content_type.as_ref()),
        ("order_id", data.order_id.as_ref()),
        ("search_string", data.search_string.as_ref()),
    ];
    for (key, value) in optional {
        if let Some(v) = value {
            out.insert(key.into(), json!(v));
        }
    }
    if let Some(n) = data.num_items {
        out.insert("num_items".into(), json!(n));
    }
    JsonValue::Object(out)
}

/// Request body for the `/{pixel}/events` endpoint.
pub fn event_payload(event: &ConversionEvent, test_event_code: Option<&str>) -> JsonValue {
    let mut data = Map::new();
    data.insert("event_name".into(), json!(event.event.as_str()));
    data.insert("event_time".into(), json!(event.event_time));
    data.insert("event_id".into(), json!(event.event_id));
    if let Some(url) = &event.event_source_url {
        data.insert("event_source_url".into(), json!(url));
    }
    data.insert("action_source".into(), json!(event.action_source));
    data.insert("user_data".into(), JsonValue::Object(hashed_user_data(&event.user_data)));
    if let Some(custom) = &event.custom_data {
        data.insert("custom_data".into(), custom_data_json(custom));
    }

    let mut body = json!({ "data": [JsonValue::Object(data)] });
    if let Some(code) = test_event_code {
        body["test_event_code"] = json!(code);
    }
    body
}

#[async_trait]
pub trait ConversionTracker: Send + Sync {
    /// Deliver one event; returns its (deduplication) id.
    async fn track(&self, event: ConversionEvent) -> Result<String, IntegrationError>;
}

#[derive(Debug, Clone)]
pub struct FacebookCapi {
    client: reqwest::Client,
    pixel_id: String,
    access_token: String,
    test_event_code: Option<String>,
    base_url: String,
}

impl FacebookCapi {
    pub fn new(config: &FacebookConfig) -> Self {
        Self {
            client: http_client(),
            pixel_id: config.pixel_id.clone(),
            access_token: config.access_token.clone(),
            test_event_code: config.test_event_code.clone(),
            base_url: GRAPH_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ConversionTracker for FacebookCapi {
    #[instrument(skip_all, fields(event = event.event.as_str(), event_id = %event.event_id), err)]
    async fn track(&self, event: ConversionEvent) -> Result<String, IntegrationError> {
        let url = format!("{}/{}/events", self.base_url, self.pixel_id);
        let response = self
            .client
            .post(url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&event_payload(&event, self.test_event_code.as_deref()))
            .send()
            .await
            .map_err(|e| IntegrationError::transport(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(provider_error(PROVIDER, response).await);
        }
        tracing::info!("conversion event sent");
        Ok(event.event_id)
    }
}

/// Used when the pixel id or access token is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

#[async_trait]
impl ConversionTracker for NoopTracker {
    async fn track(&self, event: ConversionEvent) -> Result<String, IntegrationError> {
        tracing::debug!(event = event.event.as_str(), "conversions api not configured; skipping event");
        Err(IntegrationError::Disabled("facebook conversions api"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn pii_is_normalized_before_hashing() {
        assert_eq!(hash_pii("  Someone@Example.COM "), hash_pii("someone@example.com"));
        assert_eq!(hash_pii("abc").len(), 64);
        assert_eq!(
            hash_pii("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn phone_is_hashed_as_digits_only() {
        let event = ConversionEvent::new(StandardEvent::Lead).with_user_data(UserData {
            phone: Some("+880 1700-000000".into()),
            client_ip_address: Some("10.0.0.1".into()),
            ..UserData::default()
        });
        let body = event_payload(&event, None);
        let user = &body["data"][0]["user_data"];

        assert_eq!(user["ph"], json!(hash_pii("8801700000000")));
        assert_eq!(user["client_ip_address"], json!("10.0.0.1"));
        assert!(user.get("em").is_none());
    }

    #[test]
    fn event_ids_have_millis_and_random_suffix() {
        let id = generate_event_id(&mut StdRng::seed_from_u64(3));
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn client_view_content_defaults_currency_and_content_type() {
        let event = ConversionEvent::new(StandardEvent::ViewContent).with_client_data(CustomData {
            content_id: Some("p1".into()),
            content_name: Some("Kacchi".into()),
            value: Some(450.0),
            ..CustomData::default()
        });
        let body = event_payload(&event, Some("TEST123"));
        let custom = &body["data"][0]["custom_data"];

        assert_eq!(custom["currency"], json!("BDT"));
        assert_eq!(custom["content_ids"], json!(["p1"]));
        assert_eq!(custom["content_type"], json!("product"));
        assert_eq!(body["data"][0]["action_source"], json!("website"));
        assert_eq!(body["test_event_code"], json!("TEST123"));
    }

    #[test]
    fn lead_has_no_custom_data() {
        let event = ConversionEvent::new(StandardEvent::Lead).with_client_data(CustomData::default());
        assert!(event_payload(&event, None)["data"][0].get("custom_data").is_none());
    }

    #[test]
    fn purchase_is_not_accepted_from_clients() {
        assert_eq!(StandardEvent::from_client("Purchase"), None);
        assert_eq!(StandardEvent::from_client("Search"), Some(StandardEvent::Search));
    }

    #[test]
    fn explicit_event_id_wins() {
        let e = ConversionEvent::new(StandardEvent::Lead).with_event_id(Some("abc".into()));
        assert_eq!(e.event_id, "abc");
        let e = ConversionEvent::new(StandardEvent::Lead).with_event_id(Some(" ".into()));
        assert_ne!(e.event_id, " ");
    }
}
