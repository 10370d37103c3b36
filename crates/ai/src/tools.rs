//! Chat tools: argument parsing, JSON schemas and ownership-checked execution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use storefront_core::{AggregateId, Currency, Money, TenantId, UserId};
use storefront_support::{SupportTicket, TicketCategory, TicketContact, TicketDraft, TicketNumber};

use crate::i18n::{Msg, category_label, format_date, order_status_label};
use crate::{AiError, ChatContext, Locale, ToolCall, ToolSpec};

pub const GET_CUSTOMER_ORDERS: &str = "getCustomerOrders";
pub const GET_ORDER_STATUS: &str = "getOrderStatus";
pub const CREATE_SUPPORT_TICKET: &str = "createSupportTicket";

const DEFAULT_ORDER_LIMIT: u32 = 5;
const MAX_ORDER_LIMIT: u32 = 10;

/// Read-only view of an order as the assistant sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub id: AggregateId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub status: String,
    pub payment_status: String,
    pub total: Money,
    pub currency: Currency,
    pub item_count: usize,
    pub shipping_city: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderReference {
    Id(AggregateId),
    /// Upper-cased order number.
    Number(String),
}

/// Data access the tools need.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    async fn recent_orders(&self, tenant_id: TenantId, user_id: UserId, limit: usize)
    -> Result<Vec<OrderSnapshot>, AiError>;

    async fn find_order(&self, tenant_id: TenantId, reference: OrderReference) -> Result<Option<OrderSnapshot>, AiError>;

    async fn save_ticket(&self, ticket: SupportTicket) -> Result<(), AiError>;
}

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTool {
    GetCustomerOrders { limit: u32 },
    GetOrderStatus { order_number: String },
    CreateSupportTicket { category: TicketCategory, subject: String, description: String, order_id: Option<String> },
}

#[derive(Deserialize)]
struct OrdersArgs {
    limit: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusArgs {
    order_number: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketArgs {
    category: String,
    subject: String,
    description: String,
    order_id: Option<String>,
}

fn args<T: for<'de> Deserialize<'de>>(value: &JsonValue) -> Result<T, String> {
    let value = if value.is_null() { json!({}) } else { value.clone() };
    serde_json::from_value(value).map_err(|e| e.to_string())
}

impl ChatTool {
    /// Parse and validate a model-issued call. The error text is returned to
    /// the model so it can retry.
    pub fn parse(call: &ToolCall) -> Result<Self, Msg> {
        let invalid = Msg::InvalidArguments;
        match call.name.as_str() {
            GET_CUSTOMER_ORDERS => {
                let a: OrdersArgs = args(&call.arguments).map_err(invalid)?;
                let limit = a.limit.unwrap_or(DEFAULT_ORDER_LIMIT);
                if !(1..=MAX_ORDER_LIMIT).contains(&limit) {
                    return Err(Msg::InvalidArguments(format!("limit must be between 1 and {MAX_ORDER_LIMIT}")));
                }
                Ok(ChatTool::GetCustomerOrders { limit })
            }
            GET_ORDER_STATUS => {
                let a: StatusArgs = args(&call.arguments).map_err(invalid)?;
                let order_number = a.order_number.trim().trim_start_matches('#').to_string();
                if order_number.is_empty() {
                    return Err(Msg::InvalidArguments("orderNumber is required".into()));
                }
                Ok(ChatTool::GetOrderStatus { order_number })
            }
            CREATE_SUPPORT_TICKET => {
                let a: TicketArgs = args(&call.arguments).map_err(invalid)?;
                let category = TicketCategory::parse(&a.category)
                    .ok_or_else(|| Msg::InvalidArguments(format!("unknown category '{}'", a.category)))?;
                Ok(ChatTool::CreateSupportTicket {
                    category,
                    subject: a.subject,
                    description: a.description,
                    order_id: a.order_id.filter(|s| !s.trim().is_empty()),
                })
            }
            other => Err(Msg::UnknownTool(other.to_string())),
        }
    }
}

/// JSON-schema tool declarations, described in the chat locale.
pub fn tool_specs(locale: Locale) -> Vec<ToolSpec> {
    let bn = locale.is_bengali();
    let categories: Vec<&str> = TicketCategory::ALL.iter().map(|c| c.as_str()).collect();

    vec![
        ToolSpec {
            name: GET_CUSTOMER_ORDERS.into(),
            description: if bn {
                "Customer এর সাম্প্রতিক orders দেখায়। শুধুমাত্র logged-in user দের জন্য কাজ করে।"
            } else {
                "Shows customer's recent orders. Only works for logged-in users."
            }
            .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer", "minimum": 1, "maximum": MAX_ORDER_LIMIT, "default": DEFAULT_ORDER_LIMIT,
                        "description": "Number of orders to fetch (max 10)"
                    }
                }
            }),
        },
        ToolSpec {
            name: GET_ORDER_STATUS.into(),
            description: if bn {
                "নির্দিষ্ট order এর status দেখায়। Order number দিয়ে খুঁজে।"
            } else {
                "Shows status of a specific order by order number."
            }
            .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "orderNumber": { "type": "string", "description": "The order number to check, e.g. DC12345678ABCD" }
                },
                "required": ["orderNumber"]
            }),
        },
        ToolSpec {
            name: CREATE_SUPPORT_TICKET.into(),
            description: if bn {
                "Customer complaint বা সমস্যার জন্য support ticket তৈরি করে।"
            } else {
                "Creates a support ticket for customer complaints or issues."
            }
            .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "category": { "type": "string", "enum": categories, "description": "Category of the issue" },
                    "subject": { "type": "string", "minLength": 5, "maxLength": 200, "description": "Brief subject/title of the issue" },
                    "description": { "type": "string", "minLength": 10, "maxLength": 1000, "description": "Detailed description of the issue" },
                    "orderId": { "type": "string", "description": "Related order ID or order number if applicable" }
                },
                "required": ["category", "subject", "description"]
            }),
        },
    ]
}

fn failure(msg: Msg, locale: Locale) -> JsonValue {
    json!({ "success": false, "message": msg.render(locale) })
}

/// Executes parsed tools for one caller.
pub struct ToolExecutor<'a, B: ?Sized> {
    backend: &'a B,
    tenant_id: TenantId,
    context: &'a ChatContext,
    locale: Locale,
}

impl<'a, B> ToolExecutor<'a, B>
where
    B: ToolBackend + ?Sized,
{
    pub fn new(backend: &'a B, tenant_id: TenantId, context: &'a ChatContext, locale: Locale) -> Self {
        Self { backend, tenant_id, context, locale }
    }

    /// Run a model tool call. Always yields a `{ success, message, .. }` JSON
    /// result; backend failures are logged and reported as localized failures.
    pub async fn execute(&self, call: &ToolCall) -> JsonValue {
        match ChatTool::parse(call) {
            Ok(tool) => self.run(tool).await,
            Err(msg) => failure(msg, self.locale),
        }
    }

    pub async fn run(&self, tool: ChatTool) -> JsonValue {
        match tool {
            ChatTool::GetCustomerOrders { limit } => self.customer_orders(limit).await,
            ChatTool::GetOrderStatus { order_number } => self.order_status(&order_number).await,
            ChatTool::CreateSupportTicket { category, subject, description, order_id } => {
                self.create_ticket(category, subject, description, order_id).await
            }
        }
    }

    async fn customer_orders(&self, limit: u32) -> JsonValue {
        let Some(user_id) = self.context.user_id else {
            return failure(Msg::LoginToViewOrders, self.locale);
        };

        let orders = match self.backend.recent_orders(self.tenant_id, user_id, limit as usize).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(tenant_id = %self.tenant_id, error = %e, "chat tool: loading orders failed");
                return failure(Msg::OrdersFailed, self.locale);
            }
        };

        if orders.is_empty() {
            return json!({ "success": true, "message": Msg::NoOrders.render(self.locale), "orders": [] });
        }

        let formatted: Vec<JsonValue> = orders
            .iter()
            .map(|o| {
                json!({
                    "orderNumber": o.order_number,
                    "status": order_status_label(&o.status, self.locale),
                    "total": o.total.display_with(&o.currency),
                    "itemCount": o.item_count,
                    "date": format_date(o.created_at, self.locale),
                })
            })
            .collect();

        json!({
            "success": true,
            "message": Msg::RecentOrders(formatted.len()).render(self.locale),
            "orders": formatted,
        })
    }

    async fn order_status(&self, order_number: &str) -> JsonValue {
        let Some(user_id) = self.context.user_id else {
            return failure(Msg::LoginToCheckStatus, self.locale);
        };

        let reference = OrderReference::Number(order_number.to_uppercase());
        let order = match self.backend.find_order(self.tenant_id, reference).await {
            Ok(Some(order)) => order,
            Ok(None) => return failure(Msg::OrderNotFound(order_number.to_string()), self.locale),
            Err(e) => {
                tracing::error!(tenant_id = %self.tenant_id, error = %e, "chat tool: order lookup failed");
                return failure(Msg::StatusFailed, self.locale);
            }
        };

        if order.user_id != Some(user_id) {
            return failure(Msg::NotYourOrder, self.locale);
        }

        json!({
            "success": true,
            "order": {
                "orderNumber": order.order_number,
                "status": order_status_label(&order.status, self.locale),
                "paymentStatus": order.payment_status,
                "total": order.total.display_with(&order.currency),
                "itemCount": order.item_count,
                "shippingCity": order.shipping_city.as_deref().unwrap_or("N/A"),
                "orderDate": format_date(order.created_at, self.locale),
            }
        })
    }

    /// Resolve a model-supplied order reference, keeping it only if the
    /// caller owns the order.
    async fn owned_order(&self, raw: &str) -> Option<AggregateId> {
        let user_id = self.context.user_id?;
        let reference = match Uuid::parse_str(raw.trim()) {
            Ok(uuid) => OrderReference::Id(AggregateId::from_uuid(uuid)),
            Err(_) => OrderReference::Number(raw.trim().trim_start_matches('#').to_uppercase()),
        };

        match self.backend.find_order(self.tenant_id, reference).await {
            Ok(Some(order)) if order.user_id == Some(user_id) => Some(order.id),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(tenant_id = %self.tenant_id, error = %e, "chat tool: order ownership check failed");
                None
            }
        }
    }

    async fn create_ticket(
        &self,
        category: TicketCategory,
        subject: String,
        description: String,
        order_id: Option<String>,
    ) -> JsonValue {
        if !self.context.is_logged_in() && !self.context.has_phone() {
            return failure(Msg::TicketNeedsContact, self.locale);
        }

        let linked_order = match order_id {
            Some(raw) => self.owned_order(&raw).await,
            None => None,
        };

        let now = Utc::now();
        let number = TicketNumber::generate(now, &mut rand::thread_rng());
        let contact = TicketContact {
            name: self.context.user_name.clone().unwrap_or_else(|| "Guest".to_string()),
            email: self.context.user_email.clone(),
            phone: self.context.user_phone.clone(),
        };
        let draft = TicketDraft { category, subject, description, order_id: linked_order };

        let ticket = match SupportTicket::open(self.tenant_id, number, self.context.user_id, contact, draft, now) {
            Ok(ticket) => ticket,
            Err(e) => return failure(Msg::InvalidArguments(e.to_string()), self.locale),
        };
        let ticket_number = ticket.ticket_number.to_string();

        if let Err(e) = self.backend.save_ticket(ticket).await {
            tracing::error!(tenant_id = %self.tenant_id, error = %e, "chat tool: saving ticket failed");
            return failure(Msg::TicketFailed, self.locale);
        }

        json!({
            "success": true,
            "ticketNumber": ticket_number,
            "category": category_label(category, self.locale),
            "message": Msg::TicketCreated(ticket_number.clone()).render(self.locale),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        orders: Vec<OrderSnapshot>,
        tickets: Mutex<Vec<SupportTicket>>,
        fail: bool,
    }

    #[async_trait]
    impl ToolBackend for FakeBackend {
        async fn recent_orders(&self, _t: TenantId, user_id: UserId, limit: usize) -> Result<Vec<OrderSnapshot>, AiError> {
            if self.fail {
                return Err(AiError::Backend("db down".into()));
            }
            Ok(self.orders.iter().filter(|o| o.user_id == Some(user_id)).take(limit).cloned().collect())
        }

        async fn find_order(&self, _t: TenantId, reference: OrderReference) -> Result<Option<OrderSnapshot>, AiError> {
            Ok(self
                .orders
                .iter()
                .find(|o| match &reference {
                    OrderReference::Id(id) => o.id == *id,
                    OrderReference::Number(n) => &o.order_number == n,
                })
                .cloned())
        }

        async fn save_ticket(&self, ticket: SupportTicket) -> Result<(), AiError> {
            if self.fail {
                return Err(AiError::Backend("db down".into()));
            }
            self.tickets.lock().unwrap().push(ticket);
            Ok(())
        }
    }

    fn snapshot(number: &str, owner: Option<UserId>) -> OrderSnapshot {
        OrderSnapshot {
            id: AggregateId::new(),
            order_number: number.into(),
            user_id: owner,
            status: "preparing".into(),
            payment_status: "paid".into(),
            total: Money::from_major(1250),
            currency: Currency::BDT,
            item_count: 2,
            shipping_city: Some("Dhaka".into()),
            created_at: None,
        }
    }

    fn call(name: &str, arguments: JsonValue) -> ToolCall {
        ToolCall { id: "call_1".into(), name: name.into(), arguments }
    }

    fn member(user: UserId) -> ChatContext {
        ChatContext { user_id: Some(user), user_name: Some("Rafi".into()), ..ChatContext::guest() }
    }

    #[test]
    fn parse_applies_defaults_and_bounds() {
        assert_eq!(
            ChatTool::parse(&call(GET_CUSTOMER_ORDERS, JsonValue::Null)).unwrap(),
            ChatTool::GetCustomerOrders { limit: 5 }
        );
        assert!(ChatTool::parse(&call(GET_CUSTOMER_ORDERS, json!({"limit": 11}))).is_err());
        assert!(ChatTool::parse(&call(CREATE_SUPPORT_TICKET, json!({"category": "billing", "subject": "x", "description": "y"}))).is_err());
        assert!(matches!(ChatTool::parse(&call("dropTables", json!({}))), Err(Msg::UnknownTool(_))));
    }

    #[test]
    fn specs_cover_every_tool() {
        let names: Vec<_> = tool_specs(Locale::En).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec![GET_CUSTOMER_ORDERS, GET_ORDER_STATUS, CREATE_SUPPORT_TICKET]);
    }

    #[tokio::test]
    async fn guests_cannot_list_orders() {
        let backend = FakeBackend::default();
        let ctx = ChatContext::guest();
        let exec = ToolExecutor::new(&backend, TenantId::new(), &ctx, Locale::En);

        let out = exec.execute(&call(GET_CUSTOMER_ORDERS, json!({}))).await;
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], "Please login to view your orders.");
    }

    #[tokio::test]
    async fn lists_only_the_callers_orders() {
        let me = UserId::new();
        let backend = FakeBackend {
            orders: vec![snapshot("DC1", Some(me)), snapshot("DC2", Some(UserId::new()))],
            ..FakeBackend::default()
        };
        let ctx = member(me);
        let exec = ToolExecutor::new(&backend, TenantId::new(), &ctx, Locale::En);

        let out = exec.execute(&call(GET_CUSTOMER_ORDERS, json!({"limit": 3}))).await;
        assert_eq!(out["success"], true);
        assert_eq!(out["orders"].as_array().unwrap().len(), 1);
        assert_eq!(out["orders"][0]["total"], "BDT 1250.00");
        assert_eq!(out["orders"][0]["status"], "Preparing");
    }

    #[tokio::test]
    async fn order_status_refuses_foreign_orders() {
        let me = UserId::new();
        let backend = FakeBackend {
            orders: vec![snapshot("DC1", Some(me)), snapshot("DC2", Some(UserId::new()))],
            ..FakeBackend::default()
        };
        let ctx = member(me);
        let exec = ToolExecutor::new(&backend, TenantId::new(), &ctx, Locale::Bn);

        let mine = exec.execute(&call(GET_ORDER_STATUS, json!({"orderNumber": "#dc1"}))).await;
        assert_eq!(mine["success"], true);
        assert_eq!(mine["order"]["shippingCity"], "Dhaka");

        let theirs = exec.execute(&call(GET_ORDER_STATUS, json!({"orderNumber": "DC2"}))).await;
        assert_eq!(theirs["message"], "এই order টি আপনার নয়।");

        let missing = exec.execute(&call(GET_ORDER_STATUS, json!({"orderNumber": "DC9"}))).await;
        assert_eq!(missing["success"], false);
    }

    #[tokio::test]
    async fn ticket_links_only_owned_orders() {
        let me = UserId::new();
        let foreign = snapshot("DC2", Some(UserId::new()));
        let mine = snapshot("DC1", Some(me));
        let backend = FakeBackend { orders: vec![mine.clone(), foreign.clone()], ..FakeBackend::default() };
        let ctx = member(me);
        let exec = ToolExecutor::new(&backend, TenantId::new(), &ctx, Locale::En);

        let args = |order: &str| {
            json!({
                "category": "refund_request",
                "subject": "Wrong item",
                "description": "I received chicken instead of beef.",
                "orderId": order,
            })
        };

        let out = exec.execute(&call(CREATE_SUPPORT_TICKET, args(&mine.id.to_string()))).await;
        assert_eq!(out["success"], true);
        assert_eq!(out["category"], "Refund Request");
        assert!(out["ticketNumber"].as_str().unwrap().starts_with("TKT-"));

        exec.execute(&call(CREATE_SUPPORT_TICKET, args("DC2"))).await;

        let tickets = backend.tickets.lock().unwrap();
        assert_eq!(tickets[0].order_id, Some(mine.id));
        assert_eq!(tickets[1].order_id, None);
        assert_eq!(tickets[0].contact.name, "Rafi");
    }

    #[tokio::test]
    async fn guests_need_a_phone_for_tickets() {
        let backend = FakeBackend::default();
        let args = json!({"category": "other", "subject": "Hello there", "description": "Just a question for you"});

        let anon = ChatContext::guest();
        let out = ToolExecutor::new(&backend, TenantId::new(), &anon, Locale::En)
            .execute(&call(CREATE_SUPPORT_TICKET, args.clone()))
            .await;
        assert_eq!(out["success"], false);

        let with_phone = ChatContext { user_phone: Some("01700000000".into()), ..ChatContext::guest() };
        let out = ToolExecutor::new(&backend, TenantId::new(), &with_phone, Locale::En)
            .execute(&call(CREATE_SUPPORT_TICKET, args))
            .await;
        assert_eq!(out["success"], true);
        assert_eq!(backend.tickets.lock().unwrap()[0].contact.name, "Guest");
    }

    #[tokio::test]
    async fn backend_failures_become_localized_failures() {
        let backend = FakeBackend { fail: true, ..FakeBackend::default() };
        let ctx = member(UserId::new());
        let exec = ToolExecutor::new(&backend, TenantId::new(), &ctx, Locale::En);

        let out = exec.execute(&call(GET_CUSTOMER_ORDERS, json!({}))).await;
        assert_eq!(out["message"], "Failed to load orders.");
    }
}
