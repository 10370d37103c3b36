use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{ProductId, VariantId};
use storefront_core::{Aggregate, AggregateRoot, Currency, DomainError, Money, TenantId, UserId, typed_id};
use storefront_events::Event;

use crate::OrderNumber;

typed_id!(
    /// Order identifier (tenant-scoped via `tenant_id` fields in events/commands).
    OrderId
);

/// Fulfilment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Served,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.as_str() == s)
    }

    /// Cancelled and refunded orders no longer hold stock.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// States a kitchen account may move an order into.
    pub fn is_kitchen_stage(self) -> bool {
        matches!(self, OrderStatus::Preparing | OrderStatus::Ready | OrderStatus::Served)
    }

    /// Still being worked on (counted as "pending" in customer stats).
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Stripe,
    Bkash,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::Stripe => "stripe",
            PaymentMethod::Bkash => "bkash",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
    #[default]
    Delivery,
}

/// Price snapshot of one ordered item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
    #[serde(default)]
    pub image: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CustomerInfo {
    /// First name and the rest, split on the first space.
    pub fn split_name(&self) -> (&str, Option<&str>) {
        let name = self.name.trim();
        match name.split_once(' ') {
            Some((first, rest)) if !rest.trim().is_empty() => (first, Some(rest.trim())),
            _ => (name, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_cost: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `total = subtotal - discount + shipping + tax`, discount capped at subtotal.
    pub fn compute(lines: &[OrderLine], discount: Money, shipping_cost: Money, tax: Money) -> Self {
        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();
        let discount = if discount > subtotal { subtotal } else { discount };
        Self {
            subtotal,
            discount,
            shipping_cost,
            tax,
            total: subtotal - discount + shipping_cost + tax,
        }
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    order_number: Option<OrderNumber>,
    user_id: Option<UserId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    /// Stripe intent that paid for this order; one intent pays one order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_intent_id: Option<String>,
    order_type: OrderType,
    lines: Vec<OrderLine>,
    #[serde(flatten)]
    totals: OrderTotals,
    currency: Currency,
    customer: Option<CustomerInfo>,
    shipping_address: Option<DeliveryAddress>,
    notes: Option<String>,
    coupon_code: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_number: None,
            user_id: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Cod,
            payment_intent_id: None,
            order_type: OrderType::Delivery,
            lines: Vec::new(),
            totals: OrderTotals::default(),
            currency: Currency::BDT,
            customer: None,
            shipping_address: None,
            notes: None,
            coupon_code: None,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_placed(&self) -> bool {
        self.tenant_id.is_some()
    }

    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn totals(&self) -> &OrderTotals {
        &self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    pub fn shipping_address(&self) -> Option<&DeliveryAddress> {
        self.shipping_address.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.lines.iter().any(|l| l.product_id == product_id)
    }

    /// Phone match used by guest order tracking (digits only).
    pub fn phone_matches(&self, phone: &str) -> bool {
        let digits = |s: &str| s.chars().filter(char::is_ascii_digit).collect::<String>();
        let wanted = digits(phone);
        !wanted.is_empty() && self.customer.as_ref().is_some_and(|c| digits(&c.phone) == wanted)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Lines must already carry catalog prices; totals are derived here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: Option<UserId>,
    pub lines: Vec<OrderLine>,
    pub discount: Money,
    pub shipping_cost: Money,
    pub currency: Currency,
    pub customer: CustomerInfo,
    pub shipping_address: Option<DeliveryAddress>,
    pub order_type: OrderType,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangePaymentStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePaymentStatus {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateNotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotes {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeStatus),
    ChangePaymentStatus(ChangePaymentStatus),
    UpdateNotes(UpdateNotes),
}

/// Event: OrderPlaced (full snapshot, consumed by the notifier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub currency: Currency,
    pub customer: CustomerInfo,
    pub shipping_address: Option<DeliveryAddress>,
    pub notes: Option<String>,
    pub coupon_code: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// The order just left the active states; its lines go back to stock.
    pub restock: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesUpdated {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(StatusChanged),
    PaymentStatusChanged(PaymentStatusChanged),
    NotesUpdated(NotesUpdated),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "sales.order.placed",
            OrderEvent::StatusChanged(_) => "sales.order.status_changed",
            OrderEvent::PaymentStatusChanged(_) => "sales.order.payment_status_changed",
            OrderEvent::NotesUpdated(_) => "sales.order.notes_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::PaymentStatusChanged(e) => e.occurred_at,
            OrderEvent::NotesUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_number = Some(e.order_number.clone());
                self.user_id = e.user_id;
                self.status = e.status;
                self.payment_status = e.payment_status;
                self.payment_method = e.payment_method;
                self.payment_intent_id = e.payment_intent_id.clone();
                self.order_type = e.order_type;
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.currency = e.currency.clone();
                self.customer = Some(e.customer.clone());
                self.shipping_address = e.shipping_address.clone();
                self.notes = e.notes.clone();
                self.coupon_code = e.coupon_code.clone();
                self.created_at = Some(e.occurred_at);
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::PaymentStatusChanged(e) => {
                self.payment_status = e.to;
            }
            OrderEvent::NotesUpdated(e) => {
                self.notes = e.notes.clone();
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_status(cmd),
            OrderCommand::ChangePaymentStatus(cmd) => self.handle_payment_status(cmd),
            OrderCommand::UpdateNotes(cmd) => self.handle_notes(cmd),
        }
    }
}

impl Order {
    fn ensure_target(&self, tenant_id: TenantId, order_id: OrderId) -> Result<(), DomainError> {
        if !self.is_placed() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.is_placed() {
            return Err(DomainError::conflict("order already placed"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        if let Some(line) = cmd.lines.iter().find(|l| l.quantity <= 0) {
            return Err(DomainError::validation(format!("quantity for '{}' must be positive", line.name)));
        }
        if cmd.lines.iter().any(|l| l.unit_price.is_negative()) {
            return Err(DomainError::validation("line prices cannot be negative"));
        }
        if cmd.customer.name.trim().is_empty() || cmd.customer.phone.trim().is_empty() {
            return Err(DomainError::validation("customer name and phone are required"));
        }
        match (&cmd.shipping_address, cmd.order_type) {
            (None, OrderType::Delivery) => {
                return Err(DomainError::validation("shipping address is required for delivery orders"));
            }
            (Some(a), _) if a.address.trim().is_empty() || a.city.trim().is_empty() => {
                return Err(DomainError::validation("shipping address needs an address line and city"));
            }
            _ => {}
        }
        if cmd.discount.is_negative() || cmd.shipping_cost.is_negative() {
            return Err(DomainError::validation("discount and shipping cost cannot be negative"));
        }
        if !matches!(cmd.payment_status, PaymentStatus::Pending | PaymentStatus::Paid) {
            return Err(DomainError::validation("new orders are either pending payment or paid"));
        }

        let status = if cmd.payment_status == PaymentStatus::Paid {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        };
        let totals = OrderTotals::compute(&cmd.lines, cmd.discount, cmd.shipping_cost, Money::ZERO);

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            user_id: cmd.user_id,
            status,
            payment_status: cmd.payment_status,
            payment_method: cmd.payment_method.unwrap_or_default(),
            payment_intent_id: cmd.payment_intent_id.clone().filter(|id| !id.trim().is_empty()),
            order_type: cmd.order_type,
            lines: cmd.lines.clone(),
            totals,
            currency: cmd.currency.clone(),
            customer: cmd.customer.clone(),
            shipping_address: cmd.shipping_address.clone(),
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            coupon_code: cmd.coupon_code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;

        if self.status == cmd.status {
            return Ok(vec![]);
        }
        if self.status.is_terminal() && !cmd.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot move a {} order back to {}",
                self.status.as_str(),
                cmd.status.as_str()
            )));
        }

        Ok(vec![OrderEvent::StatusChanged(StatusChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            restock: cmd.status.is_terminal() && !self.status.is_terminal(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment_status(&self, cmd: &ChangePaymentStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;
        if self.payment_status == cmd.payment_status {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::PaymentStatusChanged(PaymentStatusChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.payment_status,
            to: cmd.payment_status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_notes(&self, cmd: &UpdateNotes) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.order_id)?;

        Ok(vec![OrderEvent::NotesUpdated(NotesUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            notes: cmd.notes.clone().filter(|n| !n.trim().is_empty()),
            occurred_at: cmd.occurred_at,
        })])
    }
}
