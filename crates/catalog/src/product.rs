use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, DomainError, DomainResult, Money, TenantId, typed_id};
use storefront_events::Event;

use crate::{CategoryId, slugify};

typed_id!(
    /// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
    ProductId
);

typed_id!(
    /// Identifier of a priced variant of a product ("Half", "Full", ...).
    VariantId
);

pub const MAX_SPICINESS: u8 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietaryInfo {
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
    #[serde(default)]
    pub gluten_free: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: VariantId,
    pub name: String,
    pub price: Money,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Editable product attributes (everything except stock and availability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub compare_at_price: Option<Money>,
    #[serde(default)]
    pub cost_price: Option<Money>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_true")]
    pub track_quantity: bool,
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub dietary: DietaryInfo,
    #[serde(default)]
    pub spiciness: u8,
    #[serde(default)]
    pub preparation_minutes: Option<u32>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

fn default_low_stock_threshold() -> i64 {
    5
}

impl ProductDetails {
    /// Minimal details for a named product at `price`.
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            slug: String::new(),
            description: None,
            price,
            compare_at_price: None,
            cost_price: None,
            sku: None,
            track_quantity: true,
            low_stock_threshold: default_low_stock_threshold(),
            category_id: None,
            images: Vec::new(),
            featured_image: None,
            is_featured: false,
            dietary: DietaryInfo::default(),
            spiciness: 0,
            preparation_minutes: None,
            variants: Vec::new(),
        }
    }

    /// Validate and fill derived fields (slug, featured image).
    pub fn normalized(mut self) -> DomainResult<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        self.slug = if self.slug.trim().is_empty() {
            slugify(&self.name)
        } else {
            slugify(&self.slug)
        };
        if self.slug.is_empty() {
            return Err(DomainError::validation("slug cannot be derived from name"));
        }

        if !self.price.is_positive() {
            return Err(DomainError::validation("price must be greater than zero"));
        }
        if self.compare_at_price.is_some_and(|p| p.is_negative()) || self.cost_price.is_some_and(|p| p.is_negative()) {
            return Err(DomainError::validation("prices cannot be negative"));
        }
        if self.spiciness > MAX_SPICINESS {
            return Err(DomainError::out_of_range("spiciness", 0, MAX_SPICINESS));
        }
        if self.low_stock_threshold < 0 {
            return Err(DomainError::validation("low stock threshold cannot be negative"));
        }
        for v in &self.variants {
            if v.name.trim().is_empty() {
                return Err(DomainError::validation("variant name cannot be empty"));
            }
            if !v.price.is_positive() {
                return Err(DomainError::validation("variant price must be greater than zero"));
            }
        }

        if self.featured_image.is_none() {
            self.featured_image = self.images.first().cloned();
        }
        self.sku = self.sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Ok(self)
    }
}

/// Aggregate root: Product (menu item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    #[serde(flatten)]
    details: ProductDetails,
    quantity: i64,
    is_active: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            details: ProductDetails::new("", Money::ZERO),
            quantity: 0,
            is_active: false,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.tenant_id.is_some()
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn slug(&self) -> &str {
        &self.details.slug
    }

    pub fn price(&self) -> Money {
        self.details.price
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.details.category_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_featured(&self) -> bool {
        self.details.is_featured
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Whether `requested` units can be sold right now.
    pub fn has_stock_for(&self, requested: i64) -> bool {
        !self.details.track_quantity || self.quantity >= requested
    }

    pub fn is_low_stock(&self) -> bool {
        self.details.track_quantity && self.quantity <= self.details.low_stock_threshold
    }

    /// Unit price for the base product or one of its active variants.
    pub fn unit_price(&self, variant: Option<VariantId>) -> DomainResult<Money> {
        match variant {
            None => Ok(self.details.price),
            Some(id) => self
                .details
                .variants
                .iter()
                .find(|v| v.id == id && v.is_active)
                .map(|v| v.price)
                .ok_or_else(|| DomainError::validation(format!("variant {id} is not available"))),
        }
    }

    pub fn variant_name(&self, variant: VariantId) -> Option<&str> {
        self.details.variants.iter().find(|v| v.id == variant).map(|v| v.name.as_str())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub quantity: i64,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct (replaces the editable details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetAvailability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAvailability {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (manual correction, result floored at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock (an order takes `quantity` units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseStock (a cancelled/refunded order gives units back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    SetAvailability(SetAvailability),
    AdjustStock(AdjustStock),
    ReserveStock(ReserveStock),
    ReleaseStock(ReleaseStock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockChangeReason {
    Adjustment,
    Reserved,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub quantity: i64,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub is_active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub reason: StockChangeReason,
    /// Effective change after flooring.
    pub delta: i64,
    pub new_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    AvailabilityChanged(AvailabilityChanged),
    StockChanged(StockChanged),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::AvailabilityChanged(_) => "catalog.product.availability_changed",
            ProductEvent::StockChanged(_) => "catalog.product.stock_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::AvailabilityChanged(e) => e.occurred_at,
            ProductEvent::StockChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.details = e.details.clone();
                self.quantity = e.quantity;
                self.is_active = e.is_active;
                self.created_at = Some(e.occurred_at);
            }
            ProductEvent::ProductUpdated(e) => {
                self.details = e.details.clone();
            }
            ProductEvent::AvailabilityChanged(e) => {
                self.is_active = e.is_active;
            }
            ProductEvent::StockChanged(e) => {
                self.quantity = e.new_quantity;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::SetAvailability(cmd) => self.handle_availability(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            ProductCommand::ReleaseStock(cmd) => self.handle_release(cmd),
        }
    }
}

impl Product {
    fn ensure_target(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.is_created() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn stock_changed(
        &self,
        tenant_id: TenantId,
        reason: StockChangeReason,
        new_quantity: i64,
        occurred_at: DateTime<Utc>,
    ) -> ProductEvent {
        ProductEvent::StockChanged(StockChanged {
            tenant_id,
            product_id: self.id,
            reason,
            delta: new_quantity - self.quantity,
            new_quantity,
            occurred_at,
        })
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        let details = cmd.details.clone().normalized()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            details,
            quantity: cmd.quantity,
            is_active: cmd.is_active,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        let details = cmd.details.clone().normalized()?;

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_availability(&self, cmd: &SetAvailability) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        if self.is_active == cmd.is_active {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::AvailabilityChanged(AvailabilityChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            is_active: cmd.is_active,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta must be non-zero"));
        }

        let new_quantity = self.quantity.saturating_add(cmd.delta).max(0);
        Ok(vec![self.stock_changed(
            cmd.tenant_id,
            StockChangeReason::Adjustment,
            new_quantity,
            cmd.occurred_at,
        )])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !self.details.track_quantity {
            return Ok(vec![]);
        }
        if self.quantity < cmd.quantity {
            return Err(DomainError::invariant(format!(
                "insufficient stock for '{}': requested {}, available {}",
                self.details.name, cmd.quantity, self.quantity
            )));
        }

        Ok(vec![self.stock_changed(
            cmd.tenant_id,
            StockChangeReason::Reserved,
            self.quantity - cmd.quantity,
            cmd.occurred_at,
        )])
    }

    fn handle_release(&self, cmd: &ReleaseStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.product_id)?;
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !self.details.track_quantity {
            return Ok(vec![]);
        }

        Ok(vec![self.stock_changed(
            cmd.tenant_id,
            StockChangeReason::Released,
            self.quantity.saturating_add(cmd.quantity),
            cmd.occurred_at,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn created(tenant_id: TenantId, quantity: i64) -> Product {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        p.execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id,
            product_id: id,
            details: ProductDetails::new("Chicken Biryani", Money::from_major(350)),
            quantity,
            is_active: true,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        p
    }

    fn reserve(p: &Product, tenant_id: TenantId, quantity: i64) -> ProductCommand {
        ProductCommand::ReserveStock(ReserveStock {
            tenant_id,
            product_id: p.id_typed(),
            quantity,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn create_derives_slug_and_defaults() {
        let t = TenantId::new();
        let p = created(t, 10);

        assert_eq!(p.slug(), "chicken-biryani");
        assert_eq!(p.tenant_id(), Some(t));
        assert_eq!(p.quantity(), 10);
        assert_eq!(p.version(), 1);
        assert!(p.details().track_quantity);
    }

    #[test]
    fn create_rejects_bad_details() {
        let id = ProductId::generate();
        let p = Product::empty(id);
        let base = CreateProduct {
            tenant_id: TenantId::new(),
            product_id: id,
            details: ProductDetails::new("Fuchka", Money::from_major(80)),
            quantity: 0,
            is_active: true,
            occurred_at: Utc::now(),
        };

        let mut blank = base.clone();
        blank.details.name = "   ".into();
        assert!(matches!(p.handle(&ProductCommand::CreateProduct(blank)), Err(DomainError::Validation(_))));

        let mut free = base.clone();
        free.details.price = Money::ZERO;
        assert!(p.handle(&ProductCommand::CreateProduct(free)).is_err());

        let mut hot = base.clone();
        hot.details.spiciness = 4;
        assert!(p.handle(&ProductCommand::CreateProduct(hot)).is_err());

        let mut negative = base;
        negative.quantity = -1;
        assert!(p.handle(&ProductCommand::CreateProduct(negative)).is_err());
    }

    #[test]
    fn create_twice_conflicts() {
        let t = TenantId::new();
        let p = created(t, 1);
        let again = ProductCommand::CreateProduct(CreateProduct {
            tenant_id: t,
            product_id: p.id_typed(),
            details: ProductDetails::new("Again", Money::from_major(1)),
            quantity: 0,
            is_active: true,
            occurred_at: Utc::now(),
        });
        assert!(matches!(p.handle(&again), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn reserve_fails_when_insufficient() {
        let t = TenantId::new();
        let p = created(t, 2);

        let err = p.handle(&reserve(&p, t, 3)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => {
                assert!(msg.contains("requested 3"));
                assert!(msg.contains("available 2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reserve_then_release_restores_quantity() {
        let t = TenantId::new();
        let mut p = created(t, 5);

        p.execute(&reserve(&p, t, 3)).unwrap();
        assert_eq!(p.quantity(), 2);

        let release = ProductCommand::ReleaseStock(ReleaseStock {
            tenant_id: t,
            product_id: p.id_typed(),
            quantity: 3,
            occurred_at: Utc::now(),
        });
        p.execute(&release).unwrap();
        assert_eq!(p.quantity(), 5);
    }

    #[test]
    fn untracked_products_ignore_stock_moves() {
        let t = TenantId::new();
        let id = ProductId::generate();
        let mut details = ProductDetails::new("Tea", Money::from_major(20));
        details.track_quantity = false;
        let mut p = Product::empty(id);
        p.execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id: t,
            product_id: id,
            details,
            quantity: 0,
            is_active: true,
            occurred_at: Utc::now(),
        }))
        .unwrap();

        assert!(p.has_stock_for(100));
        assert!(p.handle(&reserve(&p, t, 100)).unwrap().is_empty());
    }

    #[test]
    fn adjust_floors_at_zero() {
        let t = TenantId::new();
        let mut p = created(t, 3);
        let events = p
            .execute(&ProductCommand::AdjustStock(AdjustStock {
                tenant_id: t,
                product_id: p.id_typed(),
                delta: -10,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        assert_eq!(p.quantity(), 0);
        match &events[0] {
            ProductEvent::StockChanged(e) => assert_eq!(e.delta, -3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn foreign_tenant_is_rejected() {
        let p = created(TenantId::new(), 3);
        assert!(matches!(
            p.handle(&reserve(&p, TenantId::new(), 1)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn variant_prices_are_resolved() {
        let t = TenantId::new();
        let mut p = created(t, 3);
        let half = VariantId::generate();
        let mut details = p.details().clone();
        details.variants.push(ProductVariant {
            id: half,
            name: "Half".into(),
            price: Money::from_major(200),
            is_active: true,
        });
        p.execute(&ProductCommand::UpdateProduct(UpdateProduct {
            tenant_id: t,
            product_id: p.id_typed(),
            details,
            occurred_at: Utc::now(),
        }))
        .unwrap();

        assert_eq!(p.unit_price(None).unwrap(), Money::from_major(350));
        assert_eq!(p.unit_price(Some(half)).unwrap(), Money::from_major(200));
        assert!(p.unit_price(Some(VariantId::generate())).is_err());
    }

    #[test]
    fn serializes_flat_camel_case() {
        let p = created(TenantId::new(), 1);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["name"], "Chicken Biryani");
        assert_eq!(json["trackQuantity"], true);
        assert_eq!(json["price"], 35_000);

        let back: Product = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[derive(Debug, Clone)]
    enum Move {
        Adjust(i64),
        Reserve(i64),
        Release(i64),
    }

    fn moves() -> impl Strategy<Value = Move> {
        prop_oneof![
            (-50i64..50).prop_filter("non-zero", |d| *d != 0).prop_map(Move::Adjust),
            (1i64..20).prop_map(Move::Reserve),
            (1i64..20).prop_map(Move::Release),
        ]
    }

    proptest! {
        #[test]
        fn quantity_never_goes_negative(start in 0i64..30, ops in proptest::collection::vec(moves(), 0..40)) {
            let t = TenantId::new();
            let mut p = created(t, start);
            for op in ops {
                let cmd = match op {
                    Move::Adjust(delta) => ProductCommand::AdjustStock(AdjustStock {
                        tenant_id: t, product_id: p.id_typed(), delta, occurred_at: Utc::now(),
                    }),
                    Move::Reserve(quantity) => reserve(&p, t, quantity),
                    Move::Release(quantity) => ProductCommand::ReleaseStock(ReleaseStock {
                        tenant_id: t, product_id: p.id_typed(), quantity, occurred_at: Utc::now(),
                    }),
                };
                let _ = p.execute(&cmd);
                prop_assert!(p.quantity() >= 0);
            }
        }
    }
}
