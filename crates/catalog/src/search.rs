//! In-memory catalog filtering shared by the storefront and admin listings.

use serde::{Deserialize, Serialize};

use storefront_core::Money;

use crate::{CategoryId, Product};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// Active products only (storefront default).
    #[default]
    Active,
    Inactive,
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

/// Product list filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    /// Case-insensitive substring over name, description and slug.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub featured_only: bool,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub min_price: Option<Money>,
    #[serde(default)]
    pub max_price: Option<Money>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let status_ok = match self.status {
            StatusFilter::Active => product.is_active(),
            StatusFilter::Inactive => !product.is_active(),
            StatusFilter::All => true,
        };
        if !status_ok {
            return false;
        }

        if let Some(q) = self.normalized_query() {
            let details = product.details();
            let hit = details.name.to_lowercase().contains(&q)
                || details.slug.contains(&q)
                || details
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }

        if self.category_id.is_some() && product.category_id() != self.category_id {
            return false;
        }
        if self.featured_only && !product.is_featured() {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price() < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price() > max) {
            return false;
        }

        true
    }

    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty())
    }

    /// Filter and sort.
    pub fn apply(&self, products: Vec<Product>) -> Vec<Product> {
        let mut out: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        match self.sort {
            ProductSort::Newest => out.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
            ProductSort::PriceAsc => out.sort_by_key(|p| p.price()),
            ProductSort::PriceDesc => out.sort_by(|a, b| b.price().cmp(&a.price())),
            ProductSort::Name => out.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase())),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use storefront_core::{Aggregate, TenantId};

    use crate::{CreateProduct, ProductCommand, ProductDetails, ProductId, SetAvailability};

    fn product(tenant: TenantId, name: &str, price: i64, minutes_ago: i64) -> Product {
        let id = ProductId::generate();
        let mut p = Product::empty(id);
        let mut details = ProductDetails::new(name, Money::from_major(price));
        details.description = Some(format!("House special {name}"));
        p.execute(&ProductCommand::CreateProduct(CreateProduct {
            tenant_id: tenant,
            product_id: id,
            details,
            quantity: 5,
            is_active: true,
            occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        }))
        .unwrap();
        p
    }

    #[test]
    fn query_matches_name_description_and_slug() {
        let t = TenantId::new();
        let list = vec![product(t, "Beef Tehari", 250, 3), product(t, "Mango Lassi", 120, 2)];

        let f = ProductFilter { query: Some("  TEHARI ".into()), ..Default::default() };
        assert_eq!(f.apply(list.clone()).len(), 1);

        let f = ProductFilter { query: Some("house special".into()), ..Default::default() };
        assert_eq!(f.apply(list.clone()).len(), 2);

        let f = ProductFilter { query: Some("mango-lassi".into()), ..Default::default() };
        assert_eq!(f.apply(list).len(), 1);
    }

    #[test]
    fn inactive_products_are_hidden_by_default() {
        let t = TenantId::new();
        let mut hidden = product(t, "Old Special", 100, 1);
        hidden
            .execute(&ProductCommand::SetAvailability(SetAvailability {
                tenant_id: t,
                product_id: hidden.id_typed(),
                is_active: false,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let list = vec![hidden, product(t, "Daily", 100, 1)];

        assert_eq!(ProductFilter::default().apply(list.clone()).len(), 1);
        let all = ProductFilter { status: StatusFilter::All, ..Default::default() };
        assert_eq!(all.apply(list.clone()).len(), 2);
        let inactive = ProductFilter { status: StatusFilter::Inactive, ..Default::default() };
        assert_eq!(inactive.apply(list)[0].name(), "Old Special");
    }

    #[test]
    fn sorts_newest_first_by_default_and_by_price() {
        let t = TenantId::new();
        let list = vec![product(t, "Old", 300, 10), product(t, "New", 100, 1), product(t, "Mid", 200, 5)];

        let names: Vec<_> = ProductFilter::default().apply(list.clone()).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["New", "Mid", "Old"]);

        let f = ProductFilter { sort: ProductSort::PriceDesc, max_price: Some(Money::from_major(250)), ..Default::default() };
        let names: Vec<_> = f.apply(list).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["Mid", "New"]);
    }
}
