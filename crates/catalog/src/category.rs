use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, TenantId, typed_id};

use crate::slugify;

typed_id!(
    /// Category identifier (tenant-scoped via `tenant_id`).
    CategoryId
);

/// Menu category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl CategoryDraft {
    /// Validated name and the slug to store (explicit slug wins).
    fn resolve(&self) -> DomainResult<(String, String)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::required("category name"));
        }

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => slugify(s),
            _ => slugify(name),
        };
        if slug.is_empty() {
            return Err(DomainError::validation("category slug cannot be derived from name"));
        }

        Ok((name.to_string(), slug))
    }
}

impl Category {
    pub fn create(tenant_id: TenantId, draft: CategoryDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let (name, slug) = draft.resolve()?;
        Ok(Self {
            id: CategoryId::generate(),
            tenant_id,
            name,
            slug,
            description: draft.description,
            image: draft.image,
            parent_id: draft.parent_id,
            sort_order: draft.sort_order.unwrap_or(0),
            is_active: draft.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace editable fields; unspecified optional flags keep their value.
    pub fn update(&mut self, draft: CategoryDraft, now: DateTime<Utc>) -> DomainResult<()> {
        let (name, slug) = draft.resolve()?;
        if draft.parent_id == Some(self.id) {
            return Err(DomainError::invariant("category cannot be its own parent"));
        }

        self.name = name;
        self.slug = slug;
        self.description = draft.description;
        self.image = draft.image;
        self.parent_id = draft.parent_id;
        if let Some(order) = draft.sort_order {
            self.sort_order = order;
        }
        if let Some(active) = draft.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Storefront ordering: `sort_order`, then name.
pub fn sort_for_display(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> CategoryDraft {
        CategoryDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn slug_is_derived_from_name() {
        let c = Category::create(TenantId::new(), draft("Rice & Biryani"), Utc::now()).unwrap();
        assert_eq!(c.slug, "rice-biryani");
        assert!(c.is_active);
        assert_eq!(c.sort_order, 0);
    }

    #[test]
    fn explicit_slug_is_normalized() {
        let mut d = draft("Drinks");
        d.slug = Some("Cold Drinks".into());
        let c = Category::create(TenantId::new(), d, Utc::now()).unwrap();
        assert_eq!(c.slug, "cold-drinks");
    }

    #[test]
    fn name_is_required() {
        let err = Category::create(TenantId::new(), draft("  "), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cannot_parent_itself() {
        let mut c = Category::create(TenantId::new(), draft("Soups"), Utc::now()).unwrap();
        let mut d = draft("Soups");
        d.parent_id = Some(c.id);
        assert!(c.update(d, Utc::now()).is_err());
    }

    #[test]
    fn display_order_uses_sort_order_then_name() {
        let t = TenantId::new();
        let now = Utc::now();
        let mut list = vec![
            Category::create(t, CategoryDraft { sort_order: Some(2), ..draft("B") }, now).unwrap(),
            Category::create(t, CategoryDraft { sort_order: Some(1), ..draft("Z") }, now).unwrap(),
            Category::create(t, CategoryDraft { sort_order: Some(2), ..draft("A") }, now).unwrap(),
        ];
        sort_for_display(&mut list);
        let names: Vec<_> = list.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Z", "A", "B"]);
    }
}
