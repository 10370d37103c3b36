//! Customer account documents: profile, address book, preferences, wishlist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::{AggregateId, DomainError, DomainResult, TenantId, UserId};

pub const MAX_ADDRESSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerProfile {
    pub fn new(
        tenant_id: TenantId,
        user_id: UserId,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            name: non_blank(name),
            email: non_blank(email).map(|e| e.to_lowercase()),
            phone: non_blank(phone),
            created_at: now,
            updated_at: now,
        }
    }

    /// Blank patch fields are ignored rather than clearing the value.
    pub fn apply(&mut self, patch: ProfilePatch, now: DateTime<Utc>) {
        if let Some(name) = non_blank(patch.name) {
            self.name = Some(name);
        }
        if let Some(phone) = non_blank(patch.phone) {
            self.phone = Some(phone);
        }
        self.updated_at = now;
    }

    /// Fill contact fields the profile does not know yet.
    pub fn absorb_contact(&mut self, name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> bool {
        let mut changed = false;
        for (slot, value) in [(&mut self.name, name), (&mut self.email, email), (&mut self.phone, phone)] {
            if slot.is_none() {
                if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                    *slot = Some(v.to_string());
                    changed = true;
                }
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub language: String,
    pub currency: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            currency: "BDT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Preferences {
    pub fn apply(&mut self, patch: PreferencesPatch) -> DomainResult<()> {
        if let Some(lang) = non_blank(patch.language) {
            if !matches!(lang.as_str(), "en" | "bn") {
                return Err(DomainError::validation("language must be en or bn"));
            }
            self.language = lang;
        }
        if let Some(currency) = non_blank(patch.currency) {
            self.currency = currency.to_ascii_uppercase();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    #[default]
    Home,
    Work,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AggregateId,
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: String,
    #[serde(rename = "type")]
    pub kind: AddressKind,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address fields as submitted; on update, `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<AddressKind>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

/// A user's saved addresses. At most [`MAX_ADDRESSES`], exactly one default
/// whenever the book is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook(Vec<Address>);

impl AddressBook {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }

    pub fn addresses(&self) -> &[Address] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Address> {
        self.0
    }

    pub fn default_address(&self) -> Option<&Address> {
        self.0.iter().find(|a| a.is_default)
    }

    pub fn add(&mut self, draft: AddressDraft, now: DateTime<Utc>) -> DomainResult<&Address> {
        let (Some(name), Some(phone), Some(line1), Some(city)) = (
            non_blank(draft.name),
            non_blank(draft.phone),
            non_blank(draft.address_line1),
            non_blank(draft.city),
        ) else {
            return Err(DomainError::validation("Name, phone, address, and city are required"));
        };
        if self.0.len() >= MAX_ADDRESSES {
            return Err(DomainError::validation(format!("Maximum {MAX_ADDRESSES} addresses allowed")));
        }

        let is_default = draft.is_default.unwrap_or(false) || self.0.is_empty();
        if is_default {
            self.clear_default(now);
        }

        self.0.push(Address {
            id: AggregateId::new(),
            name,
            phone,
            address_line1: line1,
            address_line2: non_blank(draft.address_line2),
            city,
            state: non_blank(draft.state),
            zip_code: non_blank(draft.zip_code),
            country: non_blank(draft.country).unwrap_or_else(|| "Bangladesh".to_string()),
            kind: draft.kind.unwrap_or_default(),
            is_default,
            created_at: now,
            updated_at: now,
        });

        let last = self.0.len() - 1;
        Ok(&self.0[last])
    }

    pub fn update(&mut self, id: AggregateId, draft: AddressDraft, now: DateTime<Utc>) -> DomainResult<&Address> {
        let idx = self.position(id)?;
        if draft.is_default == Some(true) {
            self.clear_default(now);
        }

        let a = &mut self.0[idx];
        if let Some(v) = non_blank(draft.name) {
            a.name = v;
        }
        if let Some(v) = non_blank(draft.phone) {
            a.phone = v;
        }
        if let Some(v) = non_blank(draft.address_line1) {
            a.address_line1 = v;
        }
        if draft.address_line2.is_some() {
            a.address_line2 = non_blank(draft.address_line2);
        }
        if let Some(v) = non_blank(draft.city) {
            a.city = v;
        }
        if draft.state.is_some() {
            a.state = non_blank(draft.state);
        }
        if draft.zip_code.is_some() {
            a.zip_code = non_blank(draft.zip_code);
        }
        if let Some(v) = non_blank(draft.country) {
            a.country = v;
        }
        if let Some(kind) = draft.kind {
            a.kind = kind;
        }
        if draft.is_default == Some(true) {
            a.is_default = true;
        }
        a.updated_at = now;

        // Unsetting the only default would leave the book without one.
        if self.default_address().is_none() {
            self.0[idx].is_default = true;
        }

        Ok(&self.0[idx])
    }

    pub fn set_default(&mut self, id: AggregateId, now: DateTime<Utc>) -> DomainResult<()> {
        let idx = self.position(id)?;
        self.clear_default(now);
        self.0[idx].is_default = true;
        Ok(())
    }

    /// Remove an address; if it was the default, the oldest remaining one
    /// takes over.
    pub fn remove(&mut self, id: AggregateId, now: DateTime<Utc>) -> DomainResult<Address> {
        let idx = self.position(id)?;
        let removed = self.0.remove(idx);
        if removed.is_default {
            if let Some(first) = self.0.first_mut() {
                first.is_default = true;
                first.updated_at = now;
            }
        }
        Ok(removed)
    }

    fn position(&self, id: AggregateId) -> DomainResult<usize> {
        self.0.iter().position(|a| a.id == id).ok_or(DomainError::NotFound)
    }

    fn clear_default(&mut self, now: DateTime<Utc>) {
        for a in self.0.iter_mut().filter(|a| a.is_default) {
            a.is_default = false;
            a.updated_at = now;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(Vec<WishlistItem>);

impl Wishlist {
    pub fn new(items: Vec<WishlistItem>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[WishlistItem] {
        &self.0
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.0.iter().any(|i| i.product_id == product_id)
    }

    pub fn add(&mut self, product_id: ProductId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.contains(product_id) {
            return Err(DomainError::conflict("Product already in wishlist"));
        }
        self.0.push(WishlistItem { product_id, added_at: now });
        Ok(())
    }

    pub fn remove(&mut self, product_id: ProductId) -> DomainResult<()> {
        let before = self.0.len();
        self.0.retain(|i| i.product_id != product_id);
        if self.0.len() == before {
            return Err(DomainError::NotFound);
        }
        Ok(())
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(city: &str) -> AddressDraft {
        AddressDraft {
            name: Some("Rahim".into()),
            phone: Some("01711000000".into()),
            address_line1: Some("House 4, Road 2".into()),
            city: Some(city.into()),
            ..Default::default()
        }
    }

    #[test]
    fn first_address_becomes_default() {
        let mut book = AddressBook::default();
        let a = book.add(draft("Dhaka"), Utc::now()).unwrap().clone();
        assert!(a.is_default);
        assert_eq!(a.country, "Bangladesh");

        let b = book.add(draft("Sylhet"), Utc::now()).unwrap().clone();
        assert!(!b.is_default);
    }

    #[test]
    fn only_one_default_at_a_time() {
        let mut book = AddressBook::default();
        book.add(draft("Dhaka"), Utc::now()).unwrap();
        let second = book
            .add(
                AddressDraft {
                    is_default: Some(true),
                    ..draft("Khulna")
                },
                Utc::now(),
            )
            .unwrap()
            .id;

        let defaults: Vec<_> = book.addresses().iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second);
    }

    #[test]
    fn book_is_capped() {
        let mut book = AddressBook::default();
        for _ in 0..MAX_ADDRESSES {
            book.add(draft("Dhaka"), Utc::now()).unwrap();
        }
        let err = book.add(draft("Dhaka"), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("Maximum 5 addresses allowed"));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let mut book = AddressBook::default();
        let err = book
            .add(
                AddressDraft {
                    city: Some("  ".into()),
                    ..draft("Dhaka")
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn removing_default_promotes_oldest_remaining() {
        let mut book = AddressBook::default();
        let first = book.add(draft("Dhaka"), Utc::now()).unwrap().id;
        let second = book.add(draft("Rajshahi"), Utc::now()).unwrap().id;

        book.remove(first, Utc::now()).unwrap();
        assert_eq!(book.default_address().map(|a| a.id), Some(second));
        assert_eq!(book.remove(first, Utc::now()), Err(DomainError::NotFound));
    }

    #[test]
    fn wishlist_rejects_duplicates() {
        let mut w = Wishlist::default();
        let p = ProductId::generate();
        w.add(p, Utc::now()).unwrap();
        assert!(matches!(w.add(p, Utc::now()), Err(DomainError::Conflict(_))));
        w.remove(p).unwrap();
        assert!(w.items().is_empty());
    }

    #[test]
    fn preferences_only_accept_known_languages() {
        let mut p = Preferences::default();
        p.apply(PreferencesPatch {
            language: Some("bn".into()),
            currency: Some("usd".into()),
        })
        .unwrap();
        assert_eq!(p.language, "bn");
        assert_eq!(p.currency, "USD");
        assert!(p
            .apply(PreferencesPatch {
                language: Some("fr".into()),
                ..Default::default()
            })
            .is_err());
    }
}
