use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, TenantId, UserId, typed_id};

use crate::ProductId;

typed_id!(ReviewId);

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A customer's review of a product.
///
/// Reviews start unapproved and only show up publicly once a moderator
/// approves them. `is_verified` is set at submission time when the author
/// has a delivered order containing the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub user_id: UserId,
    #[serde(default)]
    pub author_name: Option<String>,
    pub rating: u8,
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_verified: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
    pub product_id: ProductId,
    pub rating: u8,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Review {
    pub fn submit(
        tenant_id: TenantId,
        user_id: UserId,
        author_name: Option<String>,
        draft: ReviewDraft,
        verified_purchase: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if !(MIN_RATING..=MAX_RATING).contains(&draft.rating) {
            return Err(DomainError::out_of_range("rating", MIN_RATING, MAX_RATING));
        }

        Ok(Self {
            id: ReviewId::generate(),
            tenant_id,
            product_id: draft.product_id,
            user_id,
            author_name,
            rating: draft.rating,
            title: non_blank(draft.title),
            content: non_blank(draft.content),
            is_verified: verified_purchase,
            is_approved: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_approved(&mut self, approved: bool, now: DateTime<Utc>) {
        self.is_approved = approved;
        self.updated_at = now;
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Aggregate rating over approved reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub count: usize,
    /// Mean rating rounded to one decimal, 0 when there are no reviews.
    pub average_rating: f64,
}

impl ReviewSummary {
    pub fn of<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> Self {
        let (count, sum) = reviews
            .into_iter()
            .filter(|r| r.is_approved)
            .fold((0usize, 0u64), |(n, s), r| (n + 1, s + r.rating as u64));

        let average_rating = if count == 0 {
            0.0
        } else {
            ((sum as f64 / count as f64) * 10.0).round() / 10.0
        };

        Self { count, average_rating }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(rating: u8) -> ReviewDraft {
        ReviewDraft {
            product_id: ProductId::generate(),
            rating,
            title: Some("  ".into()),
            content: Some("Loved the kacchi".into()),
        }
    }

    #[test]
    fn rating_bounds_are_enforced() {
        let t = TenantId::new();
        assert!(Review::submit(t, UserId::new(), None, draft(0), false, Utc::now()).is_err());
        assert!(Review::submit(t, UserId::new(), None, draft(6), false, Utc::now()).is_err());
        assert!(Review::submit(t, UserId::new(), None, draft(5), false, Utc::now()).is_ok());
    }

    #[test]
    fn new_reviews_are_pending_and_blank_title_dropped() {
        let r = Review::submit(TenantId::new(), UserId::new(), None, draft(4), true, Utc::now()).unwrap();
        assert!(!r.is_approved);
        assert!(r.is_verified);
        assert_eq!(r.title, None);
        assert_eq!(r.content.as_deref(), Some("Loved the kacchi"));
    }

    #[test]
    fn summary_counts_only_approved() {
        let t = TenantId::new();
        let now = Utc::now();
        let mut a = Review::submit(t, UserId::new(), None, draft(5), false, now).unwrap();
        let mut b = Review::submit(t, UserId::new(), None, draft(4), false, now).unwrap();
        let pending = Review::submit(t, UserId::new(), None, draft(1), false, now).unwrap();
        a.set_approved(true, now);
        b.set_approved(true, now);

        let s = ReviewSummary::of(&[a, b, pending]);
        assert_eq!(s.count, 2);
        assert_eq!(s.average_rating, 4.5);
        assert_eq!(ReviewSummary::of(&[]).average_rating, 0.0);
    }
}
