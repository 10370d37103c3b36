use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use storefront_core::{AggregateId, DomainError, DomainResult, TenantId, UserId, typed_id};

typed_id!(TicketId);

pub const SUBJECT_LEN: core::ops::RangeInclusive<usize> = 5..=200;
pub const DESCRIPTION_LEN: core::ops::RangeInclusive<usize> = 10..=1000;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    OrderIssue,
    PaymentIssue,
    DeliveryIssue,
    ProductIssue,
    RefundRequest,
    Other,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 6] = [
        TicketCategory::OrderIssue,
        TicketCategory::PaymentIssue,
        TicketCategory::DeliveryIssue,
        TicketCategory::ProductIssue,
        TicketCategory::RefundRequest,
        TicketCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketCategory::OrderIssue => "order_issue",
            TicketCategory::PaymentIssue => "payment_issue",
            TicketCategory::DeliveryIssue => "delivery_issue",
            TicketCategory::ProductIssue => "product_issue",
            TicketCategory::RefundRequest => "refund_request",
            TicketCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Refund requests jump the queue.
    pub fn default_priority(self) -> TicketPriority {
        match self {
            TicketCategory::RefundRequest => TicketPriority::High,
            _ => TicketPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
}

/// `TKT-YYYYMMDD-XXXX` (UTC date + 4 base-36 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(String);

impl TicketNumber {
    pub fn generate(now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let suffix: String = (0..4).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect();
        Self(format!("TKT-{}-{suffix}", now.format("%Y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDraft {
    pub category: TicketCategory,
    pub subject: String,
    pub description: String,
    /// Already verified to belong to the requester.
    #[serde(default)]
    pub order_id: Option<AggregateId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub ticket_number: TicketNumber,
    pub user_id: Option<UserId>,
    pub order_id: Option<AggregateId>,
    pub category: TicketCategory,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub contact: TicketContact,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn check_len(field: &str, value: &str, range: core::ops::RangeInclusive<usize>) -> DomainResult<()> {
    let n = value.chars().count();
    if !range.contains(&n) {
        return Err(DomainError::validation(format!(
            "{field} must be between {} and {} characters",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

impl SupportTicket {
    /// Open a ticket. Requires a signed-in user or a contact phone.
    pub fn open(
        tenant_id: TenantId,
        ticket_number: TicketNumber,
        user_id: Option<UserId>,
        contact: TicketContact,
        draft: TicketDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let has_phone = contact.phone.as_deref().is_some_and(|p| !p.trim().is_empty());
        if user_id.is_none() && !has_phone {
            return Err(DomainError::validation("a phone number or a signed-in account is required"));
        }

        let subject = draft.subject.trim().to_string();
        let description = draft.description.trim().to_string();
        check_len("subject", &subject, SUBJECT_LEN)?;
        check_len("description", &description, DESCRIPTION_LEN)?;

        Ok(Self {
            id: TicketId::generate(),
            tenant_id,
            ticket_number,
            user_id,
            order_id: draft.order_id,
            category: draft.category,
            subject,
            description,
            status: TicketStatus::Open,
            priority: draft.category.default_priority(),
            contact,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_status(&mut self, status: TicketStatus, now: DateTime<Utc>) {
        if self.status != status {
            self.status = status;
            self.updated_at = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn contact(phone: Option<&str>) -> TicketContact {
        TicketContact { name: "Guest".into(), email: None, phone: phone.map(str::to_string) }
    }

    fn draft(category: TicketCategory) -> TicketDraft {
        TicketDraft {
            category,
            subject: "Cold food".into(),
            description: "The biryani arrived cold and late.".into(),
            order_id: None,
        }
    }

    fn number() -> TicketNumber {
        TicketNumber::generate(Utc::now(), &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn ticket_number_embeds_the_date() {
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap();
        let n = TicketNumber::generate(at, &mut StdRng::seed_from_u64(3));
        assert!(n.as_str().starts_with("TKT-20250106-"));
        assert_eq!(n.as_str().len(), "TKT-20250106-XXXX".len());
        assert!(n.as_str()[13..].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn refund_requests_are_high_priority() {
        let t = SupportTicket::open(
            TenantId::new(),
            number(),
            Some(UserId::new()),
            contact(None),
            draft(TicketCategory::RefundRequest),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(t.priority, TicketPriority::High);
        assert_eq!(t.status, TicketStatus::Open);

        let other = SupportTicket::open(
            TenantId::new(),
            number(),
            None,
            contact(Some("01700000000")),
            draft(TicketCategory::DeliveryIssue),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(other.priority, TicketPriority::Medium);
    }

    #[test]
    fn anonymous_tickets_need_a_phone() {
        let err = SupportTicket::open(
            TenantId::new(),
            number(),
            None,
            contact(Some("  ")),
            draft(TicketCategory::Other),
            Utc::now(),
        );
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[test]
    fn subject_and_description_lengths_are_bounded() {
        let mut short = draft(TicketCategory::Other);
        short.subject = "Hey".into();
        assert!(SupportTicket::open(TenantId::new(), number(), Some(UserId::new()), contact(None), short, Utc::now()).is_err());

        let mut long = draft(TicketCategory::Other);
        long.description = "x".repeat(1001);
        assert!(SupportTicket::open(TenantId::new(), number(), Some(UserId::new()), contact(None), long, Utc::now()).is_err());
    }

    #[test]
    fn categories_round_trip_through_strings() {
        for c in TicketCategory::ALL {
            assert_eq!(TicketCategory::parse(c.as_str()), Some(c));
        }
        assert_eq!(TicketCategory::parse("billing"), None);
    }
}
