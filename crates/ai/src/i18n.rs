//! Localized strings for tool results.

use chrono::{DateTime, Utc};

use storefront_support::TicketCategory;

use crate::Locale;

/// User-facing tool messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    LoginToViewOrders,
    LoginToCheckStatus,
    NoOrders,
    RecentOrders(usize),
    OrdersFailed,
    OrderNotFound(String),
    NotYourOrder,
    StatusFailed,
    TicketNeedsContact,
    TicketCreated(String),
    TicketFailed,
    InvalidArguments(String),
    UnknownTool(String),
    StepLimit,
}

impl Msg {
    pub fn render(&self, locale: Locale) -> String {
        let bn = locale.is_bengali();
        match self {
            Msg::LoginToViewOrders if bn => "আপনার orders দেখতে প্রথমে login করুন।".into(),
            Msg::LoginToViewOrders => "Please login to view your orders.".into(),
            Msg::LoginToCheckStatus if bn => "Order status দেখতে প্রথমে login করুন।".into(),
            Msg::LoginToCheckStatus => "Please login to check order status.".into(),
            Msg::NoOrders if bn => "আপনার কোনো order নেই।".into(),
            Msg::NoOrders => "You don't have any orders yet.".into(),
            Msg::RecentOrders(n) if bn => format!("আপনার সাম্প্রতিক {}টি order:", bengali_digits(&n.to_string())),
            Msg::RecentOrders(n) => format!("Your recent {n} orders:"),
            Msg::OrdersFailed if bn => "Orders লোড করতে সমস্যা হয়েছে।".into(),
            Msg::OrdersFailed => "Failed to load orders.".into(),
            Msg::OrderNotFound(n) if bn => format!("Order #{n} পাওয়া যায়নি।"),
            Msg::OrderNotFound(n) => format!("Order #{n} not found."),
            Msg::NotYourOrder if bn => "এই order টি আপনার নয়।".into(),
            Msg::NotYourOrder => "This order does not belong to you.".into(),
            Msg::StatusFailed if bn => "Order status লোড করতে সমস্যা হয়েছে।".into(),
            Msg::StatusFailed => "Failed to load order status.".into(),
            Msg::TicketNeedsContact if bn => "Ticket তৈরি করতে আপনার phone number বা login প্রয়োজন।".into(),
            Msg::TicketNeedsContact => "Please provide your phone number or login to create a ticket.".into(),
            Msg::TicketCreated(n) if bn => format!(
                "আপনার ticket সফলভাবে তৈরি হয়েছে! Ticket Number: {n}। আমাদের টিম শীঘ্রই আপনার সাথে যোগাযোগ করবে।"
            ),
            Msg::TicketCreated(n) => {
                format!("Your ticket has been created successfully! Ticket Number: {n}. Our team will contact you soon.")
            }
            Msg::TicketFailed if bn => "Ticket তৈরি করতে সমস্যা হয়েছে। পরে আবার চেষ্টা করুন।".into(),
            Msg::TicketFailed => "Failed to create ticket. Please try again later.".into(),
            Msg::InvalidArguments(e) if bn => format!("ভুল তথ্য: {e}"),
            Msg::InvalidArguments(e) => format!("Invalid arguments: {e}"),
            Msg::UnknownTool(t) => format!("Unknown tool: {t}"),
            Msg::StepLimit if bn => "দুঃখিত, এই মুহূর্তে উত্তর দিতে পারছি না। আবার চেষ্টা করুন।".into(),
            Msg::StepLimit => "Sorry, I couldn't finish that request. Please try again.".into(),
        }
    }
}

pub fn order_status_label(status: &str, locale: Locale) -> String {
    let (en, bn) = match status {
        "pending" => ("Pending", "অপেক্ষমাণ"),
        "confirmed" => ("Confirmed", "নিশ্চিত"),
        "preparing" => ("Preparing", "প্রস্তুত হচ্ছে"),
        "ready" => ("Ready", "প্রস্তুত"),
        "served" => ("Served", "পরিবেশিত"),
        "delivered" => ("Delivered", "ডেলিভার্ড"),
        "cancelled" => ("Cancelled", "বাতিল"),
        "refunded" => ("Refunded", "রিফান্ড"),
        other => return other.to_string(),
    };
    if locale.is_bengali() { bn } else { en }.to_string()
}

pub fn category_label(category: TicketCategory, locale: Locale) -> &'static str {
    let (en, bn) = match category {
        TicketCategory::OrderIssue => ("Order Issue", "অর্ডার সমস্যা"),
        TicketCategory::PaymentIssue => ("Payment Issue", "পেমেন্ট সমস্যা"),
        TicketCategory::DeliveryIssue => ("Delivery Issue", "ডেলিভারি সমস্যা"),
        TicketCategory::ProductIssue => ("Product Issue", "প্রোডাক্ট সমস্যা"),
        TicketCategory::RefundRequest => ("Refund Request", "রিফান্ড অনুরোধ"),
        TicketCategory::Other => ("Other", "অন্যান্য"),
    };
    if locale.is_bengali() { bn } else { en }
}

/// `M/D/YYYY` for English, `D/M/YYYY` in Bengali digits otherwise.
pub fn format_date(at: Option<DateTime<Utc>>, locale: Locale) -> String {
    match at {
        None => "N/A".to_string(),
        Some(at) if locale.is_bengali() => bengali_digits(&at.format("%-d/%-m/%Y").to_string()),
        Some(at) => at.format("%-m/%-d/%Y").to_string(),
    }
}

pub fn bengali_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x09E6 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_follow_locale_conventions() {
        let at = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
        assert_eq!(format_date(Some(at), Locale::En), "1/6/2025");
        assert_eq!(format_date(Some(at), Locale::Bn), "৬/১/২০২৫");
        assert_eq!(format_date(None, Locale::Bn), "N/A");
    }

    #[test]
    fn unknown_statuses_pass_through() {
        assert_eq!(order_status_label("delivered", Locale::Bn), "ডেলিভার্ড");
        assert_eq!(order_status_label("on_hold", Locale::En), "on_hold");
    }

    #[test]
    fn messages_are_localized() {
        assert_eq!(Msg::RecentOrders(3).render(Locale::En), "Your recent 3 orders:");
        assert_eq!(Msg::RecentOrders(3).render(Locale::Bn), "আপনার সাম্প্রতিক ৩টি order:");
    }
}
