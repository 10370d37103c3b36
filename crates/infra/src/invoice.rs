//! Printable customer invoices.

use storefront_core::Money;
use storefront_sales::{Order, OrderNumber, OrderType};

use crate::integrations::mailer::{escape, item_row, payment_label, summary_row};

fn order_type_label(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::DineIn => "Dine-in",
        OrderType::Takeaway => "Takeaway",
        OrderType::Delivery => "Delivery",
    }
}

/// Render `order` as a standalone HTML page headed with the store's name
/// and phone.
pub fn render_invoice(store_name: &str, store_phone: &str, order: &Order) -> String {
    let currency = order.currency();
    let totals = order.totals();
    let number = order.order_number().map(OrderNumber::as_str).unwrap_or_default();
    let date = order
        .created_at()
        .map(|at| at.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let items: String = order.lines().iter().map(|l| item_row(l, currency)).collect();
    let mut summary = summary_row("Subtotal", &totals.subtotal.display_with(currency));
    if totals.discount.is_positive() {
        let label = match order.coupon_code() {
            Some(code) => format!("Discount ({})", escape(code)),
            None => "Discount".to_string(),
        };
        summary.push_str(&summary_row(&label, &format!("-{}", totals.discount.display_with(currency))));
    }
    let shipping = if totals.shipping_cost == Money::ZERO {
        "FREE".to_string()
    } else {
        totals.shipping_cost.display_with(currency)
    };
    summary.push_str(&summary_row("Shipping", &shipping));
    if totals.tax.is_positive() {
        summary.push_str(&summary_row("Tax", &totals.tax.display_with(currency)));
    }
    summary.push_str(&summary_row("<strong>Total</strong>", &format!("<strong>{}</strong>", totals.total.display_with(currency))));

    let bill_to = order
        .customer()
        .map(|c| {
            let email = c.email.as_deref().map(|e| format!("<br>{}", escape(e))).unwrap_or_default();
            format!("<strong>{}</strong><br>{}{email}", escape(&c.name), escape(&c.phone))
        })
        .unwrap_or_default();
    let ship_to = order
        .shipping_address()
        .map(|a| {
            format!(
                r#"<div><h3>Ship To</h3><p><strong>{}</strong><br>{}<br>{}<br>{}</p></div>"#,
                escape(&a.name),
                escape(&a.phone),
                escape(&a.address),
                escape(&a.city)
            )
        })
        .unwrap_or_default();
    let notes = order
        .notes()
        .map(|n| format!("<h3>Notes</h3><p>{}</p>", escape(n)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><title>Invoice - {number}</title></head>
<body style="font-family:'Segoe UI',sans-serif;color:#333;max-width:800px;margin:0 auto;padding:40px;">
<div style="display:flex;justify-content:space-between;border-bottom:2px solid #f97316;padding-bottom:20px;">
<div><h1 style="color:#f97316;margin:0;">{store}</h1><p>{phone}</p></div>
<div style="text-align:right;"><h2 style="margin:0;">INVOICE</h2><p>{number}<br>{date}</p></div>
</div>
<div style="display:flex;justify-content:space-between;margin:30px 0;">
<div><h3>Bill To</h3><p>{bill_to}</p></div>
{ship_to}
</div>
<table style="width:100%;border-collapse:collapse;">{items}</table>
<table style="width:100%;margin-top:16px;">{summary}</table>
<p>Payment: <strong>{payment}</strong> ({payment_status}) &middot; Order status: {status} &middot; {order_type}</p>
{notes}
<p style="text-align:center;color:#666;font-size:12px;">Thank you for your order!</p>
</body></html>"#,
        number = escape(number),
        store = escape(store_name),
        phone = escape(store_phone),
        payment = payment_label(order.payment_method()),
        payment_status = order.payment_status().as_str(),
        status = order.status().as_str(),
        order_type = order_type_label(order.order_type()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use storefront_catalog::ProductId;
    use storefront_core::{Aggregate, AggregateRoot, Currency, TenantId};
    use storefront_sales::{CustomerInfo, OrderCommand, OrderId, OrderLine, PaymentStatus, PlaceOrder};

    fn order() -> Order {
        let order_id = OrderId::generate();
        let mut order = Order::empty(order_id);
        order
            .execute(&OrderCommand::PlaceOrder(PlaceOrder {
                tenant_id: TenantId::new(),
                order_id,
                order_number: OrderNumber::parse("DC12345678ABCD").unwrap(),
                user_id: None,
                lines: vec![OrderLine {
                    product_id: ProductId::generate(),
                    variant_id: None,
                    name: "Kacchi <Half>".into(),
                    variant_name: None,
                    unit_price: Money::from_major(450),
                    quantity: 2,
                    image: None,
                }],
                discount: Money::from_major(50),
                shipping_cost: Money::ZERO,
                currency: Currency::BDT,
                customer: CustomerInfo { name: "Rahim".into(), phone: "01700000000".into(), email: None },
                shipping_address: None,
                order_type: OrderType::Takeaway,
                payment_method: None,
                payment_status: PaymentStatus::Pending,
                payment_intent_id: None,
                notes: None,
                coupon_code: Some("SAVE50".into()),
                occurred_at: Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap(),
            }))
            .unwrap();
        order
    }

    #[test]
    fn invoice_lists_lines_totals_and_escapes_names() {
        let html = render_invoice("Dhaka Kitchen", "01800000000", &order());

        assert!(html.contains("Invoice - DC12345678ABCD"));
        assert!(html.contains("March 7, 2025"));
        assert!(html.contains("Kacchi &lt;Half&gt;"));
        assert!(html.contains("Discount (SAVE50)"));
        assert!(html.contains("BDT 850.00"));
        assert!(html.contains("FREE"));
        assert!(html.contains("Cash on Delivery"));
        assert!(html.contains("Takeaway"));
    }
}
