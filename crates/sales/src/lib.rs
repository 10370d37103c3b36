//! Sales domain module.
//!
//! Orders, carts, coupons, shipping and sales reporting, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod cart;
pub mod coupon;
pub mod order;
pub mod order_number;
pub mod reports;
pub mod shipping;

pub use cart::{Cart, CartLine, CartTotals, MAX_LINE_QUANTITY};
pub use coupon::{AppliedDiscount, Coupon, CouponDraft, CouponId, CouponRejection, Discount, normalize_code};
pub use order::{
    ChangePaymentStatus, ChangeStatus, CustomerInfo, DeliveryAddress, NotesUpdated, Order, OrderCommand, OrderEvent,
    OrderId, OrderLine, OrderPlaced, OrderStatus, OrderTotals, OrderType, PaymentMethod, PaymentStatus,
    PaymentStatusChanged, PlaceOrder, StatusChanged, UpdateNotes,
};
pub use order_number::OrderNumber;
pub use reports::{
    CategoryRevenue, DashboardStats, ProductSales, RecentOrder, ReportSummary, RevenuePoint, TopCustomer,
    UserOrderStats,
};
pub use shipping::{DeliveryZone, ShippingPolicy};
