//! Wire and domain types shared by the API client, the workflows and the views.
//!
//! Field names follow the marketplace API (`camelCase`, Mongo-style `_id`).

pub mod coupon;
pub mod order;
pub mod product;
pub mod returns;
pub mod user;

pub use coupon::{AdminSettings, CouponStatus, CouponType, VendorOffer};
pub use order::{
    NewOrder, NewOrderItem, Order, OrderAcceptanceState, OrderLineItem, OrderStatus, PaymentMethod,
    ShippingAddress,
};
pub use product::{EntityRef, Product, ProductRef, UserRef};
pub use returns::{
    ReturnExchange, ReturnRequest, ReturnRequestType, ReturnStatus, ReturnStatusUpdate,
};
pub use user::{AuthUser, Role, UserProfile};
