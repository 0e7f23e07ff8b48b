//! sea-orm entities for the storefront schema created by [`crate::migrator`].

pub mod cart_item;
pub mod category;
pub mod guest_cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod user;

pub use order::{OrderStatus, PaymentStatus};
pub use user::UserRole;
