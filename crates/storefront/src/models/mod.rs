//! Domain models for the storefront.

pub mod cart;
pub mod order;
pub mod session;
pub mod user;
pub mod variant;

pub use cart::{Cart, CartLine, CartLineDetail};
pub use order::{Order, OrderLine, OrderLineDetail, OrderWithLines};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
pub use variant::VariantRecord;
