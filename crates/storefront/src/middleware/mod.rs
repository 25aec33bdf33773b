//! Middleware and request extractors.

pub mod identity;
pub mod session;

pub use identity::{
    ResolvedIdentity, clear_current_user, current_user, guest_token, resolve_or_mint_guest,
    set_current_user, take_guest_token,
};
pub use session::create_session_layer;
