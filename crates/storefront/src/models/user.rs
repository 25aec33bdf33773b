//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stride_core::{Email, UserId};

/// A registered storefront user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub created_at: DateTime<Utc>,
}
