//! Validated cart line quantity.

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum QuantityError {
    /// The value is zero or negative.
    #[error("quantity must be at least {min} (got {got})", min = Quantity::MIN)]
    NotPositive {
        /// The rejected value.
        got: i32,
    },
    /// The value exceeds the per-line cap.
    #[error("quantity must be at most {max} (got {got})", max = Quantity::MAX)]
    ExceedsMax {
        /// The rejected value.
        got: i32,
    },
}

/// A cart mutation quantity, validated into the 1..=10 bound at construction.
///
/// The bound applies to what a caller may *request* in a single add or
/// update. A stored line's quantity may legitimately exceed the cap after
/// a guest cart is merged into a user cart (merged quantities are summed,
/// not clamped), so stored quantities stay plain integers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i32", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    /// Smallest accepted quantity.
    pub const MIN: i32 = 1;
    /// Largest accepted quantity per request.
    pub const MAX: i32 = 10;
    /// Quantity of one (the add-to-cart default).
    pub const ONE: Self = Self(1);

    /// Construct a `Quantity`, rejecting values outside `1..=10`.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for zero or negative values
    /// and [`QuantityError::ExceedsMax`] for values above the cap.
    pub const fn new(value: i32) -> Result<Self, QuantityError> {
        if value < Self::MIN {
            return Err(QuantityError::NotPositive { got: value });
        }
        if value > Self::MAX {
            return Err(QuantityError::ExceedsMax { got: value });
        }
        Ok(Self(value))
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl TryFrom<i32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
