//! In-memory store backend.
//!
//! Serves local development without a database and doubles as the test
//! harness for everything above the [`Store`] trait. Selected explicitly
//! at startup; it is never a request-time fallback for a failing database.
//!
//! State lives behind a single async mutex, so every operation - including
//! the multi-step merge - is atomic with respect to other callers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use stride_core::{
    CartId, CartLineId, Email, GuestToken, Identity, OrderId, OrderLineId, UserId, VariantId,
};

use super::{MergeOutcome, NewOrder, Store, StoreError};
use crate::models::{
    Cart, CartLine, CartLineDetail, Order, OrderLine, OrderLineDetail, OrderWithLines, User,
    VariantRecord,
};

/// In-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    carts: HashMap<CartId, Cart>,
    owners: HashMap<Identity, CartId>,
    lines: HashMap<CartId, Vec<CartLine>>,
    variants: HashMap<VariantId, VariantRecord>,
    orders: HashMap<OrderId, StoredOrder>,
    users: HashMap<UserId, StoredUser>,
}

struct StoredOrder {
    order: Order,
    lines: Vec<OrderLine>,
}

struct StoredUser {
    user: User,
    password_hash: String,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert catalog reference data (dev/test seeding).
    pub async fn insert_variant(&self, variant: VariantRecord) {
        let mut inner = self.inner.lock().await;
        inner.variants.insert(variant.id, variant);
    }

    /// Remove a variant (test helper for referential-inconsistency paths).
    pub async fn remove_variant(&self, id: VariantId) {
        let mut inner = self.inner.lock().await;
        inner.variants.remove(&id);
    }
}

impl Inner {
    fn get_or_create_cart(&mut self, owner: &Identity) -> Cart {
        if let Some(id) = self.owners.get(owner)
            && let Some(cart) = self.carts.get(id)
        {
            return cart.clone();
        }

        let now = Utc::now();
        let cart = Cart {
            id: CartId::generate(),
            owner: owner.clone(),
            created_at: now,
            updated_at: now,
        };
        self.owners.insert(owner.clone(), cart.id);
        self.carts.insert(cart.id, cart.clone());
        self.lines.insert(cart.id, Vec::new());
        cart
    }

    fn touch_cart(&mut self, cart: CartId) {
        if let Some(c) = self.carts.get_mut(&cart) {
            c.updated_at = Utc::now();
        }
    }

    /// Lines newest-first, matching the Postgres ordering.
    fn lines_newest_first(&self, cart: CartId) -> Vec<CartLine> {
        self.lines
            .get(&cart)
            .map(|lines| lines.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    fn line_detail(&self, line: &CartLine) -> Option<CartLineDetail> {
        let variant = self.variants.get(&line.variant_id)?;
        Some(CartLineDetail {
            id: line.id,
            variant_id: line.variant_id,
            product_id: variant.product_id,
            product_name: variant.product_name.clone(),
            image_url: variant.image_url.clone(),
            color: variant.color.clone(),
            size: variant.size.clone(),
            price: variant.price,
            sale_price: variant.sale_price,
            quantity: line.quantity,
            in_stock: variant.in_stock,
        })
    }

    fn order_with_lines(&self, stored: &StoredOrder) -> OrderWithLines {
        let lines = stored
            .lines
            .iter()
            .filter_map(|line| {
                let variant = self.variants.get(&line.variant_id)?;
                Some(OrderLineDetail {
                    id: line.id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    price_at_purchase: line.price_at_purchase,
                    product_name: variant.product_name.clone(),
                    image_url: variant.image_url.clone(),
                    color: variant.color.clone(),
                    size: variant.size.clone(),
                })
            })
            .collect();

        OrderWithLines {
            order: stored.order.clone(),
            lines,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Carts
    // =========================================================================

    async fn find_cart(&self, owner: &Identity) -> Result<Option<Cart>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .owners
            .get(owner)
            .and_then(|id| inner.carts.get(id))
            .cloned())
    }

    async fn get_or_create_cart(&self, owner: &Identity) -> Result<Cart, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(inner.get_or_create_cart(owner))
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.lines_newest_first(cart))
    }

    async fn cart_lines_detailed(&self, cart: CartId) -> Result<Vec<CartLineDetail>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .lines_newest_first(cart)
            .iter()
            .filter_map(|line| inner.line_detail(line))
            .collect())
    }

    async fn upsert_line(
        &self,
        cart: CartId,
        variant: VariantId,
        delta: i32,
    ) -> Result<CartLineId, StoreError> {
        let mut inner = self.inner.lock().await;
        let lines = inner.lines.entry(cart).or_default();

        let id = if let Some(line) = lines.iter_mut().find(|l| l.variant_id == variant) {
            line.quantity += delta;
            line.id
        } else {
            let line = CartLine {
                id: CartLineId::generate(),
                cart_id: cart,
                variant_id: variant,
                quantity: delta,
            };
            let id = line.id;
            lines.push(line);
            id
        };

        inner.touch_cart(cart);
        Ok(id)
    }

    async fn set_line_quantity(
        &self,
        cart: CartId,
        line: CartLineId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let lines = inner.lines.entry(cart).or_default();

        let Some(existing) = lines.iter_mut().find(|l| l.id == line) else {
            return Err(StoreError::NotFound);
        };

        existing.quantity = quantity;
        inner.touch_cart(cart);
        Ok(())
    }

    async fn remove_line(&self, cart: CartId, line: CartLineId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(lines) = inner.lines.get_mut(&cart) {
            lines.retain(|l| l.id != line);
        }
        inner.touch_cart(cart);
        Ok(())
    }

    async fn clear_cart(&self, cart: CartId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(lines) = inner.lines.get_mut(&cart) {
            lines.clear();
        }
        inner.touch_cart(cart);
        Ok(())
    }

    async fn merge_carts(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        let guest_identity = Identity::guest(guest.clone());
        let Some(guest_cart_id) = inner.owners.get(&guest_identity).copied() else {
            return Ok(MergeOutcome::NothingToMerge);
        };

        let user_cart_id = inner.get_or_create_cart(&Identity::user(user)).id;
        let guest_lines = inner.lines.remove(&guest_cart_id).unwrap_or_default();
        let lines_moved = guest_lines.len() as u64;

        let user_lines = inner.lines.entry(user_cart_id).or_default();
        for guest_line in guest_lines {
            if let Some(line) = user_lines
                .iter_mut()
                .find(|l| l.variant_id == guest_line.variant_id)
            {
                line.quantity += guest_line.quantity;
            } else {
                user_lines.push(CartLine {
                    id: CartLineId::generate(),
                    cart_id: user_cart_id,
                    variant_id: guest_line.variant_id,
                    quantity: guest_line.quantity,
                });
            }
        }

        inner.owners.remove(&guest_identity);
        inner.carts.remove(&guest_cart_id);
        inner.touch_cart(user_cart_id);

        Ok(MergeOutcome::Merged { lines_moved })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn variant(&self, id: VariantId) -> Result<Option<VariantRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.variants.get(&id).cloned())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn create_order(&self, order: NewOrder) -> Result<OrderId, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner
            .orders
            .values()
            .any(|o| o.order.external_session_id == order.external_session_id)
        {
            return Err(StoreError::Conflict(format!(
                "order already exists for session {}",
                order.external_session_id
            )));
        }

        // Mirror the foreign-key constraint on order_lines.variant_id
        for line in &order.lines {
            if !inner.variants.contains_key(&line.variant_id) {
                return Err(StoreError::DataCorruption(format!(
                    "variant {} no longer exists",
                    line.variant_id
                )));
            }
        }

        let order_id = OrderId::generate();
        let stored = StoredOrder {
            order: Order {
                id: order_id,
                owner: order.owner,
                external_session_id: order.external_session_id,
                status: order.status,
                total_amount: order.total_amount,
                created_at: Utc::now(),
            },
            lines: order
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    id: OrderLineId::generate(),
                    order_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    price_at_purchase: line.price_at_purchase,
                })
                .collect(),
        };
        inner.orders.insert(order_id, stored);

        Ok(order_id)
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderWithLines>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).map(|o| inner.order_with_lines(o)))
    }

    async fn order_by_external_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderWithLines>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .find(|o| o.order.external_session_id == session_id)
            .map(|o| inner.order_with_lines(o)))
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, email: &Email, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.users.values().any(|u| u.user.email == *email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }

        let user = User {
            id: UserId::generate(),
            email: email.clone(),
            created_at: Utc::now(),
        };
        inner.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: password_hash.to_owned(),
            },
        );

        Ok(user)
    }

    async fn user_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.user.email == *email)
            .map(|u| (u.user.clone(), u.password_hash.clone())))
    }

    // =========================================================================
    // Health
    // =========================================================================

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use stride_core::{OrderStatus, ProductId};

    use super::*;
    use crate::store::NewOrderLine;

    fn variant(price_cents: i64, sale_cents: Option<i64>) -> VariantRecord {
        VariantRecord {
            id: VariantId::generate(),
            product_id: ProductId::generate(),
            product_name: "Court Vision Low".to_owned(),
            image_url: None,
            color: "White".to_owned(),
            size: "10".to_owned(),
            price: Decimal::new(price_cents, 2),
            sale_price: sale_cents.map(|c| Decimal::new(c, 2)),
            in_stock: 25,
        }
    }

    fn guest_identity() -> (GuestToken, Identity) {
        let token = GuestToken::mint();
        let identity = Identity::guest(token.clone());
        (token, identity)
    }

    #[tokio::test]
    async fn get_or_create_cart_is_idempotent() {
        let store = MemoryStore::new();
        let (_, identity) = guest_identity();

        let first = store.get_or_create_cart(&identity).await.unwrap();
        let second = store.get_or_create_cart(&identity).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn upsert_increments_instead_of_duplicating() {
        let store = MemoryStore::new();
        let (_, identity) = guest_identity();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let cart = store.get_or_create_cart(&identity).await.unwrap();
        let first = store.upsert_line(cart.id, v.id, 2).await.unwrap();
        let second = store.upsert_line(cart.id, v.id, 3).await.unwrap();
        assert_eq!(first, second);

        let lines = store.cart_lines(cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn set_line_quantity_requires_existing_line() {
        let store = MemoryStore::new();
        let (_, identity) = guest_identity();
        let cart = store.get_or_create_cart(&identity).await.unwrap();

        let result = store
            .set_line_quantity(cart.id, CartLineId::generate(), 4)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn remove_line_is_idempotent() {
        let store = MemoryStore::new();
        let (_, identity) = guest_identity();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let cart = store.get_or_create_cart(&identity).await.unwrap();
        let line = store.upsert_line(cart.id, v.id, 1).await.unwrap();

        store.remove_line(cart.id, line).await.unwrap();
        // Removing again (or a line that never existed) is a silent no-op
        store.remove_line(cart.id, line).await.unwrap();
        store
            .remove_line(cart.id, CartLineId::generate())
            .await
            .unwrap();

        assert!(store.cart_lines(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_cart_is_idempotent_and_keeps_cart() {
        let store = MemoryStore::new();
        let (_, identity) = guest_identity();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let cart = store.get_or_create_cart(&identity).await.unwrap();
        store.upsert_line(cart.id, v.id, 2).await.unwrap();

        store.clear_cart(cart.id).await.unwrap();
        store.clear_cart(cart.id).await.unwrap();

        assert!(store.cart_lines(cart.id).await.unwrap().is_empty());
        // The emptied cart persists; it must not resurrect old lines
        let found = store.find_cart(&identity).await.unwrap().unwrap();
        assert_eq!(found.id, cart.id);
        assert!(store.cart_lines(found.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_sums_shared_variants_and_moves_the_rest() {
        let store = MemoryStore::new();
        let (token, guest) = guest_identity();
        let user_id = UserId::generate();
        let user = Identity::user(user_id);

        let shared = variant(4999, None);
        let user_only = variant(8999, None);
        store.insert_variant(shared.clone()).await;
        store.insert_variant(user_only.clone()).await;

        // Guest cart {shared: 2}; user cart {shared: 1, user_only: 3}
        let guest_cart = store.get_or_create_cart(&guest).await.unwrap();
        store.upsert_line(guest_cart.id, shared.id, 2).await.unwrap();

        let user_cart = store.get_or_create_cart(&user).await.unwrap();
        store.upsert_line(user_cart.id, shared.id, 1).await.unwrap();
        store
            .upsert_line(user_cart.id, user_only.id, 3)
            .await
            .unwrap();

        let outcome = store.merge_carts(&token, user_id).await.unwrap();
        assert_eq!(outcome, MergeOutcome::Merged { lines_moved: 1 });

        // Merged cart = {shared: 3, user_only: 3}; guest cart is gone
        let lines = store.cart_lines(user_cart.id).await.unwrap();
        let quantities: HashMap<VariantId, i32> =
            lines.iter().map(|l| (l.variant_id, l.quantity)).collect();
        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities.get(&shared.id), Some(&3));
        assert_eq!(quantities.get(&user_only.id), Some(&3));

        assert!(store.find_cart(&guest).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merge_without_guest_cart_is_a_noop() {
        let store = MemoryStore::new();
        let (token, guest) = guest_identity();
        let user_id = UserId::generate();

        let outcome = store.merge_carts(&token, user_id).await.unwrap();
        assert_eq!(outcome, MergeOutcome::NothingToMerge);

        // Neither a guest cart nor a user cart was created
        assert!(store.find_cart(&guest).await.unwrap().is_none());
        assert!(
            store
                .find_cart(&Identity::user(user_id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn merge_creates_user_cart_when_absent() {
        let store = MemoryStore::new();
        let (token, guest) = guest_identity();
        let user_id = UserId::generate();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let guest_cart = store.get_or_create_cart(&guest).await.unwrap();
        store.upsert_line(guest_cart.id, v.id, 4).await.unwrap();

        store.merge_carts(&token, user_id).await.unwrap();

        let user_cart = store
            .find_cart(&Identity::user(user_id))
            .await
            .unwrap()
            .unwrap();
        let lines = store.cart_lines(user_cart.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.first().unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn repeated_merge_does_not_double_quantities() {
        let store = MemoryStore::new();
        let (token, guest) = guest_identity();
        let user_id = UserId::generate();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let guest_cart = store.get_or_create_cart(&guest).await.unwrap();
        store.upsert_line(guest_cart.id, v.id, 2).await.unwrap();

        let first = store.merge_carts(&token, user_id).await.unwrap();
        assert!(matches!(first, MergeOutcome::Merged { .. }));

        // The guest cart is gone, so a retry has nothing left to migrate
        let second = store.merge_carts(&token, user_id).await.unwrap();
        assert_eq!(second, MergeOutcome::NothingToMerge);

        let user_cart = store
            .find_cart(&Identity::user(user_id))
            .await
            .unwrap()
            .unwrap();
        let lines = store.cart_lines(user_cart.id).await.unwrap();
        assert_eq!(lines.first().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn duplicate_external_session_is_a_conflict() {
        let store = MemoryStore::new();
        let v = variant(4999, None);
        store.insert_variant(v.clone()).await;

        let new_order = |owner: Identity| NewOrder {
            owner,
            external_session_id: "cs_test_123".to_owned(),
            status: OrderStatus::Paid,
            total_amount: Decimal::new(5399, 2),
            lines: vec![NewOrderLine {
                variant_id: v.id,
                quantity: 1,
                price_at_purchase: Decimal::new(4999, 2),
            }],
        };

        let (_, guest) = guest_identity();
        store.create_order(new_order(guest.clone())).await.unwrap();

        let result = store.create_order(new_order(guest)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let found = store
            .order_by_external_session("cs_test_123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.order.external_session_id, "cs_test_123");
        assert_eq!(found.lines.len(), 1);
    }

    #[tokio::test]
    async fn order_with_missing_variant_is_rejected() {
        let store = MemoryStore::new();
        let (_, guest) = guest_identity();

        let result = store
            .create_order(NewOrder {
                owner: guest,
                external_session_id: "cs_test_456".to_owned(),
                status: OrderStatus::Paid,
                total_amount: Decimal::new(4999, 2),
                lines: vec![NewOrderLine {
                    variant_id: VariantId::generate(),
                    quantity: 1,
                    price_at_purchase: Decimal::new(4999, 2),
                }],
            })
            .await;

        assert!(matches!(result, Err(StoreError::DataCorruption(_))));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        let email = Email::parse("runner@example.com").unwrap();

        store.create_user(&email, "hash-a").await.unwrap();
        let result = store.create_user(&email, "hash-b").await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let (user, hash) = store.user_password_hash(&email).await.unwrap().unwrap();
        assert_eq!(user.email, email);
        assert_eq!(hash, "hash-a");
    }
}
