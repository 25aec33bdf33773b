//! `PostgreSQL` store backend.
//!
//! All queries use the runtime sqlx API with `FromRow` models. Cart line
//! writes are expressed as atomic upserts-by-delta so concurrent adds and
//! re-run merges converge; the merge and order creation each run in a
//! single transaction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use sqlx::{PgConnection, PgPool};

use stride_core::{
    CartId, CartLineId, Email, GuestToken, Identity, OrderId, OrderStatus, UserId, VariantId,
};

use super::{MergeOutcome, NewOrder, Store, StoreError};
use crate::models::{Cart, CartLine, CartLineDetail, Order, OrderLineDetail, OrderWithLines, User, VariantRecord};

/// Variant cache time-to-live. Reference data only; carts and orders are
/// never cached.
const VARIANT_CACHE_TTL: Duration = Duration::from_secs(60);
const VARIANT_CACHE_CAPACITY: u64 = 10_000;

/// `PostgreSQL`-backed [`Store`].
pub struct PgStore {
    pool: PgPool,
    variant_cache: Cache<VariantId, VariantRecord>,
}

impl PgStore {
    /// Create a new store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let variant_cache = Cache::builder()
            .max_capacity(VARIANT_CACHE_CAPACITY)
            .time_to_live(VARIANT_CACHE_TTL)
            .build();

        Self {
            pool,
            variant_cache,
        }
    }

    async fn order_lines(&self, order: OrderId) -> Result<Vec<OrderLineDetail>, StoreError> {
        let lines = sqlx::query_as::<_, OrderLineDetail>(
            r"
            SELECT ol.id, ol.variant_id, ol.quantity, ol.price_at_purchase,
                   p.name AS product_name, p.image_url, v.color, v.size
            FROM order_lines ol
            JOIN product_variants v ON v.id = ol.variant_id
            JOIN products p ON p.id = v.product_id
            WHERE ol.order_id = $1
            ORDER BY ol.id
            ",
        )
        .bind(order)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: Option<UserId>,
    guest_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> Result<Cart, StoreError> {
        let owner = owner_from_columns(self.user_id, self.guest_id.as_deref())?;

        Ok(Cart {
            id: self.id,
            owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    cart_id: CartId,
    variant_id: VariantId,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    guest_id: Option<String>,
    external_session_id: String,
    status: OrderStatus,
    total_amount: rust_decimal::Decimal,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let owner = owner_from_columns(self.user_id, self.guest_id.as_deref())?;

        Ok(Order {
            id: self.id,
            owner,
            external_session_id: self.external_session_id,
            status: self.status,
            total_amount: self.total_amount,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User, StoreError> {
        let email = Email::parse(&self.email)
            .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(User {
            id: self.id,
            email,
            created_at: self.created_at,
        })
    }
}

/// Rebuild the owner sum type from the two nullable storage columns.
///
/// Exactly one must be set; anything else is corrupt data, not a valid
/// state (the schema CHECK enforces this, so a violation means the schema
/// and the code disagree).
fn owner_from_columns(
    user_id: Option<UserId>,
    guest_id: Option<&str>,
) -> Result<Identity, StoreError> {
    match (user_id, guest_id) {
        (Some(id), None) => Ok(Identity::user(id)),
        (None, Some(token)) => {
            let token = GuestToken::parse(token).map_err(|e| {
                StoreError::DataCorruption(format!("invalid guest token in database: {e}"))
            })?;
            Ok(Identity::guest(token))
        }
        _ => Err(StoreError::DataCorruption(
            "row must have exactly one owner".to_owned(),
        )),
    }
}

async fn touch_cart(conn: &mut PgConnection, cart: CartId) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart)
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Carts
    // =========================================================================

    async fn find_cart(&self, owner: &Identity) -> Result<Option<Cart>, StoreError> {
        let row = match owner {
            Identity::User { id } => {
                sqlx::query_as::<_, CartRow>(
                    "SELECT id, user_id, guest_id, created_at, updated_at FROM carts WHERE user_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            Identity::Guest { token } => {
                sqlx::query_as::<_, CartRow>(
                    "SELECT id, user_id, guest_id, created_at, updated_at FROM carts WHERE guest_id = $1",
                )
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(CartRow::into_cart).transpose()
    }

    async fn get_or_create_cart(&self, owner: &Identity) -> Result<Cart, StoreError> {
        if let Some(cart) = self.find_cart(owner).await? {
            return Ok(cart);
        }

        // ON CONFLICT DO NOTHING against the per-owner partial unique index
        // makes concurrent first-adds race safely: the loser inserts
        // nothing and reads the winner's cart below.
        let inserted = match owner {
            Identity::User { id } => {
                sqlx::query_as::<_, CartRow>(
                    r"
                    INSERT INTO carts (user_id)
                    VALUES ($1)
                    ON CONFLICT (user_id) WHERE user_id IS NOT NULL DO NOTHING
                    RETURNING id, user_id, guest_id, created_at, updated_at
                    ",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            Identity::Guest { token } => {
                sqlx::query_as::<_, CartRow>(
                    r"
                    INSERT INTO carts (guest_id)
                    VALUES ($1)
                    ON CONFLICT (guest_id) WHERE guest_id IS NOT NULL DO NOTHING
                    RETURNING id, user_id, guest_id, created_at, updated_at
                    ",
                )
                .bind(token.as_str())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        if let Some(row) = inserted {
            return row.into_cart();
        }

        self.find_cart(owner).await?.ok_or_else(|| {
            StoreError::DataCorruption("cart insert raced but no cart is visible".to_owned())
        })
    }

    async fn cart_lines(&self, cart: CartId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT id, cart_id, variant_id, quantity
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(cart)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                id: r.id,
                cart_id: r.cart_id,
                variant_id: r.variant_id,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn cart_lines_detailed(&self, cart: CartId) -> Result<Vec<CartLineDetail>, StoreError> {
        let lines = sqlx::query_as::<_, CartLineDetail>(
            r"
            SELECT cl.id, cl.variant_id, v.product_id, p.name AS product_name,
                   p.image_url, v.color, v.size, v.price, v.sale_price,
                   cl.quantity, v.in_stock
            FROM cart_lines cl
            JOIN product_variants v ON v.id = cl.variant_id
            JOIN products p ON p.id = v.product_id
            WHERE cl.cart_id = $1
            ORDER BY cl.created_at DESC
            ",
        )
        .bind(cart)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    async fn upsert_line(
        &self,
        cart: CartId,
        variant: VariantId,
        delta: i32,
    ) -> Result<CartLineId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let line_id = sqlx::query_scalar::<_, CartLineId>(
            r"
            INSERT INTO cart_lines (cart_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, variant_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            RETURNING id
            ",
        )
        .bind(cart)
        .bind(variant)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;

        touch_cart(&mut *tx, cart).await?;
        tx.commit().await?;

        Ok(line_id)
    }

    async fn set_line_quantity(
        &self,
        cart: CartId,
        line: CartLineId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE cart_lines SET quantity = $3 WHERE id = $2 AND cart_id = $1",
        )
        .bind(cart)
        .bind(line)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        touch_cart(&mut *tx, cart).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn remove_line(&self, cart: CartId, line: CartLineId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Deleting an absent line is a silent no-op
        sqlx::query("DELETE FROM cart_lines WHERE id = $2 AND cart_id = $1")
            .bind(cart)
            .bind(line)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut *tx, cart).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn clear_cart(&self, cart: CartId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(cart)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut *tx, cart).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn merge_carts(
        &self,
        guest: &GuestToken,
        user: UserId,
    ) -> Result<MergeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock the guest cart row so concurrent merges of the same guest
        // serialize; the second one sees no cart and does nothing.
        let guest_cart = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, guest_id, created_at, updated_at
            FROM carts WHERE guest_id = $1
            FOR UPDATE
            ",
        )
        .bind(guest.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(guest_cart) = guest_cart else {
            return Ok(MergeOutcome::NothingToMerge);
        };

        let user_cart_id = sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;

        let user_cart_id = match user_cart_id {
            Some(id) => id,
            None => {
                sqlx::query_scalar::<_, CartId>(
                    "INSERT INTO carts (user_id) VALUES ($1) RETURNING id",
                )
                .bind(user)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        // Set-based migration: sum quantities where the user already has
        // the variant, move the line otherwise. The upsert-by-delta form
        // keeps a retried partial merge convergent.
        let moved = sqlx::query(
            r"
            INSERT INTO cart_lines (cart_id, variant_id, quantity)
            SELECT $2::uuid, variant_id, quantity
            FROM cart_lines
            WHERE cart_id = $1
            ON CONFLICT (cart_id, variant_id)
            DO UPDATE SET quantity = cart_lines.quantity + EXCLUDED.quantity
            ",
        )
        .bind(guest_cart.id)
        .bind(user_cart_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
            .bind(guest_cart.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(guest_cart.id)
            .execute(&mut *tx)
            .await?;

        touch_cart(&mut *tx, user_cart_id).await?;
        tx.commit().await?;

        Ok(MergeOutcome::Merged {
            lines_moved: moved.rows_affected(),
        })
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    async fn variant(&self, id: VariantId) -> Result<Option<VariantRecord>, StoreError> {
        if let Some(variant) = self.variant_cache.get(&id).await {
            return Ok(Some(variant));
        }

        let variant = sqlx::query_as::<_, VariantRecord>(
            r"
            SELECT v.id, v.product_id, p.name AS product_name, p.image_url,
                   v.color, v.size, v.price, v.sale_price, v.in_stock
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(ref v) = variant {
            self.variant_cache.insert(id, v.clone()).await;
        }

        Ok(variant)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn create_order(&self, order: NewOrder) -> Result<OrderId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (user_id, guest_id, external_session_id, status, total_amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(order.owner.user_id())
        .bind(order.owner.guest_token().map(GuestToken::as_str))
        .bind(&order.external_session_id)
        .bind(order.status)
        .bind(order.total_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict(format!(
                    "order already exists for session {}",
                    order.external_session_id
                ));
            }
            StoreError::Database(e)
        })?;

        for line in &order.lines {
            sqlx::query(
                r"
                INSERT INTO order_lines (order_id, variant_id, quantity, price_at_purchase)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(order_id)
            .bind(line.variant_id)
            .bind(line.quantity)
            .bind(line.price_at_purchase)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(order_id)
    }

    async fn order(&self, id: OrderId) -> Result<Option<OrderWithLines>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_id, external_session_id, status, total_amount, created_at
            FROM orders WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = row.into_order()?;
        let lines = self.order_lines(order.id).await?;

        Ok(Some(OrderWithLines { order, lines }))
    }

    async fn order_by_external_session(
        &self,
        session_id: &str,
    ) -> Result<Option<OrderWithLines>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, user_id, guest_id, external_session_id, status, total_amount, created_at
            FROM orders WHERE external_session_id = $1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order = row.into_order()?;
        let lines = self.order_lines(order.id).await?;

        Ok(Some(OrderWithLines { order, lines }))
    }

    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, email: &Email, password_hash: &str) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (email)
            VALUES ($1)
            RETURNING id, email, created_at
            ",
        )
        .bind(email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("email already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        let user = row.into_user()?;

        sqlx::query(
            r"
            INSERT INTO user_password (user_id, password_hash)
            VALUES ($1, $2)
            ",
        )
        .bind(user.id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user)
    }

    async fn user_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: UserId,
            email: String,
            created_at: DateTime<Utc>,
            password_hash: Option<String>,
        }

        let row = sqlx::query_as::<_, Row>(
            r"
            SELECT u.id, u.email, u.created_at, p.password_hash
            FROM users u
            LEFT JOIN user_password p ON u.id = p.user_id
            WHERE u.email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Some(password_hash) = row.password_hash else {
            return Ok(None);
        };

        let user = UserRow {
            id: row.id,
            email: row.email,
            created_at: row.created_at,
        }
        .into_user()?;

        Ok(Some((user, password_hash)))
    }

    // =========================================================================
    // Health
    // =========================================================================

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
