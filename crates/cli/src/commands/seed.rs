//! Catalog seed command.
//!
//! Inserts a small demo catalog so a fresh instance has something to put
//! in a cart. Idempotent: products and variants carry fixed ids and the
//! inserts are `ON CONFLICT DO NOTHING`.

use sqlx::PgPool;

use super::{CommandError, connect};

struct SeedProduct {
    id: &'static str,
    name: &'static str,
    image_url: &'static str,
    variants: &'static [SeedVariant],
}

struct SeedVariant {
    id: &'static str,
    sku: &'static str,
    color: &'static str,
    size: &'static str,
    price: &'static str,
    sale_price: Option<&'static str>,
    in_stock: i32,
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        id: "7e5f1a02-91c4-4f7a-8c1d-0b6a4d9e2f10",
        name: "Velocity Runner",
        image_url: "/images/velocity-runner.webp",
        variants: &[
            SeedVariant {
                id: "b3a8c6d1-2e4f-4a5b-9c7d-1f0e2a3b4c5d",
                sku: "VR-BLK-9",
                color: "Black",
                size: "9",
                price: "129.99",
                sale_price: None,
                in_stock: 24,
            },
            SeedVariant {
                id: "c4b9d7e2-3f50-4b6c-8d7e-2a1f3b4c5d6e",
                sku: "VR-BLK-10",
                color: "Black",
                size: "10",
                price: "129.99",
                sale_price: Some("99.99"),
                in_stock: 11,
            },
            SeedVariant {
                id: "d5cae8f3-4061-4c7d-9e8f-3b2a4c5d6e7f",
                sku: "VR-WHT-10",
                color: "White",
                size: "10",
                price: "129.99",
                sale_price: None,
                in_stock: 0,
            },
        ],
    },
    SeedProduct {
        id: "8f602b13-a2d5-408b-9d2e-1c7b5eaf3021",
        name: "Trail Glide",
        image_url: "/images/trail-glide.webp",
        variants: &[
            SeedVariant {
                id: "e6dbf904-5172-4d8e-af90-4c3b5d6e7f80",
                sku: "TG-OLV-9",
                color: "Olive",
                size: "9",
                price: "89.50",
                sale_price: None,
                in_stock: 40,
            },
            SeedVariant {
                id: "f7ec0a15-6283-4e9f-b0a1-5d4c6e7f8091",
                sku: "TG-OLV-11",
                color: "Olive",
                size: "11",
                price: "89.50",
                sale_price: Some("74.99"),
                in_stock: 7,
            },
        ],
    },
    SeedProduct {
        id: "9a713c24-b3e6-419c-ae3f-2d8c6fb04132",
        name: "Court Classic",
        image_url: "/images/court-classic.webp",
        variants: &[SeedVariant {
            id: "08fd1b26-7394-4fa0-c1b2-6e5d7f8091a2",
            sku: "CC-SAI-8",
            color: "Sail",
            size: "8",
            price: "64.99",
            sale_price: None,
            in_stock: 55,
        }],
    },
];

/// Seed the catalog with demo data.
///
/// # Errors
///
/// Returns an error when the database is unreachable or an insert fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    for product in CATALOG {
        insert_product(&pool, product).await?;
    }

    tracing::info!("Catalog seeded ({} products)", CATALOG.len());
    Ok(())
}

async fn insert_product(pool: &PgPool, product: &SeedProduct) -> Result<(), CommandError> {
    sqlx::query(
        r"
        INSERT INTO products (id, name, image_url)
        VALUES ($1::uuid, $2, $3)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(product.id)
    .bind(product.name)
    .bind(product.image_url)
    .execute(pool)
    .await?;

    for variant in product.variants {
        sqlx::query(
            r"
            INSERT INTO product_variants (id, product_id, sku, color, size, price, sale_price, in_stock)
            VALUES ($1::uuid, $2::uuid, $3, $4, $5, $6::numeric, $7::numeric, $8)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(variant.id)
        .bind(product.id)
        .bind(variant.sku)
        .bind(variant.color)
        .bind(variant.size)
        .bind(variant.price)
        .bind(variant.sale_price)
        .bind(variant.in_stock)
        .execute(pool)
        .await?;
    }

    Ok(())
}
