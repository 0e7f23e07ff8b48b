//! Seed data script - populates the database with a small demo catalog
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 3 categories (one nested)
//! - 8 products with a primary image each
//! - an admin account (`SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD`)

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use uuid::Uuid;

use storefront_api::{
    auth::hash_password,
    entities::{category, product, product_image, user, UserRole},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== Storefront Seed Data ===");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://storefront.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(StdDuration::from_secs(10))
        .acquire_timeout(StdDuration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;
    storefront_api::db::run_migrations(&db).await?;

    let categories = create_categories(&db).await?;
    info!("  Created {} categories", categories.len());

    let products = create_products(&db, &categories).await?;
    info!("  Created {} products", products.len());

    create_admin(&db).await?;

    info!("=== Seed Data Complete ===");
    info!("Try these API calls:");
    info!("  curl http://localhost:8080/api/v1/products");
    info!("  curl -H 'X-Session-ID: demo' http://localhost:8080/api/v1/cart");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

async fn create_categories(db: &DatabaseConnection) -> anyhow::Result<Vec<category::Model>> {
    let now = Utc::now();
    let mut created = Vec::new();

    for (sort_order, (name, slug, parent)) in [
        ("Apparel", "apparel", None),
        ("Accessories", "accessories", None),
        ("T-Shirts", "t-shirts", Some(0usize)),
    ]
    .into_iter()
    .enumerate()
    {
        let parent_id = parent.and_then(|i| created.get(i)).map(|c: &category::Model| c.id);
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            parent_id: Set(parent_id),
            image_url: Set(None),
            sort_order: Set(sort_order as i32),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        created.push(model);
    }

    Ok(created)
}

async fn create_products(
    db: &DatabaseConnection,
    categories: &[category::Model],
) -> anyhow::Result<Vec<product::Model>> {
    // (name, slug, price in cents, category index, featured)
    let products_data = [
        ("Classic Cotton T-Shirt", "classic-cotton-tee", 2499, 2, true),
        ("Striped Breton Shirt", "striped-breton-shirt", 3999, 2, false),
        ("Slim Fit Denim Jeans", "slim-fit-denim-jeans", 8999, 0, true),
        ("Merino Wool Sweater", "merino-wool-sweater", 11999, 0, false),
        ("Leather Bifold Wallet", "leather-bifold-wallet", 4999, 1, false),
        ("Canvas Backpack 25L", "canvas-backpack-25l", 7999, 1, true),
        ("Stainless Steel Water Bottle", "steel-water-bottle", 2999, 1, false),
        ("Wool Beanie", "wool-beanie", 1999, 1, false),
    ];

    let mut created = Vec::new();
    let now = Utc::now();

    for (name, slug, cents, category_index, featured) in products_data {
        let Some(category) = categories.get(category_index) else {
            continue;
        };
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(Some(format!("{} from the demo catalog.", name))),
            short_description: Set(None),
            category_id: Set(category.id),
            base_price: Set(Decimal::new(cents, 2)),
            is_active: Set(true),
            is_featured: Set(featured),
            weight: Set(None),
            dimensions: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            image_url: Set(format!("https://cdn.example.com/products/{}.jpg", slug)),
            alt_text: Set(Some(name.to_string())),
            display_order: Set(0),
            is_primary: Set(true),
            created_at: Set(now),
        }
        .insert(db)
        .await?;

        created.push(product);
    }

    Ok(created)
}

async fn create_admin(db: &DatabaseConnection) -> anyhow::Result<()> {
    let email = std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into());
    let password = match std::env::var("SEED_ADMIN_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            warn!("SEED_ADMIN_PASSWORD not set; using the demo password 'change-me-now'");
            "change-me-now".to_string()
        }
    };

    let now = Utc::now();
    let admin = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set("admin".to_string()),
        email: Set(email.clone()),
        password_hash: Set(hash_password(&password)?),
        first_name: Set(None),
        last_name: Set(None),
        phone: Set(None),
        role: Set(UserRole::Admin),
        is_active: Set(true),
        email_verified: Set(true),
        wallet_balance: Set(Decimal::ZERO),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!("  Created admin {} ({})", admin.username, email);
    Ok(())
}
