use crate::{
    common::Owner,
    db::with_transaction,
    entities::{cart_item, guest_cart_item, product, product_image},
    errors::ServiceError,
    services::catalog::find_active_product,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Alias, Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-owner carts for signed-in users and guest sessions.
///
/// Rows only reference products; prices are read from the catalog every time
/// the cart is summarized.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

/// One visible cart line priced at the current catalog price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub subtotal: Decimal,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Stored cart row, independent of which table it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoredLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart row joined with its active product.
#[derive(Debug, Clone)]
pub(crate) struct PricedLine {
    pub product: product::Model,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        self.product.base_price * Decimal::from(self.quantity)
    }
}

/// Reads the owner's rows in insertion order. With `lock` the rows are
/// selected `FOR UPDATE` where the backend supports it.
pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    owner: &Owner,
    lock: bool,
) -> Result<Vec<StoredLine>, ServiceError> {
    let lines = match owner {
        Owner::User(user_id) => {
            let mut query = cart_item::Entity::find()
                .filter(cart_item::Column::UserId.eq(*user_id))
                .order_by_asc(cart_item::Column::CreatedAt);
            if lock {
                query = query.lock_exclusive();
            }
            query
                .all(conn)
                .await?
                .into_iter()
                .map(|row| StoredLine {
                    product_id: row.product_id,
                    quantity: row.quantity,
                })
                .collect()
        }
        Owner::Guest(session_id) => {
            let mut query = guest_cart_item::Entity::find()
                .filter(guest_cart_item::Column::SessionId.eq(session_id.as_str()))
                .order_by_asc(guest_cart_item::Column::CreatedAt);
            if lock {
                query = query.lock_exclusive();
            }
            query
                .all(conn)
                .await?
                .into_iter()
                .map(|row| StoredLine {
                    product_id: row.product_id,
                    quantity: row.quantity,
                })
                .collect()
        }
    };
    Ok(lines)
}

/// Joins the owner's rows against active products, dropping rows whose
/// product is deactivated. Rows themselves are left in place.
pub(crate) async fn priced_lines<C: ConnectionTrait>(
    conn: &C,
    owner: &Owner,
    lock: bool,
) -> Result<Vec<PricedLine>, ServiceError> {
    let stored = load_lines(conn, owner, lock).await?;
    if stored.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = stored.iter().map(|line| line.product_id).collect();
    let mut products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(ids))
        .filter(product::Column::IsActive.eq(true))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(stored
        .into_iter()
        .filter_map(|line| {
            products.remove(&line.product_id).map(|product| PricedLine {
                product,
                quantity: line.quantity,
            })
        })
        .collect())
}

/// Adds `quantity` to the owner's row for `product_id`, inserting it if absent.
///
/// The increment happens inside the database (`ON CONFLICT ... DO UPDATE SET
/// quantity = quantity + excluded.quantity`) so concurrent adds never lose updates.
pub(crate) async fn upsert_line<C: ConnectionTrait>(
    conn: &C,
    owner: &Owner,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    match owner {
        Owner::User(user_id) => {
            let row = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(*user_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            cart_item::Entity::insert(row)
                .on_conflict(
                    OnConflict::columns([cart_item::Column::UserId, cart_item::Column::ProductId])
                        .value(
                            cart_item::Column::Quantity,
                            Expr::col((cart_item::Entity, cart_item::Column::Quantity)).add(
                                Expr::col((Alias::new("excluded"), cart_item::Column::Quantity)),
                            ),
                        )
                        .update_column(cart_item::Column::UpdatedAt)
                        .to_owned(),
                )
                .exec_without_returning(conn)
                .await?;
        }
        Owner::Guest(session_id) => {
            let row = guest_cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                session_id: Set(session_id.clone()),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            guest_cart_item::Entity::insert(row)
                .on_conflict(
                    OnConflict::columns([
                        guest_cart_item::Column::SessionId,
                        guest_cart_item::Column::ProductId,
                    ])
                    .value(
                        guest_cart_item::Column::Quantity,
                        Expr::col((guest_cart_item::Entity, guest_cart_item::Column::Quantity))
                            .add(Expr::col((
                                Alias::new("excluded"),
                                guest_cart_item::Column::Quantity,
                            ))),
                    )
                    .update_column(guest_cart_item::Column::UpdatedAt)
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await?;
        }
    }
    Ok(())
}

/// Deletes the owner's row for one product, or every row when `product_id` is `None`.
pub(crate) async fn delete_lines<C: ConnectionTrait>(
    conn: &C,
    owner: &Owner,
    product_id: Option<Uuid>,
) -> Result<u64, ServiceError> {
    let result = match owner {
        Owner::User(user_id) => {
            let mut query =
                cart_item::Entity::delete_many().filter(cart_item::Column::UserId.eq(*user_id));
            if let Some(product_id) = product_id {
                query = query.filter(cart_item::Column::ProductId.eq(product_id));
            }
            query.exec(conn).await?
        }
        Owner::Guest(session_id) => {
            let mut query = guest_cart_item::Entity::delete_many()
                .filter(guest_cart_item::Column::SessionId.eq(session_id.as_str()));
            if let Some(product_id) = product_id {
                query = query.filter(guest_cart_item::Column::ProductId.eq(product_id));
            }
            query.exec(conn).await?
        }
    };
    Ok(result.rows_affected)
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds a product to the owner's cart, accumulating onto an existing row.
    ///
    /// A non-positive `quantity` counts as 1. Upper bounds are the caller's job.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &Owner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let quantity = if quantity <= 0 { 1 } else { quantity };
        find_active_product(&*self.db, product_id).await?;
        upsert_line(&*self.db, owner, product_id, quantity).await?;
        info!(%product_id, quantity, "item added to cart");
        Ok(())
    }

    /// Overwrites the row's quantity; zero or less removes the row.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn update_quantity(
        &self,
        owner: &Owner,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            delete_lines(&*self.db, owner, Some(product_id)).await?;
            return Ok(());
        }

        let now = Utc::now();
        match owner {
            Owner::User(user_id) => {
                cart_item::Entity::update_many()
                    .col_expr(cart_item::Column::Quantity, Expr::value(quantity))
                    .col_expr(cart_item::Column::UpdatedAt, Expr::value(now))
                    .filter(cart_item::Column::UserId.eq(*user_id))
                    .filter(cart_item::Column::ProductId.eq(product_id))
                    .exec(&*self.db)
                    .await?;
            }
            Owner::Guest(session_id) => {
                guest_cart_item::Entity::update_many()
                    .col_expr(guest_cart_item::Column::Quantity, Expr::value(quantity))
                    .col_expr(guest_cart_item::Column::UpdatedAt, Expr::value(now))
                    .filter(guest_cart_item::Column::SessionId.eq(session_id.as_str()))
                    .filter(guest_cart_item::Column::ProductId.eq(product_id))
                    .exec(&*self.db)
                    .await?;
            }
        }
        Ok(())
    }

    /// Removes a product from the cart. Removing an absent row is not an error.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_item(&self, owner: &Owner, product_id: Uuid) -> Result<(), ServiceError> {
        delete_lines(&*self.db, owner, Some(product_id)).await?;
        Ok(())
    }

    /// Prices the owner's cart against the live catalog.
    pub async fn summarize(&self, owner: &Owner) -> Result<CartSummary, ServiceError> {
        let lines = priced_lines(&*self.db, owner, false).await?;
        let images = self.primary_images(&lines).await?;
        Ok(build_summary(lines, &images))
    }

    /// Moves every guest row onto the user's cart, adding to quantities the
    /// user already has, then clears the guest cart. Returns the number of
    /// rows moved; a second call for the same session moves nothing.
    #[instrument(skip(self))]
    pub async fn migrate_guest_to_user(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<usize, ServiceError> {
        let guest = Owner::Guest(session_id.to_string());
        let user = Owner::User(user_id);

        let moved = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let lines = load_lines(txn, &guest, true).await?;
                for line in &lines {
                    upsert_line(txn, &user, line.product_id, line.quantity).await?;
                }
                delete_lines(txn, &guest, None).await?;
                Ok::<_, ServiceError>(lines.len())
            })
        })
        .await?;

        if moved > 0 {
            info!(%user_id, moved, "guest cart migrated");
        }
        Ok(moved)
    }

    async fn primary_images(
        &self,
        lines: &[PricedLine],
    ) -> Result<HashMap<Uuid, String>, ServiceError> {
        if lines.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = lines.iter().map(|l| l.product.id).collect();
        let rows = product_image::Entity::find()
            .filter(product_image::Column::ProductId.is_in(ids))
            .order_by_desc(product_image::Column::IsPrimary)
            .order_by_asc(product_image::Column::DisplayOrder)
            .all(&*self.db)
            .await?;

        let mut images = HashMap::new();
        for row in rows {
            images.entry(row.product_id).or_insert(row.image_url);
        }
        Ok(images)
    }
}

fn build_summary(lines: Vec<PricedLine>, images: &HashMap<Uuid, String>) -> CartSummary {
    let mut total_items = 0i64;
    let mut subtotal = Decimal::ZERO;
    let items = lines
        .into_iter()
        .map(|line| {
            let line_total = line.line_total();
            total_items += i64::from(line.quantity);
            subtotal += line_total;
            CartLine {
                image_url: images.get(&line.product.id).cloned(),
                product_id: line.product.id,
                name: line.product.name,
                slug: line.product.slug,
                unit_price: line.product.base_price,
                quantity: line.quantity,
                line_total,
            }
        })
        .collect();

    CartSummary {
        items,
        total_items,
        subtotal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(name: &str, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: name.to_lowercase(),
            description: None,
            short_description: None,
            category_id: Uuid::new_v4(),
            base_price: price,
            is_active: true,
            is_featured: false,
            weight: None,
            dimensions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_totals_use_current_prices() {
        let a = product("A", dec!(100));
        let b = product("B", dec!(50));
        let mut images = HashMap::new();
        images.insert(a.id, "https://cdn.example.com/a.png".to_string());

        let summary = build_summary(
            vec![
                PricedLine { product: a, quantity: 2 },
                PricedLine { product: b, quantity: 1 },
            ],
            &images,
        );

        assert_eq!(summary.total_items, 3);
        assert_eq!(summary.subtotal, dec!(250));
        assert_eq!(summary.items[0].line_total, dec!(200));
        assert!(summary.items[0].image_url.is_some());
        assert!(summary.items[1].image_url.is_none());
    }

    #[test]
    fn empty_summary() {
        let summary = build_summary(Vec::new(), &HashMap::new());
        assert!(summary.is_empty());
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.subtotal, Decimal::ZERO);
    }
}
