use crate::{
    common::Owner,
    db::with_transaction,
    entities::{order, order_item, OrderStatus, PaymentStatus},
    errors::ServiceError,
    services::cart::{delete_lines, priced_lines},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const MAX_PAGE_SIZE: u64 = 100;

/// Checkout and order administration.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

/// Optional checkout details supplied with the order request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CheckoutDetails {
    #[validate(length(max = 1000))]
    pub shipping_address: Option<String>,
    #[validate(length(max = 1000))]
    pub billing_address: Option<String>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Admin update of an order's lifecycle fields.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct OrderStatusPatch {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[validate(length(max = 50))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// `ORD-<UTC yyyymmddHHMMSS>-<12 hex chars>`; uniqueness is backed by an index.
pub fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..12].to_ascii_uppercase();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Turns the owner's cart into an order.
    ///
    /// Runs in one transaction: the cart rows are locked, priced against the
    /// live catalog, copied into order lines and then cleared. Rows pointing at
    /// deactivated products are not ordered but are cleared with the rest.
    /// Fails with [`ServiceError::EmptyCart`] when nothing orderable remains,
    /// leaving the cart untouched.
    #[instrument(skip(self, details), fields(owner = %owner))]
    pub async fn create_order_from_cart(
        &self,
        owner: &Owner,
        details: CheckoutDetails,
    ) -> Result<OrderWithItems, ServiceError> {
        details.validate()?;
        let owner = owner.clone();

        let created = with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let lines = priced_lines(txn, &owner, true).await?;
                if lines.is_empty() {
                    return Err(ServiceError::EmptyCart);
                }

                let total: Decimal = lines.iter().map(|line| line.line_total()).sum();
                let now = Utc::now();

                let order = order::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_number: Set(generate_order_number()),
                    user_id: Set(owner.user_id()),
                    session_id: Set(owner.session_id().map(str::to_string)),
                    status: Set(OrderStatus::Pending),
                    total_amount: Set(total),
                    payment_status: Set(PaymentStatus::Pending),
                    payment_method: Set(details.payment_method),
                    shipping_address: Set(details.shipping_address),
                    billing_address: Set(details.billing_address),
                    notes: Set(details.notes),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await
                .map_err(|e| ServiceError::from_write(e, "Order"))?;

                let mut items = Vec::with_capacity(lines.len());
                for line in &lines {
                    let item = order_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(order.id),
                        product_id: Set(line.product.id),
                        product_name: Set(line.product.name.clone()),
                        product_sku: Set(line.product.sku()),
                        unit_price: Set(line.product.base_price),
                        quantity: Set(line.quantity),
                        total_price: Set(line.line_total()),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    items.push(item);
                }

                delete_lines(txn, &owner, None).await?;

                Ok(OrderWithItems { order, items })
            })
        })
        .await?;

        metrics::counter!("storefront_orders_created_total", 1);
        info!(
            order_id = %created.order.id,
            order_number = %created.order.order_number,
            total = %created.order.total_amount,
            "order created"
        );
        Ok(created)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// The owner's orders, newest first.
    pub async fn get_owner_orders(&self, owner: &Owner) -> Result<Vec<OrderWithItems>, ServiceError> {
        let query = match owner {
            Owner::User(user_id) => order::Entity::find().filter(order::Column::UserId.eq(*user_id)),
            Owner::Guest(session_id) => {
                order::Entity::find().filter(order::Column::SessionId.eq(session_id.as_str()))
            }
        };
        let orders = query
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        self.attach_items(orders).await
    }

    /// Admin listing, newest first, optionally narrowed to one status.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);

        let mut query = order::Entity::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok((orders, total))
    }

    /// Applies an admin status patch. Status changes must follow
    /// [`OrderStatus::can_transition_to`].
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        patch: OrderStatusPatch,
    ) -> Result<order::Model, ServiceError> {
        patch.validate()?;
        if patch.status.is_none() && patch.payment_status.is_none() && patch.payment_method.is_none()
        {
            return Err(ServiceError::NoFieldsToUpdate);
        }

        let current = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut model = order::ActiveModel {
            id: Unchanged(order_id),
            ..Default::default()
        };
        if let Some(status) = patch.status {
            if !current.status.can_transition_to(status) {
                return Err(ServiceError::InvalidStatusTransition(format!(
                    "cannot move order from {} to {}",
                    current.status, status
                )));
            }
            model.status = Set(status);
        }
        if let Some(payment_status) = patch.payment_status {
            model.payment_status = Set(payment_status);
        }
        if let Some(payment_method) = patch.payment_method {
            model.payment_method = Set(Some(payment_method));
        }
        model.updated_at = Set(Utc::now());

        let updated = model.update(&*self.db).await?;
        info!(
            %order_id,
            status = %updated.status,
            payment_status = %updated.payment_status,
            "order updated"
        );
        Ok(updated)
    }

    async fn attach_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut grouped: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(ids))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?
        {
            grouped.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: grouped.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 12);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn order_numbers_differ() {
        assert_ne!(generate_order_number(), generate_order_number());
    }
}
