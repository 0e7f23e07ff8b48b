use crate::{
    db::with_transaction,
    entities::{cart_item, category, guest_cart_item, order_item, product, product_image},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

const MAX_PAGE_SIZE: u64 = 100;

/// Products, categories and product images.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

/// Filters for product listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    /// Admin listings include deactivated products.
    #[serde(skip)]
    pub include_inactive: bool,
}

/// Product with its images, as shown on a product page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub images: Vec<product_image::Model>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "validate_slug")]
    pub slug: String,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    pub category_id: Uuid,
    #[validate(custom = "validate_positive_price")]
    pub base_price: Decimal,
    #[serde(default)]
    pub is_featured: bool,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
}

/// Partial product update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    pub category_id: Option<Uuid>,
    #[validate(custom = "validate_positive_price")]
    pub base_price: Option<Decimal>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "validate_slug")]
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

/// Partial category update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CategoryPatch {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom = "validate_slug")]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProductImage {
    #[validate(length(min = 1, max = 2048))]
    pub image_url: String,
    pub alt_text: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub is_primary: bool,
}

/// Partial image update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ProductImagePatch {
    #[validate(length(min = 1, max = 2048))]
    pub image_url: Option<String>,
    pub alt_text: Option<String>,
    pub display_order: Option<i32>,
    pub is_primary: Option<bool>,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = !slug.is_empty()
        && slug.len() <= 255
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("slug must be lowercase letters, digits and inner hyphens".into());
        Err(err)
    }
}

fn validate_positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price > Decimal::ZERO {
        Ok(())
    } else {
        let mut err = ValidationError::new("price");
        err.message = Some("price must be greater than zero".into());
        Err(err)
    }
}

/// Looks up a product that is currently for sale.
pub(crate) async fn find_active_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .filter(product::Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

fn not_updated(err: DbErr, what: &str, id: Uuid) -> ServiceError {
    match err {
        DbErr::RecordNotUpdated => ServiceError::NotFound(format!("{} {} not found", what, id)),
        other => ServiceError::from_write(other, what),
    }
}

fn page_bounds(page: u64, per_page: u64) -> (u64, u64) {
    (page.max(1), per_page.clamp(1, MAX_PAGE_SIZE))
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists products newest first, `page` is 1-based.
    ///
    /// Returns the page of products and the total number of matches.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let (page, per_page) = page_bounds(page, per_page);
        let mut query = product::Entity::find();

        if !filter.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(featured) = filter.featured {
            query = query.filter(product::Column::IsFeatured.eq(featured));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(product::Column::Name.contains(search));
        }

        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok((products, total))
    }

    pub async fn get_active_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        find_active_product(&*self.db, product_id).await
    }

    /// Active product with its images ordered for display.
    pub async fn get_product_detail(&self, product_id: Uuid) -> Result<ProductDetail, ServiceError> {
        let product = find_active_product(&*self.db, product_id).await?;
        let images = self.list_product_images(product_id).await?;
        Ok(ProductDetail { product, images })
    }

    pub async fn list_product_images(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_image::Model>, ServiceError> {
        let images = product_image::Entity::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .order_by_asc(product_image::Column::DisplayOrder)
            .order_by_asc(product_image::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(images)
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_product(&self, input: NewProduct) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            short_description: Set(input.short_description),
            category_id: Set(input.category_id),
            base_price: Set(input.base_price),
            is_active: Set(true),
            is_featured: Set(input.is_featured),
            weight: Set(input.weight),
            dimensions: Set(input.dimensions),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, "Product"))?;

        info!(product_id = %model.id, "product created");
        Ok(model)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> Result<product::Model, ServiceError> {
        patch.validate()?;

        let mut model = product::ActiveModel {
            id: Unchanged(product_id),
            ..Default::default()
        };
        if let Some(name) = patch.name {
            model.name = Set(name);
        }
        if let Some(slug) = patch.slug {
            model.slug = Set(slug);
        }
        if let Some(description) = patch.description {
            model.description = Set(Some(description));
        }
        if let Some(short_description) = patch.short_description {
            model.short_description = Set(Some(short_description));
        }
        if let Some(category_id) = patch.category_id {
            model.category_id = Set(category_id);
        }
        if let Some(base_price) = patch.base_price {
            model.base_price = Set(base_price);
        }
        if let Some(is_active) = patch.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(is_featured) = patch.is_featured {
            model.is_featured = Set(is_featured);
        }
        if let Some(weight) = patch.weight {
            model.weight = Set(Some(weight));
        }
        if let Some(dimensions) = patch.dimensions {
            model.dimensions = Set(Some(dimensions));
        }

        if !model.is_changed() {
            return Err(ServiceError::NoFieldsToUpdate);
        }
        model.updated_at = Set(Utc::now());

        model
            .update(&*self.db)
            .await
            .map_err(|e| not_updated(e, "Product", product_id))
    }

    /// Soft delete hides the product; hard delete removes it unless an order references it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid, hard: bool) -> Result<(), ServiceError> {
        if !hard {
            let result = product::Entity::update_many()
                .col_expr(product::Column::IsActive, false.into())
                .col_expr(product::Column::UpdatedAt, Utc::now().into())
                .filter(product::Column::Id.eq(product_id))
                .exec(&*self.db)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::NotFound(format!("Product {} not found", product_id)));
            }
            info!(%product_id, "product deactivated");
            return Ok(());
        }

        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                if product::Entity::find_by_id(product_id).one(txn).await?.is_none() {
                    return Err(ServiceError::NotFound(format!(
                        "Product {} not found",
                        product_id
                    )));
                }

                let ordered = order_item::Entity::find()
                    .filter(order_item::Column::ProductId.eq(product_id))
                    .count(txn)
                    .await?;
                if ordered > 0 {
                    return Err(ServiceError::DependencyViolation(
                        "product used in existing orders".to_string(),
                    ));
                }

                cart_item::Entity::delete_many()
                    .filter(cart_item::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await?;
                guest_cart_item::Entity::delete_many()
                    .filter(guest_cart_item::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await?;
                product_image::Entity::delete_many()
                    .filter(product_image::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await?;
                product::Entity::delete_by_id(product_id)
                    .exec(txn)
                    .await
                    .map_err(|e| ServiceError::from_delete(e, "Product"))?;
                Ok(())
            })
        })
        .await?;

        info!(%product_id, "product deleted");
        Ok(())
    }

    /// Categories ordered by `sort_order`, then name.
    pub async fn list_categories(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<category::Model>, ServiceError> {
        let mut query = category::Entity::find();
        if !include_inactive {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        let categories = query
            .order_by_asc(category::Column::SortOrder)
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(categories)
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_category(&self, input: NewCategory) -> Result<category::Model, ServiceError> {
        input.validate()?;
        let now = Utc::now();

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            parent_id: Set(input.parent_id),
            image_url: Set(input.image_url),
            sort_order: Set(input.sort_order),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| ServiceError::from_write(e, "Category"))?;

        info!(category_id = %model.id, "category created");
        Ok(model)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        patch: CategoryPatch,
    ) -> Result<category::Model, ServiceError> {
        patch.validate()?;
        if patch.parent_id == Some(category_id) {
            return Err(ServiceError::ValidationError(
                "a category cannot be its own parent".to_string(),
            ));
        }

        let mut model = category::ActiveModel {
            id: Unchanged(category_id),
            ..Default::default()
        };
        if let Some(name) = patch.name {
            model.name = Set(name);
        }
        if let Some(slug) = patch.slug {
            model.slug = Set(slug);
        }
        if let Some(description) = patch.description {
            model.description = Set(Some(description));
        }
        if let Some(parent_id) = patch.parent_id {
            model.parent_id = Set(Some(parent_id));
        }
        if let Some(image_url) = patch.image_url {
            model.image_url = Set(Some(image_url));
        }
        if let Some(sort_order) = patch.sort_order {
            model.sort_order = Set(sort_order);
        }
        if let Some(is_active) = patch.is_active {
            model.is_active = Set(is_active);
        }

        if !model.is_changed() {
            return Err(ServiceError::NoFieldsToUpdate);
        }
        model.updated_at = Set(Utc::now());

        model
            .update(&*self.db)
            .await
            .map_err(|e| not_updated(e, "Category", category_id))
    }

    /// Deletes a category that no product or subcategory points at.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                if category::Entity::find_by_id(category_id).one(txn).await?.is_none() {
                    return Err(ServiceError::NotFound(format!(
                        "Category {} not found",
                        category_id
                    )));
                }

                let products = product::Entity::find()
                    .filter(product::Column::CategoryId.eq(category_id))
                    .count(txn)
                    .await?;
                if products > 0 {
                    return Err(ServiceError::DependencyViolation(format!(
                        "category has {} product(s); move or delete them first",
                        products
                    )));
                }

                let children = category::Entity::find()
                    .filter(category::Column::ParentId.eq(category_id))
                    .count(txn)
                    .await?;
                if children > 0 {
                    return Err(ServiceError::DependencyViolation(format!(
                        "category has {} subcategory(ies); move or delete them first",
                        children
                    )));
                }

                category::Entity::delete_by_id(category_id)
                    .exec(txn)
                    .await
                    .map_err(|e| ServiceError::from_delete(e, "Category"))?;
                Ok(())
            })
        })
        .await?;

        info!(%category_id, "category deleted");
        Ok(())
    }

    pub async fn add_product_image(
        &self,
        product_id: Uuid,
        input: NewProductImage,
    ) -> Result<product_image::Model, ServiceError> {
        input.validate()?;

        product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            image_url: Set(input.image_url),
            alt_text: Set(input.alt_text),
            display_order: Set(input.display_order),
            is_primary: Set(input.is_primary),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(_)) => {
                ServiceError::NotFound(format!("Product {} not found", product_id))
            }
            _ => ServiceError::DatabaseError(e),
        })
    }

    pub async fn update_product_image(
        &self,
        image_id: Uuid,
        patch: ProductImagePatch,
    ) -> Result<product_image::Model, ServiceError> {
        patch.validate()?;

        let mut model = product_image::ActiveModel {
            id: Unchanged(image_id),
            ..Default::default()
        };
        if let Some(image_url) = patch.image_url {
            model.image_url = Set(image_url);
        }
        if let Some(alt_text) = patch.alt_text {
            model.alt_text = Set(Some(alt_text));
        }
        if let Some(display_order) = patch.display_order {
            model.display_order = Set(display_order);
        }
        if let Some(is_primary) = patch.is_primary {
            model.is_primary = Set(is_primary);
        }

        if !model.is_changed() {
            return Err(ServiceError::NoFieldsToUpdate);
        }

        model
            .update(&*self.db)
            .await
            .map_err(|e| not_updated(e, "Image", image_id))
    }

    pub async fn delete_product_image(&self, image_id: Uuid) -> Result<(), ServiceError> {
        let result = product_image::Entity::delete_by_id(image_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Image {} not found", image_id)));
        }
        Ok(())
    }
}
