//! Scoped transactions: commit when the closure returns `Ok`, roll back otherwise.

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionError, TransactionTrait};
use std::future::Future;
use std::pin::Pin;

/// Type alias for boxed future used in transactions
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Execute a function within a database transaction
///
/// The transaction is committed when `f` resolves to `Ok` and rolled back when
/// it resolves to `Err` or is dropped early. The caller's error value is
/// returned untouched; only connection/commit failures are converted from `DbErr`.
///
/// # Example
///
/// ```rust,ignore
/// use crate::db::transaction::with_transaction;
///
/// let order_id = with_transaction(&db, |txn| {
///     Box::pin(async move {
///         let order = order::Entity::insert(order_row).exec(txn).await?;
///         order_item::Entity::insert_many(lines).exec(txn).await?;
///         Ok(order.last_insert_id)
///     })
/// })
/// .await?;
/// ```
pub async fn with_transaction<F, T, E>(db: &DatabaseConnection, f: F) -> Result<T, E>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + From<DbErr> + Send,
{
    db.transaction(f).await.map_err(|e| match e {
        TransactionError::Connection(db_err) => E::from(db_err),
        TransactionError::Transaction(err) => err,
    })
}
