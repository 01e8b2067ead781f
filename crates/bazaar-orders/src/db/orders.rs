//! Order persistence.
//!
//! The full order, history included, is stored as a JSON document. The
//! `owner`, `status`, `total_amount` and timestamp columns duplicate
//! document fields for indexing. `version` is the compare-and-set guard.

use sqlx::PgPool;
use uuid::Uuid;

use bazaar_state::{Order, OrderError};

use super::{decode_error, encode_error};

fn version_column(version: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(version).map_err(encode_error)
}

fn document(order: &Order) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(order).map_err(|e| {
        tracing::error!(order_id = %order.id(), error = %e, "failed to serialize order");
        encode_error(e)
    })
}

/// Insert a newly created order.
pub async fn insert(pool: &PgPool, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, owner, status, total_amount, version, document, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(*order.id().as_uuid())
    .bind(order.owner().as_str())
    .bind(order.status().as_str())
    .bind(order.total_amount().minor_units())
    .bind(version_column(order.version())?)
    .bind(document(order)?)
    .bind(order.created_at())
    .bind(order.updated_at())
    .execute(pool)
    .await?;
    Ok(())
}

/// Write `order` iff the stored row is still at `expected_version`.
///
/// Returns `false` when no row matched: the order is missing or another
/// writer got there first.
pub async fn update(
    pool: &PgPool,
    order: &Order,
    expected_version: u64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders
         SET status = $1, total_amount = $2, version = $3, document = $4, updated_at = $5
         WHERE id = $6 AND version = $7",
    )
    .bind(order.status().as_str())
    .bind(order.total_amount().minor_units())
    .bind(version_column(order.version())?)
    .bind(document(order)?)
    .bind(order.updated_at())
    .bind(*order.id().as_uuid())
    .bind(version_column(expected_version)?)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Load every order, oldest first. Fails on the first record that does not
/// deserialize or does not pass its integrity check.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT id, version, document FROM orders ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(OrderRow::into_order).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    version: i64,
    document: serde_json::Value,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, sqlx::Error> {
        let order: Order = serde_json::from_value(self.document).map_err(|e| {
            tracing::error!(order_id = %self.id, error = %e, "stored order does not deserialize");
            decode_error(e)
        })?;

        let corrupt = |reason: String| {
            tracing::error!(order_id = %self.id, %reason, "stored order failed integrity check");
            decode_error(OrderError::Corrupt(reason))
        };
        if order.id().as_uuid() != &self.id {
            return Err(corrupt(format!("document id {} differs from row id", order.id())));
        }
        if i64::try_from(order.version()).ok() != Some(self.version) {
            return Err(corrupt(format!(
                "document version {} differs from row version {}",
                order.version(),
                self.version
            )));
        }
        order.verify_integrity().map_err(|e| corrupt(e.to_string()))?;
        Ok(order)
    }
}
