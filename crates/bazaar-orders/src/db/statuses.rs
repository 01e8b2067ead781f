//! Status registry persistence. Only edited descriptors are stored; statuses
//! without a row keep their configured metadata.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_state::{OrderStatus, StatusDescriptor};

use super::{decode_error, encode_error};

/// Insert or replace the stored descriptor for one status.
pub async fn upsert(
    pool: &PgPool,
    descriptor: &StatusDescriptor,
    updated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let sort_order = i32::try_from(descriptor.sort_order).map_err(encode_error)?;
    sqlx::query(
        "INSERT INTO order_statuses (status, description, color, sort_order, active, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (status) DO UPDATE
         SET description = EXCLUDED.description,
             color = EXCLUDED.color,
             sort_order = EXCLUDED.sort_order,
             active = EXCLUDED.active,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(descriptor.status.as_str())
    .bind(&descriptor.description)
    .bind(&descriptor.color)
    .bind(sort_order)
    .bind(descriptor.active)
    .bind(updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load every stored descriptor.
pub async fn load_all(pool: &PgPool) -> Result<Vec<StatusDescriptor>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StatusRow>(
        "SELECT status, description, color, sort_order, active FROM order_statuses",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(StatusRow::into_descriptor).collect()
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    status: String,
    description: String,
    color: String,
    sort_order: i32,
    active: bool,
}

impl StatusRow {
    fn into_descriptor(self) -> Result<StatusDescriptor, sqlx::Error> {
        let status: OrderStatus = self.status.parse().map_err(|e| {
            tracing::error!(status = %self.status, "unknown status in order_statuses table");
            decode_error(e)
        })?;
        let sort_order = u32::try_from(self.sort_order).map_err(decode_error)?;
        Ok(StatusDescriptor {
            status,
            description: self.description,
            color: self.color,
            sort_order,
            active: self.active,
        })
    }
}
