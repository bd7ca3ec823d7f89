//! Repository for the pipeline columns of the `orders` table.

use sqlx::PgPool;
use wavelength_core::types::DbId;

use crate::models::order::{CreateOrder, Order, QueueMetadata};
use crate::models::status::OrderStatus;

/// Column list for `orders` queries.
const COLUMNS: &str = "\
    id, project_id, status_id, pipeline_started_at, pipeline_completed_at, \
    pipeline_metadata, created_at, updated_at";

/// Provides the order status transitions driven by the job queue.
pub struct OrderRepo;

impl OrderRepo {
    pub async fn create(pool: &PgPool, input: &CreateOrder) -> Result<Order, sqlx::Error> {
        let query = format!(
            "INSERT INTO orders (project_id, status_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(input.project_id)
            .bind(OrderStatus::Queued.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Order>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Order picked up by a worker: running, with the start time stamped.
    pub async fn mark_running(
        pool: &PgPool,
        id: DbId,
        metadata: &QueueMetadata,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status_id = $2, pipeline_started_at = NOW(), pipeline_metadata = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(OrderStatus::Running.id())
        .bind(metadata.to_value())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hand the order to human review. `completed` stamps
    /// `pipeline_completed_at`; a failed run leaves it untouched.
    pub async fn mark_review(
        pool: &PgPool,
        id: DbId,
        metadata: &QueueMetadata,
        completed: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status_id = $2, pipeline_metadata = $3, \
                 pipeline_completed_at = CASE WHEN $4 THEN NOW() ELSE pipeline_completed_at END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(OrderStatus::Review.id())
        .bind(metadata.to_value())
        .bind(completed)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
