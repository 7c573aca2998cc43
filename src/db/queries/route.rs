//! Route database queries

use sqlx::PgPool;
use uuid::Uuid;

use crate::services::permissions::DataScope;
use crate::types::RouteRecord;

const ROUTE_COLUMNS: &str =
    "id, organization_id, user_id, route_name, addresses, created_at, updated_at";

/// List routes visible in a data scope, newest first
pub async fn list_routes(pool: &PgPool, scope: &DataScope) -> sqlx::Result<Vec<RouteRecord>> {
    let sql = format!(
        r#"
        SELECT {ROUTE_COLUMNS}
        FROM routes
        WHERE organization_id = $1
          AND ($2::text IS NULL OR user_id = $2)
        ORDER BY created_at DESC
        "#
    );

    sqlx::query_as::<_, RouteRecord>(&sql)
        .bind(scope.organization_id)
        .bind(scope.user_id.as_deref())
        .fetch_all(pool)
        .await
}

pub async fn get_route(pool: &PgPool, route_id: Uuid) -> sqlx::Result<Option<RouteRecord>> {
    let sql = format!("SELECT {ROUTE_COLUMNS} FROM routes WHERE id = $1");

    sqlx::query_as::<_, RouteRecord>(&sql)
        .bind(route_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_route(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: &str,
    route_name: &str,
    addresses: &[String],
) -> sqlx::Result<RouteRecord> {
    let sql = format!(
        r#"
        INSERT INTO routes (id, organization_id, user_id, route_name, addresses, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
        RETURNING {ROUTE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, RouteRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(user_id)
        .bind(route_name)
        .bind(addresses)
        .fetch_one(pool)
        .await
}

/// Replace name and addresses. Returns the stored row, or None if the
/// route no longer exists.
pub async fn update_route(
    pool: &PgPool,
    route_id: Uuid,
    route_name: &str,
    addresses: &[String],
) -> sqlx::Result<Option<RouteRecord>> {
    let sql = format!(
        r#"
        UPDATE routes
        SET route_name = $2, addresses = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {ROUTE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, RouteRecord>(&sql)
        .bind(route_id)
        .bind(route_name)
        .bind(addresses)
        .fetch_optional(pool)
        .await
}

pub async fn delete_route(pool: &PgPool, route_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM routes WHERE id = $1")
        .bind(route_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
