//! Client database queries

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::services::permissions::DataScope;
use crate::types::{ClientInput, ClientRecord, NotificationPreferences};

const CLIENT_COLUMNS: &str = "id, organization_id, created_by_user_id, name, email, phone, address, \
     notification_preferences, created_at, updated_at";

/// List clients visible in a data scope, newest first
pub async fn list_clients(pool: &PgPool, scope: &DataScope) -> sqlx::Result<Vec<ClientRecord>> {
    let sql = format!(
        r#"
        SELECT {CLIENT_COLUMNS}
        FROM clients
        WHERE organization_id = $1
          AND ($2::text IS NULL OR created_by_user_id = $2)
        ORDER BY created_at DESC
        "#
    );

    sqlx::query_as::<_, ClientRecord>(&sql)
        .bind(scope.organization_id)
        .bind(scope.user_id.as_deref())
        .fetch_all(pool)
        .await
}

pub async fn get_client(pool: &PgPool, client_id: Uuid) -> sqlx::Result<Option<ClientRecord>> {
    let sql = format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1");

    sqlx::query_as::<_, ClientRecord>(&sql)
        .bind(client_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_client(
    pool: &PgPool,
    organization_id: Uuid,
    created_by_user_id: &str,
    client: &ClientInput,
    preferences: NotificationPreferences,
) -> sqlx::Result<ClientRecord> {
    let sql = format!(
        r#"
        INSERT INTO clients (id, organization_id, created_by_user_id, name, email, phone, address,
                             notification_preferences, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
        RETURNING {CLIENT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, ClientRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(organization_id)
        .bind(created_by_user_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(Json(preferences))
        .fetch_one(pool)
        .await
}

/// Replace the editable fields. Returns the stored row, or None if the
/// client no longer exists.
pub async fn update_client(
    pool: &PgPool,
    client_id: Uuid,
    client: &ClientInput,
) -> sqlx::Result<Option<ClientRecord>> {
    let sql = format!(
        r#"
        UPDATE clients
        SET name = $2, email = $3, phone = $4, address = $5, updated_at = NOW()
        WHERE id = $1
        RETURNING {CLIENT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, ClientRecord>(&sql)
        .bind(client_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.address)
        .fetch_optional(pool)
        .await
}

pub async fn delete_client(pool: &PgPool, client_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(client_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
