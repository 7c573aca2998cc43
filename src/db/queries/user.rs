//! User and organization database queries

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::store::NewMember;
use crate::types::{OrganizationRecord, UserRecord};

const USER_COLUMNS: &str = "id, auth0_id, organization_id, email, name, role, created_at";

/// Look up the organization member linked to an identity provider subject
pub async fn get_user_by_auth0_id(pool: &PgPool, auth0_id: &str) -> sqlx::Result<Option<UserRecord>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE auth0_id = $1");

    sqlx::query_as::<_, UserRecord>(&sql)
        .bind(auth0_id)
        .fetch_optional(pool)
        .await
}

/// Case-insensitive exact match on the organization name
pub async fn get_organization_by_name(pool: &PgPool, name: &str) -> sqlx::Result<Option<OrganizationRecord>> {
    sqlx::query_as::<_, OrganizationRecord>(
        r#"
        SELECT id, name, admin_user_id, created_at
        FROM organizations
        WHERE lower(name) = lower($1)
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
}

async fn insert_user(
    tx: &mut Transaction<'_, Postgres>,
    organization_id: Uuid,
    member: &NewMember,
) -> sqlx::Result<UserRecord> {
    let sql = format!(
        r#"
        INSERT INTO users (id, auth0_id, organization_id, email, name, role, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        RETURNING {USER_COLUMNS}
        "#
    );

    sqlx::query_as::<_, UserRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(&member.subject)
        .bind(organization_id)
        .bind(member.email.as_deref())
        .bind(member.name.as_deref())
        .bind(member.role)
        .fetch_one(&mut **tx)
        .await
}

/// Create an organization and its first member in one transaction
pub async fn insert_organization_with_admin(
    pool: &PgPool,
    organization_name: &str,
    admin: &NewMember,
) -> sqlx::Result<UserRecord> {
    let mut tx = pool.begin().await?;

    let organization_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO organizations (id, name, admin_user_id, created_at)
        VALUES ($1, $2, $3, NOW())
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization_name)
    .bind(&admin.subject)
    .fetch_one(&mut *tx)
    .await?;

    let user = insert_user(&mut tx, organization_id, admin).await?;

    tx.commit().await?;
    Ok(user)
}

/// Add a member to an existing organization
pub async fn insert_member(pool: &PgPool, organization_id: Uuid, member: &NewMember) -> sqlx::Result<UserRecord> {
    let mut tx = pool.begin().await?;
    let user = insert_user(&mut tx, organization_id, member).await?;
    tx.commit().await?;
    Ok(user)
}
