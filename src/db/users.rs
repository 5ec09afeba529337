use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{NewUser, Role, User};

/// A user row with its role names aggregated from `user_roles`.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    oauth_user: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let mut roles: Vec<Role> = row
            .roles
            .iter()
            .filter_map(|name| match name.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::warn!("Ignoring role on user {}: {e}", row.id);
                    None
                }
            })
            .collect();
        roles.sort();
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            oauth_user: row.oauth_user,
            roles,
            created_at: row.created_at,
        }
    }
}

macro_rules! select_user {
    ($filter:literal) => {
        concat!(
            "SELECT u.id, u.username, u.email, u.password_hash, u.oauth_user, u.created_at,
                COALESCE(array_agg(ur.role ORDER BY ur.role) FILTER (WHERE ur.role IS NOT NULL), '{}') AS roles
             FROM users u
             LEFT JOIN user_roles ur ON ur.user_id = u.id
             WHERE ",
            $filter,
            " GROUP BY u.id"
        )
    };
}

pub async fn seed_roles(pool: &PgPool) -> Result<(), sqlx::Error> {
    for role in Role::ALL {
        let inserted = sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(role.as_str())
            .execute(pool)
            .await?;
        if inserted.rows_affected() > 0 {
            tracing::info!("Seeded role {role}");
        }
    }
    Ok(())
}

pub async fn create(pool: &PgPool, user: &NewUser) -> Result<User, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, oauth_user)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.oauth_user)
    .fetch_one(&mut *tx)
    .await?;

    insert_roles(&mut tx, id, &user.roles).await?;
    let created = find_by_id(&mut *tx, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    tx.commit().await?;
    Ok(created)
}

async fn insert_roles(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    roles: &[Role],
) -> Result<(), sqlx::Error> {
    for role in roles {
        sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(select_user!("u.id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(User::from))
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(select_user!("lower(u.username) = lower($1)"))
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(User::from))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(select_user!("lower(u.email) = lower($1)"))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(User::from))
}

pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
}

/// Replaces the user's role set.
pub async fn set_roles(pool: &PgPool, id: i64, roles: &[Role]) -> Result<Option<User>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(None);
    }

    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_roles(&mut tx, id, roles).await?;

    let updated = find_by_id(&mut *tx, id).await?;
    tx.commit().await?;
    Ok(updated)
}
