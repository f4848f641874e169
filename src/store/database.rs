use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "sqlite")]
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[cfg(feature = "postgres")]
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::{get_config, DatabaseConfig};
use crate::errors::{KeeperError, KeeperResult};
use crate::models::{BillingCycle, Role, Subscription, User};

use super::{SubscriptionFilter, SubscriptionStore, SubscriptionUpdate, UserStore};

/// Row shape of the `subscriptions` table.
#[derive(Debug, Clone, FromRow)]
struct SubscriptionRow {
    id: String,
    user_id: Option<String>,
    plan: Option<String>,
    status: String,
    expiry_date: NaiveDateTime,
    auto_renew: bool,
    billing_cycle: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = KeeperError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| {
            KeeperError::InvalidRecord(format!(
                "subscription {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Subscription {
            billing_cycle: BillingCycle::from_stored(&row.billing_cycle),
            id: row.id,
            user_id: row.user_id,
            plan: row.plan,
            status,
            expiry_date: row.expiry_date,
            auto_renew: row.auto_renew,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row shape of the `users` table.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = KeeperError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|_| {
            KeeperError::InvalidRecord(format!("user {} has unknown role '{}'", row.id, row.role))
        })?;

        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all(rows: Vec<SubscriptionRow>) -> KeeperResult<Vec<Subscription>> {
    rows.into_iter().map(Subscription::try_from).collect()
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> KeeperError {
    move |e| {
        error!("{context} failed: {e}");
        KeeperError::from(e)
    }
}

// Optional filter predicates are NULL-tolerant so one statement serves every filter shape.

#[cfg(feature = "sqlite")]
mod sqlite_sql {
    pub const UPDATE_MANY: &str = r#"
        UPDATE subscriptions SET
            status      = COALESCE(?1, status),
            expiry_date = COALESCE(?2, expiry_date),
            updated_at  = COALESCE(?3, updated_at)
        WHERE (?4 IS NULL OR status = ?4)
          AND (?5 IS NULL OR julianday(expiry_date) <= julianday(?5))
          AND (?6 IS NULL OR auto_renew = ?6)
    "#;

    pub const FIND: &str = r#"
        SELECT * FROM subscriptions
        WHERE (?1 IS NULL OR status = ?1)
          AND (?2 IS NULL OR julianday(expiry_date) <= julianday(?2))
          AND (?3 IS NULL OR auto_renew = ?3)
    "#;

    pub const UPDATE_BY_ID: &str = r#"
        UPDATE subscriptions SET
            status      = COALESCE(?1, status),
            expiry_date = COALESCE(?2, expiry_date),
            updated_at  = COALESCE(?3, updated_at)
        WHERE id = ?4
        RETURNING *
    "#;

    pub const INSERT: &str = r#"
        INSERT INTO subscriptions (
            id, user_id, plan, status, expiry_date, auto_renew, billing_cycle,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    "#;

    pub const GET: &str = "SELECT * FROM subscriptions WHERE id = ?";

    pub const INSERT_USER: &str = r#"
        INSERT INTO users (id, email, name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
    "#;

    pub const FIND_USER_BY_EMAIL: &str = "SELECT * FROM users WHERE email = ?";

    pub const SET_USER_ROLE: &str =
        "UPDATE users SET role = ?, updated_at = ? WHERE id = ? RETURNING *";

    pub const SCHEMA: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id            TEXT PRIMARY KEY,
            user_id       TEXT,
            plan          TEXT,
            status        TEXT NOT NULL DEFAULT 'active',
            expiry_date   TEXT NOT NULL,
            auto_renew    INTEGER NOT NULL DEFAULT 0,
            billing_cycle TEXT NOT NULL DEFAULT 'monthly',
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_status_expiry \
         ON subscriptions (status, expiry_date)",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            email      TEXT NOT NULL UNIQUE,
            name       TEXT NOT NULL,
            role       TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    ];
}

#[cfg(feature = "postgres")]
mod postgres_sql {
    pub const UPDATE_MANY: &str = r#"
        UPDATE subscriptions SET
            status      = COALESCE($1, status),
            expiry_date = COALESCE($2, expiry_date),
            updated_at  = COALESCE($3, updated_at)
        WHERE ($4::TEXT IS NULL OR status = $4)
          AND ($5::TIMESTAMP IS NULL OR expiry_date <= $5)
          AND ($6::BOOLEAN IS NULL OR auto_renew = $6)
    "#;

    pub const FIND: &str = r#"
        SELECT * FROM subscriptions
        WHERE ($1::TEXT IS NULL OR status = $1)
          AND ($2::TIMESTAMP IS NULL OR expiry_date <= $2)
          AND ($3::BOOLEAN IS NULL OR auto_renew = $3)
    "#;

    pub const UPDATE_BY_ID: &str = r#"
        UPDATE subscriptions SET
            status      = COALESCE($1, status),
            expiry_date = COALESCE($2, expiry_date),
            updated_at  = COALESCE($3, updated_at)
        WHERE id = $4
        RETURNING *
    "#;

    pub const INSERT: &str = r#"
        INSERT INTO subscriptions (
            id, user_id, plan, status, expiry_date, auto_renew, billing_cycle,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    "#;

    pub const GET: &str = "SELECT * FROM subscriptions WHERE id = $1";

    pub const INSERT_USER: &str = r#"
        INSERT INTO users (id, email, name, role, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
    "#;

    pub const FIND_USER_BY_EMAIL: &str = "SELECT * FROM users WHERE email = $1";

    pub const SET_USER_ROLE: &str =
        "UPDATE users SET role = $1, updated_at = $2 WHERE id = $3 RETURNING *";

    pub const SCHEMA: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            id            TEXT PRIMARY KEY,
            user_id       TEXT,
            plan          TEXT,
            status        TEXT NOT NULL DEFAULT 'active',
            expiry_date   TIMESTAMP NOT NULL,
            auto_renew    BOOLEAN NOT NULL DEFAULT FALSE,
            billing_cycle TEXT NOT NULL DEFAULT 'monthly',
            created_at    TIMESTAMP NOT NULL,
            updated_at    TIMESTAMP NOT NULL
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_status_expiry \
         ON subscriptions (status, expiry_date)",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            email      TEXT NOT NULL UNIQUE,
            name       TEXT NOT NULL,
            role       TEXT NOT NULL DEFAULT 'user',
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    ];
}

/// Unified database abstraction over SQLite and Postgres.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
}

impl Database {
    /// Connect using the global configuration.
    pub async fn from_config() -> KeeperResult<Arc<Self>> {
        let config = get_config()?;
        Self::connect(&config.database).await
    }

    /// Connect to the database described by `db_config`.
    pub async fn connect(db_config: &DatabaseConfig) -> KeeperResult<Arc<Self>> {
        let url = db_config.url();

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                // Each connection to an in-memory database sees its own empty database.
                let max_connections = if url.contains(":memory:") {
                    1
                } else {
                    db_config.max_connections
                };

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        KeeperError::ConnectionError(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Arc::new(Database::SQLite(pool)))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(KeeperError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(db_config.max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        KeeperError::ConnectionError(format!(
                            "failed to connect to PostgreSQL: {e}"
                        ))
                    })?;

                Ok(Arc::new(Database::Postgres(pool)))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(KeeperError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            other => Err(KeeperError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Create the `subscriptions` and `users` tables if they do not exist.
    pub async fn migrate(&self) -> KeeperResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                for stmt in sqlite_sql::SCHEMA {
                    query(stmt)
                        .execute(pool)
                        .await
                        .map_err(db_err("SQLite migrate"))?;
                }
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                for stmt in postgres_sql::SCHEMA {
                    query(stmt)
                        .execute(pool)
                        .await
                        .map_err(db_err("Postgres migrate"))?;
                }
            }
        }

        info!("Database schema is up to date");
        Ok(())
    }

    /// Backend name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
        }
    }
}

#[async_trait]
impl SubscriptionStore for Database {
    async fn update_many(
        &self,
        filter: &SubscriptionFilter,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<u64> {
        let set_status = update.status.map(|s| s.as_str());
        let where_status = filter.status.map(|s| s.as_str());

        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query(sqlite_sql::UPDATE_MANY)
                .bind(set_status)
                .bind(update.expiry_date)
                .bind(update.updated_at)
                .bind(where_status)
                .bind(filter.expires_at_or_before)
                .bind(filter.auto_renew)
                .execute(pool)
                .await
                .map_err(db_err("SQLite update_many"))?
                .rows_affected(),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query(postgres_sql::UPDATE_MANY)
                .bind(set_status)
                .bind(update.expiry_date)
                .bind(update.updated_at)
                .bind(where_status)
                .bind(filter.expires_at_or_before)
                .bind(filter.auto_renew)
                .execute(pool)
                .await
                .map_err(db_err("Postgres update_many"))?
                .rows_affected(),
        };

        Ok(rows_affected)
    }

    async fn find(&self, filter: &SubscriptionFilter) -> KeeperResult<Vec<Subscription>> {
        let where_status = filter.status.map(|s| s.as_str());

        let rows = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, SubscriptionRow>(sqlite_sql::FIND)
                .bind(where_status)
                .bind(filter.expires_at_or_before)
                .bind(filter.auto_renew)
                .fetch_all(pool)
                .await
                .map_err(db_err("SQLite find"))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, SubscriptionRow>(postgres_sql::FIND)
                .bind(where_status)
                .bind(filter.expires_at_or_before)
                .bind(filter.auto_renew)
                .fetch_all(pool)
                .await
                .map_err(db_err("Postgres find"))?,
        };

        decode_all(rows)
    }

    async fn find_by_id_and_update(
        &self,
        id: &str,
        update: &SubscriptionUpdate,
    ) -> KeeperResult<Option<Subscription>> {
        let set_status = update.status.map(|s| s.as_str());

        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, SubscriptionRow>(sqlite_sql::UPDATE_BY_ID)
                .bind(set_status)
                .bind(update.expiry_date)
                .bind(update.updated_at)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(db_err("SQLite find_by_id_and_update"))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query_as::<_, SubscriptionRow>(postgres_sql::UPDATE_BY_ID)
                    .bind(set_status)
                    .bind(update.expiry_date)
                    .bind(update.updated_at)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(db_err("Postgres find_by_id_and_update"))?
            }
        };

        row.map(Subscription::try_from).transpose()
    }

    async fn insert(&self, sub: &Subscription) -> KeeperResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(sqlite_sql::INSERT)
                    .bind(&sub.id)
                    .bind(&sub.user_id)
                    .bind(&sub.plan)
                    .bind(sub.status.as_str())
                    .bind(sub.expiry_date)
                    .bind(sub.auto_renew)
                    .bind(sub.billing_cycle.as_str())
                    .bind(sub.created_at)
                    .bind(sub.updated_at)
                    .execute(pool)
                    .await
                    .map_err(db_err("SQLite insert subscription"))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(postgres_sql::INSERT)
                    .bind(&sub.id)
                    .bind(&sub.user_id)
                    .bind(&sub.plan)
                    .bind(sub.status.as_str())
                    .bind(sub.expiry_date)
                    .bind(sub.auto_renew)
                    .bind(sub.billing_cycle.as_str())
                    .bind(sub.created_at)
                    .bind(sub.updated_at)
                    .execute(pool)
                    .await
                    .map_err(db_err("Postgres insert subscription"))?;
            }
        }

        Ok(())
    }

    async fn get(&self, id: &str) -> KeeperResult<Option<Subscription>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, SubscriptionRow>(sqlite_sql::GET)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(db_err("SQLite get subscription"))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, SubscriptionRow>(postgres_sql::GET)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(db_err("Postgres get subscription"))?,
        };

        row.map(Subscription::try_from).transpose()
    }
}

#[async_trait]
impl UserStore for Database {
    async fn insert_user(&self, user: &User) -> KeeperResult<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => {
                query(sqlite_sql::INSERT_USER)
                    .bind(&user.id)
                    .bind(&user.email)
                    .bind(&user.name)
                    .bind(user.role.as_str())
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(pool)
                    .await
                    .map_err(db_err("SQLite insert user"))?;
            }
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => {
                query(postgres_sql::INSERT_USER)
                    .bind(&user.id)
                    .bind(&user.email)
                    .bind(&user.name)
                    .bind(user.role.as_str())
                    .bind(user.created_at)
                    .bind(user.updated_at)
                    .execute(pool)
                    .await
                    .map_err(db_err("Postgres insert user"))?;
            }
        }

        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> KeeperResult<Option<User>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, UserRow>(sqlite_sql::FIND_USER_BY_EMAIL)
                .bind(email)
                .fetch_optional(pool)
                .await
                .map_err(db_err("SQLite find_user_by_email"))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, UserRow>(postgres_sql::FIND_USER_BY_EMAIL)
                .bind(email)
                .fetch_optional(pool)
                .await
                .map_err(db_err("Postgres find_user_by_email"))?,
        };

        row.map(User::try_from).transpose()
    }

    async fn set_user_role(
        &self,
        id: &str,
        role: Role,
        now: NaiveDateTime,
    ) -> KeeperResult<Option<User>> {
        let row = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query_as::<_, UserRow>(sqlite_sql::SET_USER_ROLE)
                .bind(role.as_str())
                .bind(now)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(db_err("SQLite set_user_role"))?,
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query_as::<_, UserRow>(postgres_sql::SET_USER_ROLE)
                .bind(role.as_str())
                .bind(now)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(db_err("Postgres set_user_role"))?,
        };

        row.map(User::try_from).transpose()
    }
}
