use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row};
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// A positional query parameter. Queries are written once with `?`
/// placeholders; the adapter handles each engine's native binding.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Null,
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Int(v)
    }
}

impl From<Option<String>> for SqlParam {
    fn from(v: Option<String>) -> Self {
        match v {
            Some(s) => SqlParam::Text(s),
            None => SqlParam::Null,
        }
    }
}

impl From<Option<&str>> for SqlParam {
    fn from(v: Option<&str>) -> Self {
        match v {
            Some(s) => SqlParam::Text(s.to_string()),
            None => SqlParam::Null,
        }
    }
}

impl From<Option<i64>> for SqlParam {
    fn from(v: Option<i64>) -> Self {
        match v {
            Some(n) => SqlParam::Int(n),
            None => SqlParam::Null,
        }
    }
}

/// Row types decodable from either engine by field name
pub trait Record:
    Send + Unpin + for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow>
{
}

impl<T> Record for T where
    T: Send + Unpin + for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow>
{
}

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut q = $query;
        for p in $params {
            q = match p {
                SqlParam::Text(v) => q.bind(v.as_str()),
                SqlParam::Int(v) => q.bind(*v),
                SqlParam::Null => q.bind(Option::<String>::None),
            };
        }
        q
    }};
}

/// Rewrite canonical `?` placeholders to the client-server engine's
/// native `$n` markers. `?` inside single-quoted literals is left alone.
fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0u32;
    let mut in_literal = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_literal = !in_literal;
                out.push(ch);
            }
            '?' if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Clone)]
enum DbPool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// Database handle over the embedded or the client-server engine.
///
/// All queries are written in one canonical placeholder style; callers
/// never see engine-specific rows, markers, or generated-id retrieval.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect to the engine selected by configuration: a connection URL
    /// means the client-server engine, otherwise the embedded file engine.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match &config.url {
            Some(url) => {
                // Fix legacy postgres:// scheme if necessary
                let url = url.replacen("postgres://", "postgresql://", 1);
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await?;
                Ok(Self {
                    pool: DbPool::Postgres(pool),
                })
            }
            None => {
                let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path))?
                    .create_if_missing(true)
                    .foreign_keys(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await?;
                Ok(Self {
                    pool: DbPool::Sqlite(pool),
                })
            }
        }
    }

    pub fn engine_name(&self) -> &'static str {
        match &self.pool {
            DbPool::Sqlite(_) => "sqlite",
            DbPool::Postgres(_) => "postgres",
        }
    }

    /// Execute a statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let done = bind_params!(sqlx::query(sql), params).execute(pool).await?;
                Ok(done.rows_affected())
            }
            DbPool::Postgres(pool) => {
                let sql = rewrite_placeholders(sql);
                let done = bind_params!(sqlx::query(&sql), params).execute(pool).await?;
                Ok(done.rows_affected())
            }
        }
    }

    /// Execute an INSERT and return the generated primary key. The
    /// embedded engine reports it natively; the client-server engine
    /// needs a `RETURNING id` clause appended and its first row read.
    pub async fn insert_returning_id(&self, sql: &str, params: &[SqlParam]) -> Result<i64> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let done = bind_params!(sqlx::query(sql), params).execute(pool).await?;
                Ok(done.last_insert_rowid())
            }
            DbPool::Postgres(pool) => {
                let sql = format!("{} RETURNING id", rewrite_placeholders(sql));
                let row = bind_params!(sqlx::query(&sql), params)
                    .fetch_one(pool)
                    .await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
        }
    }

    pub async fn fetch_all<T: Record>(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let rows = bind_params!(sqlx::query_as::<_, T>(sql), params)
                    .fetch_all(pool)
                    .await?;
                Ok(rows)
            }
            DbPool::Postgres(pool) => {
                let sql = rewrite_placeholders(sql);
                let rows = bind_params!(sqlx::query_as::<_, T>(&sql), params)
                    .fetch_all(pool)
                    .await?;
                Ok(rows)
            }
        }
    }

    pub async fn fetch_optional<T: Record>(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<Option<T>> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let row = bind_params!(sqlx::query_as::<_, T>(sql), params)
                    .fetch_optional(pool)
                    .await?;
                Ok(row)
            }
            DbPool::Postgres(pool) => {
                let sql = rewrite_placeholders(sql);
                let row = bind_params!(sqlx::query_as::<_, T>(&sql), params)
                    .fetch_optional(pool)
                    .await?;
                Ok(row)
            }
        }
    }

    pub async fn fetch_one<T: Record>(&self, sql: &str, params: &[SqlParam]) -> Result<T> {
        match &self.pool {
            DbPool::Sqlite(pool) => {
                let row = bind_params!(sqlx::query_as::<_, T>(sql), params)
                    .fetch_one(pool)
                    .await?;
                Ok(row)
            }
            DbPool::Postgres(pool) => {
                let sql = rewrite_placeholders(sql);
                let row = bind_params!(sqlx::query_as::<_, T>(&sql), params)
                    .fetch_one(pool)
                    .await?;
                Ok(row)
            }
        }
    }

    /// Begin a transaction. The adapter never commits implicitly: commit
    /// is explicit, and dropping an uncommitted transaction rolls back,
    /// so a failed step in a multi-statement operation leaves nothing
    /// behind.
    pub async fn begin(&self) -> Result<DbTransaction> {
        match &self.pool {
            DbPool::Sqlite(pool) => Ok(DbTransaction::Sqlite(pool.begin().await?)),
            DbPool::Postgres(pool) => Ok(DbTransaction::Postgres(pool.begin().await?)),
        }
    }

    /// Create the schema. The engines differ only in how generated
    /// primary keys are declared; timestamps are application-written TEXT
    /// so rows decode identically on both.
    pub async fn run_migrations(&self) -> Result<()> {
        let id_pk = match &self.pool {
            DbPool::Sqlite(_) => "INTEGER PRIMARY KEY AUTOINCREMENT",
            DbPool::Postgres(_) => "BIGSERIAL PRIMARY KEY",
        };

        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS users (
                    id {id_pk},
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('admin', 'student')),
                    created_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS files (
                    id {id_pk},
                    original_filename TEXT NOT NULL,
                    stored_filename TEXT UNIQUE NOT NULL,
                    uploader_username TEXT NOT NULL,
                    subject TEXT NOT NULL,
                    semester TEXT NOT NULL,
                    category TEXT NOT NULL DEFAULT 'Study Material',
                    department TEXT NOT NULL DEFAULT 'General',
                    description TEXT,
                    file_type TEXT NOT NULL,
                    file_size BIGINT NOT NULL,
                    resource_tag TEXT,
                    created_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS comments (
                    id {id_pk},
                    file_id BIGINT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
                    user_id BIGINT REFERENCES users(id) ON DELETE SET NULL,
                    display_name TEXT NOT NULL,
                    guest_department TEXT,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS notifications (
                    id {id_pk},
                    message TEXT NOT NULL,
                    link TEXT,
                    created_at TEXT NOT NULL
                )"
            ),
            "CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_comments_file_id ON comments(file_id)".to_string(),
        ];

        for stmt in &statements {
            self.execute(stmt, &[]).await?;
        }

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

/// In-progress transaction with the same canonical query interface
pub enum DbTransaction {
    Sqlite(sqlx::Transaction<'static, sqlx::Sqlite>),
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
}

impl DbTransaction {
    pub async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        match self {
            DbTransaction::Sqlite(tx) => {
                let done = bind_params!(sqlx::query(sql), params)
                    .execute(tx.as_mut())
                    .await?;
                Ok(done.rows_affected())
            }
            DbTransaction::Postgres(tx) => {
                let sql = rewrite_placeholders(sql);
                let done = bind_params!(sqlx::query(&sql), params)
                    .execute(tx.as_mut())
                    .await?;
                Ok(done.rows_affected())
            }
        }
    }

    pub async fn insert_returning_id(&mut self, sql: &str, params: &[SqlParam]) -> Result<i64> {
        match self {
            DbTransaction::Sqlite(tx) => {
                let done = bind_params!(sqlx::query(sql), params)
                    .execute(tx.as_mut())
                    .await?;
                Ok(done.last_insert_rowid())
            }
            DbTransaction::Postgres(tx) => {
                let sql = format!("{} RETURNING id", rewrite_placeholders(sql));
                let row = bind_params!(sqlx::query(&sql), params)
                    .fetch_one(tx.as_mut())
                    .await?;
                Ok(row.try_get::<i64, _>(0)?)
            }
        }
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.commit().await?,
            DbTransaction::Postgres(tx) => tx.commit().await?,
        }
        Ok(())
    }
}
