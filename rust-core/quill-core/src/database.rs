//! # Database Module
//!
//! Connection pool and statement executor over SQLx (SQLite, PostgreSQL).
//!
//! Statements are written with the portable `?` placeholder and translated to
//! the backend's native marker right before execution. Every call acquires a
//! pooled connection for its own duration only; the connection goes back to
//! the pool when the guard drops, on success and on error alike.

use crate::error::{Error, Result};
use crate::schema::ColumnType;
use serde::Serialize;
use sqlx::pool::PoolOptions;
use sqlx::postgres::{PgArguments, PgPool, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// A fetched row: column name to value
pub type Row = HashMap<String, DbValue>;

/// Portable placeholder token used in generated SQL
pub const PLACEHOLDER: char = '?';

/// Pool sizing and wait policy
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum concurrent checkouts
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long a checkout may wait before failing with `PoolTimeout`
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    fn options<DB: sqlx::Database>(&self) -> PoolOptions<DB> {
        PoolOptions::<DB>::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
    }
}

/// SQL dialect of a pool, used for placeholder translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `?` markers
    Sqlite,
    /// `$1, $2, ...` markers
    Postgres,
}

/// Database connection pool supporting multiple backends
#[derive(Clone)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DatabasePool").field(&self.backend()).finish()
    }
}

impl DatabasePool {
    /// Connect to the backend named by the URL scheme
    ///
    /// `postgres://` and `postgresql://` select PostgreSQL, anything else is
    /// handed to SQLite.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url, config).await
        } else {
            Self::connect_sqlite(url, config).await
        }
    }

    /// Connect to a SQLite database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pool = DatabasePool::connect_sqlite("sqlite::memory:", &PoolConfig::default()).await?;
    /// ```
    pub async fn connect_sqlite(url: &str, config: &PoolConfig) -> Result<Self> {
        info!(max = config.max_connections, "create database connection pool (sqlite)");
        let pool = config
            .options::<Sqlite>()
            .connect(url)
            .await
            .map_err(|e| Error::Query {
                message: format!("SQLite connection failed: {e}"),
            })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    pub async fn connect_postgres(url: &str, config: &PoolConfig) -> Result<Self> {
        info!(max = config.max_connections, "create database connection pool (postgres)");
        let pool = config
            .options::<Postgres>()
            .connect(url)
            .await
            .map_err(|e| Error::Query {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Placeholder dialect of this pool
    #[must_use]
    pub const fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Postgres(_) => Backend::Postgres,
        }
    }

    /// Run a SELECT and return up to `limit` rows (all rows when `None`)
    ///
    /// A limit wraps the statement in `select * from (...) limit n`, so the
    /// database stops producing rows at the cap.
    ///
    /// # Errors
    ///
    /// `PoolTimeout` when no connection frees up in time, `Query` on any
    /// backend failure. Nothing is retried.
    pub async fn query(&self, sql: &str, args: &[DbValue], limit: Option<usize>) -> Result<Vec<Row>> {
        info!(sql = %sql, "SQL");
        let capped = match limit {
            Some(limit) => format!("select * from ({sql}) as _capped_ limit {limit}"),
            None => sql.to_string(),
        };
        let native = translate_placeholders(&capped, self.backend());

        let rows = match self {
            Self::Sqlite(pool) => {
                let mut conn = pool.acquire().await.map_err(acquire_error)?;
                let query = bind_all(sqlx::query(&native), args, &[], bind_sqlite);
                let rows: Vec<SqliteRow> = query.fetch_all(&mut *conn).await.map_err(Error::query)?;
                rows.iter().map(sqlite_row_to_map).collect::<Vec<_>>()
            }
            Self::Postgres(pool) => {
                let mut conn = pool.acquire().await.map_err(acquire_error)?;
                let query = bind_all(sqlx::query(&native), args, &[], bind_pg);
                let rows: Vec<PgRow> = query.fetch_all(&mut *conn).await.map_err(Error::query)?;
                rows.iter().map(pg_row_to_map).collect::<Vec<_>>()
            }
        };

        info!(rows = rows.len(), "rows returned");
        Ok(rows)
    }

    /// Run an INSERT, UPDATE or DELETE and return the affected-row count
    ///
    /// With `autocommit == false` the statement runs inside an explicit
    /// transaction that is committed on success and rolled back on failure.
    /// NULL arguments bind as text; see [`DatabasePool::execute_typed`].
    pub async fn execute(&self, sql: &str, args: &[DbValue], autocommit: bool) -> Result<u64> {
        self.execute_typed(sql, args, &[], autocommit).await
    }

    /// [`DatabasePool::execute`] with column types for the arguments
    ///
    /// `types[i]` is the column `args[i]` is written to. PostgreSQL rejects a
    /// text NULL in a numeric or boolean column, so NULLs bind with that type.
    /// Arguments past the end of `types` bind NULL as text.
    pub async fn execute_typed(
        &self,
        sql: &str,
        args: &[DbValue],
        types: &[ColumnType],
        autocommit: bool,
    ) -> Result<u64> {
        info!(sql = %sql, autocommit, "SQL");
        let native = translate_placeholders(sql, self.backend());

        match self {
            Self::Sqlite(pool) => {
                let query = bind_all(sqlx::query(&native), args, types, bind_sqlite);
                if autocommit {
                    let mut conn = pool.acquire().await.map_err(acquire_error)?;
                    let done = query.execute(&mut *conn).await.map_err(Error::query)?;
                    return Ok(done.rows_affected());
                }
                let mut tx = pool.begin().await.map_err(acquire_error)?;
                match query.execute(&mut *tx).await {
                    Ok(done) => {
                        tx.commit().await.map_err(Error::query)?;
                        Ok(done.rows_affected())
                    }
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            tracing::warn!(error = %rollback, "rollback failed");
                        }
                        Err(Error::query(e))
                    }
                }
            }
            Self::Postgres(pool) => {
                let query = bind_all(sqlx::query(&native), args, types, bind_pg);
                if autocommit {
                    let mut conn = pool.acquire().await.map_err(acquire_error)?;
                    let done = query.execute(&mut *conn).await.map_err(Error::query)?;
                    return Ok(done.rows_affected());
                }
                let mut tx = pool.begin().await.map_err(acquire_error)?;
                match query.execute(&mut *tx).await {
                    Ok(done) => {
                        tx.commit().await.map_err(Error::query)?;
                        Ok(done.rows_affected())
                    }
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            tracing::warn!(error = %rollback, "rollback failed");
                        }
                        Err(Error::query(e))
                    }
                }
            }
        }
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}

fn acquire_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::PoolTimedOut => Error::PoolTimeout,
        other => Error::query(other),
    }
}

/// Rewrite portable `?` markers into the backend's native syntax
///
/// Markers inside single-quoted string literals are left alone.
#[must_use]
pub fn translate_placeholders(sql: &str, backend: Backend) -> String {
    if backend == Backend::Sqlite {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut in_literal = false;
    let mut index = 0;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(c);
            }
            PLACEHOLDER if !in_literal => {
                index += 1;
                out.push('$');
                out.push_str(&index.to_string());
            }
            _ => out.push(c),
        }
    }
    out
}

/// Database value types shared by rows, arguments and entity fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

impl DbValue {
    /// Check for `Null`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert into a Rust value
    ///
    /// # Errors
    ///
    /// `Error::Decode` when the value has an incompatible shape.
    pub fn decode<T: FromDbValue>(self) -> Result<T> {
        T::from_db(self)
    }

    fn describe(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Int(i) => format!("integer {i}"),
            Self::Float(f) => format!("float {f}"),
            Self::String(s) => format!("string {s:?}"),
            Self::Bool(b) => format!("bool {b}"),
            Self::Bytes(b) => format!("{} bytes", b.len()),
        }
    }
}

impl std::fmt::Display for DbValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a column value into a Rust field type
pub trait FromDbValue: Sized {
    /// Convert, failing with `Error::Decode` on incompatible values
    fn from_db(value: DbValue) -> Result<Self>;
}

fn decode_error(expected: &'static str, value: &DbValue) -> Error {
    Error::Decode {
        expected,
        found: value.describe(),
    }
}

impl FromDbValue for String {
    fn from_db(value: DbValue) -> Result<Self> {
        match value {
            DbValue::String(s) => Ok(s),
            DbValue::Int(i) => Ok(i.to_string()),
            DbValue::Float(f) => Ok(f.to_string()),
            DbValue::Bytes(b) => Self::from_utf8(b).map_err(|e| Error::Decode {
                expected: "string",
                found: e.to_string(),
            }),
            other => Err(decode_error("string", &other)),
        }
    }
}

impl FromDbValue for i64 {
    fn from_db(value: DbValue) -> Result<Self> {
        match value {
            DbValue::Int(i) => Ok(i),
            DbValue::Bool(b) => Ok(Self::from(b)),
            DbValue::String(ref s) => s.trim().parse().map_err(|_| decode_error("integer", &value)),
            other => Err(decode_error("integer", &other)),
        }
    }
}

impl FromDbValue for f64 {
    fn from_db(value: DbValue) -> Result<Self> {
        match value {
            DbValue::Float(f) => Ok(f),
            #[allow(clippy::cast_precision_loss)]
            DbValue::Int(i) => Ok(i as Self),
            DbValue::String(ref s) => s.trim().parse().map_err(|_| decode_error("float", &value)),
            other => Err(decode_error("float", &other)),
        }
    }
}

impl FromDbValue for bool {
    fn from_db(value: DbValue) -> Result<Self> {
        match value {
            DbValue::Bool(b) => Ok(b),
            DbValue::Int(i) => Ok(i != 0),
            DbValue::String(ref s) => match s.to_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(decode_error("bool", &value)),
            },
            other => Err(decode_error("bool", &other)),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db(value: DbValue) -> Result<Self> {
        match value {
            DbValue::Null => Ok(None),
            other => T::from_db(other).map(Some),
        }
    }
}

fn bind_all<Q>(
    query: Q,
    args: &[DbValue],
    types: &[ColumnType],
    bind: impl Fn(Q, &DbValue, Option<ColumnType>) -> Q,
) -> Q {
    args.iter()
        .enumerate()
        .fold(query, |query, (i, value)| bind(query, value, types.get(i).copied()))
}

fn bind_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DbValue,
    column: Option<ColumnType>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match (value, column) {
        (DbValue::Null, Some(ColumnType::Integer)) => query.bind(None::<i64>),
        (DbValue::Null, Some(ColumnType::Float)) => query.bind(None::<f64>),
        (DbValue::Null, Some(ColumnType::Boolean)) => query.bind(None::<bool>),
        (DbValue::Null, _) => query.bind(None::<String>),
        (value, _) => bind_value_sqlite(query, value),
    }
}

fn bind_value_sqlite<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &DbValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Int(i) => query.bind(*i),
        DbValue::Float(f) => query.bind(*f),
        DbValue::String(s) => query.bind(s.clone()),
        DbValue::Bool(b) => query.bind(*b),
        DbValue::Bytes(b) => query.bind(b.clone()),
    }
}

fn bind_pg<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DbValue,
    column: Option<ColumnType>,
) -> Query<'q, Postgres, PgArguments> {
    match (value, column) {
        (DbValue::Null, Some(ColumnType::Integer)) => query.bind(None::<i64>),
        (DbValue::Null, Some(ColumnType::Float)) => query.bind(None::<f64>),
        (DbValue::Null, Some(ColumnType::Boolean)) => query.bind(None::<bool>),
        (DbValue::Null, _) => query.bind(None::<String>),
        (value, _) => bind_value_pg(query, value),
    }
}

fn bind_value_pg<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &DbValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        DbValue::Null => query.bind(None::<String>),
        DbValue::Int(i) => query.bind(*i),
        DbValue::Float(f) => query.bind(*f),
        DbValue::String(s) => query.bind(s.clone()),
        DbValue::Bool(b) => query.bind(*b),
        DbValue::Bytes(b) => query.bind(b.clone()),
    }
}

/// Convert SQLite row to a map
///
/// SQLite columns are loosely typed, so each value is decoded by its own
/// storage class rather than the declared column type.
fn sqlite_row_to_map(row: &SqliteRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let storage = match row.try_get_raw(i) {
            Ok(raw) if !raw.is_null() => raw.type_info().name().to_string(),
            _ => {
                map.insert(name, DbValue::Null);
                continue;
            }
        };

        let value = match storage.as_str() {
            "INTEGER" => row
                .try_get::<i64, _>(i)
                .map(DbValue::Int)
                .unwrap_or(DbValue::Null),
            "REAL" => row
                .try_get::<f64, _>(i)
                .map(DbValue::Float)
                .unwrap_or(DbValue::Null),
            "BLOB" => row
                .try_get::<Vec<u8>, _>(i)
                .map(DbValue::Bytes)
                .unwrap_or(DbValue::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(DbValue::String)
                .unwrap_or(DbValue::Null),
        };

        map.insert(name, value);
    }

    map
}

/// Convert PostgreSQL row to a map
fn pg_row_to_map(row: &PgRow) -> Row {
    let mut map = HashMap::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "INT2" => row
                .try_get::<Option<i16>, _>(i)
                .map(|v| v.map_or(DbValue::Null, |n| DbValue::Int(i64::from(n))))
                .unwrap_or(DbValue::Null),
            "INT4" => row
                .try_get::<Option<i32>, _>(i)
                .map(|v| v.map_or(DbValue::Null, |n| DbValue::Int(i64::from(n))))
                .unwrap_or(DbValue::Null),
            "INT8" => row
                .try_get::<Option<i64>, _>(i)
                .map(DbValue::from)
                .unwrap_or(DbValue::Null),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(i)
                .map(|v| v.map_or(DbValue::Null, |n| DbValue::Float(f64::from(n))))
                .unwrap_or(DbValue::Null),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(i)
                .map(DbValue::from)
                .unwrap_or(DbValue::Null),
            "BOOL" => row
                .try_get::<Option<bool>, _>(i)
                .map(DbValue::from)
                .unwrap_or(DbValue::Null),
            "BYTEA" => row
                .try_get::<Option<Vec<u8>>, _>(i)
                .map(DbValue::from)
                .unwrap_or(DbValue::Null),
            _ => row
                .try_get::<Option<String>, _>(i)
                .map(DbValue::from)
                .unwrap_or(DbValue::Null),
        };

        map.insert(name, value);
    }

    map
}
