//! # Entities
//!
//! Typed records persisted through the [schema registry](crate::schema).
//!
//! An entity type declares its columns once and maps column names to its own
//! struct fields through [`Entity::value`] and [`Entity::set_value`]. The CRUD
//! operations are provided on top of that: they read the cached descriptor,
//! render the statement, and hand it to the [`DatabasePool`].
//!
//! ```ignore
//! let blogs = Blog::find_all(&pool, FindOptions::new()
//!     .order_by("created_at desc")
//!     .limit((page.offset, page.limit)))
//!     .await?;
//! ```

use crate::database::{Backend, DatabasePool, DbValue, Row};
use crate::error::{Error, Result};
use crate::schema::{describe, quote, EntityDescriptor, Field};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Row cap for `find_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// `limit ?`
    Count(i64),
    /// `limit ?, ?` as (offset, count)
    Range(i64, i64),
}

impl From<i64> for Limit {
    fn from(count: i64) -> Self {
        Self::Count(count)
    }
}

impl From<(i64, i64)> for Limit {
    fn from((offset, count): (i64, i64)) -> Self {
        Self::Range(offset, count)
    }
}

impl TryFrom<&[i64]> for Limit {
    type Error = Error;

    fn try_from(values: &[i64]) -> Result<Self> {
        match *values {
            [count] => Ok(Self::Count(count)),
            [offset, count] => Ok(Self::Range(offset, count)),
            _ => Err(Error::InvalidLimit(format!("{values:?}"))),
        }
    }
}

/// Optional clauses for [`Entity::find_all`]
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    filter: Option<String>,
    args: Vec<DbValue>,
    order_by: Option<String>,
    limit: Option<Limit>,
}

impl FindOptions {
    /// No clauses: every row in storage order
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `where` clause using `?` markers, with its arguments
    #[must_use]
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<DbValue>) -> Self {
        self.filter = Some(clause.into());
        self.args = args;
        self
    }

    /// `order by` clause
    #[must_use]
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    /// Row cap or (offset, count) window
    #[must_use]
    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Append the clauses to `base` and collect the arguments in marker order
    ///
    /// A range renders as `limit ?, ?` (offset, count); PostgreSQL has no such
    /// form and gets `limit ? offset ?` (count, offset) instead.
    #[must_use]
    pub fn render(&self, base: &str, backend: Backend) -> (String, Vec<DbValue>) {
        let mut sql = vec![base.to_string()];
        let mut args = self.args.clone();

        if let Some(filter) = &self.filter {
            sql.push("where".to_string());
            sql.push(filter.clone());
        }
        if let Some(order_by) = &self.order_by {
            sql.push("order by".to_string());
            sql.push(order_by.clone());
        }
        match self.limit {
            Some(Limit::Count(count)) => {
                sql.push("limit ?".to_string());
                args.push(DbValue::Int(count));
            }
            Some(Limit::Range(offset, count)) if backend == Backend::Postgres => {
                sql.push("limit ? offset ?".to_string());
                args.push(DbValue::Int(count));
                args.push(DbValue::Int(offset));
            }
            Some(Limit::Range(offset, count)) => {
                sql.push("limit ?, ?".to_string());
                args.push(DbValue::Int(offset));
                args.push(DbValue::Int(count));
            }
            None => {}
        }

        (sql.join(" "), args)
    }
}

/// A persistable record type
///
/// Implementors list their columns in [`Entity::fields`]; exactly one must be
/// the primary key. `value` returns [`DbValue::Null`] for unset fields, which
/// is what `save` replaces with the field's default.
#[async_trait]
pub trait Entity: Default + Send + Sync + Sized + 'static {
    /// Table name override; the type's own name when `None`
    fn table_name() -> Option<&'static str> {
        None
    }

    /// Declared columns
    fn fields() -> Vec<Field>;

    /// Current value of a column
    fn value(&self, field: &str) -> DbValue;

    /// Assign a column value
    ///
    /// # Errors
    ///
    /// `Error::Decode` when the value does not fit the field's type.
    fn set_value(&mut self, field: &str, value: DbValue) -> Result<()>;

    /// Cached descriptor of this type
    fn describe() -> Result<Arc<EntityDescriptor>> {
        describe::<Self>()
    }

    /// Build an instance from a fetched row
    ///
    /// Columns the entity does not declare are ignored; declared columns
    /// missing from the row keep their `Default` value.
    fn from_row(mut row: Row) -> Result<Self> {
        let descriptor = Self::describe()?;
        let mut entity = Self::default();
        for column in descriptor.columns() {
            if let Some(value) = row.remove(column) {
                entity.set_value(column, value)?;
            }
        }
        Ok(entity)
    }

    /// Current value, or the field's default when unset
    ///
    /// The bool is true when the default was used.
    fn value_or_default(&self, field: &Field) -> (DbValue, bool) {
        let value = self.value(field.name);
        if !value.is_null() {
            return (value, false);
        }
        match field.default.produce() {
            Some(default) => {
                debug!("using default value for {}: {}", field.name, default);
                (default, true)
            }
            None => (DbValue::Null, false),
        }
    }

    /// Find by primary key
    async fn find(pool: &DatabasePool, pk: DbValue) -> Result<Option<Self>> {
        let d = Self::describe()?;
        let sql = format!("{} where {}=?", d.select, quote(d.primary_key.name));
        let rows = pool.query(&sql, &[pk], Some(1)).await?;
        rows.into_iter().next().map(Self::from_row).transpose()
    }

    /// Find by optional where / order by / limit clauses
    async fn find_all(pool: &DatabasePool, options: FindOptions) -> Result<Vec<Self>> {
        let d = Self::describe()?;
        let (sql, args) = options.render(&d.select, pool.backend());
        let rows = pool.query(&sql, &args, None).await?;
        rows.into_iter().map(Self::from_row).collect()
    }

    /// Single computed value, e.g. `count(id)`; `None` when no row returns
    async fn find_number(
        pool: &DatabasePool,
        select: &str,
        filter: Option<&str>,
        args: Vec<DbValue>,
    ) -> Result<Option<DbValue>> {
        let d = Self::describe()?;
        let mut sql = format!("select {select} _num_ from {}", quote(&d.table));
        if let Some(filter) = filter {
            sql.push_str(" where ");
            sql.push_str(filter);
        }
        let rows = pool.query(&sql, &args, Some(1)).await?;
        Ok(rows.into_iter().next().and_then(|mut r| r.remove("_num_")))
    }

    /// Insert; unset fields (primary key included) receive their defaults
    ///
    /// The defaults are stored on `self` once the insert succeeds. Returns
    /// the affected-row count. A count other than 1 is logged, not raised.
    async fn save(&mut self, pool: &DatabasePool) -> Result<u64> {
        let d = Self::describe()?;
        let columns: Vec<&Field> = d.fields.iter().chain([&d.primary_key]).collect();
        let mut args = Vec::with_capacity(columns.len());
        let mut defaulted = Vec::new();
        for field in &columns {
            let (value, is_default) = self.value_or_default(field);
            if is_default {
                defaulted.push((field.name, value.clone()));
            }
            args.push(value);
        }
        let types: Vec<_> = columns.iter().map(|f| f.column_type).collect();

        let rows = pool.execute_typed(&d.insert, &args, &types, true).await?;
        for (name, value) in defaulted {
            self.set_value(name, value)?;
        }
        if rows != 1 {
            warn!(table = %d.table, "failed to insert record: affected rows: {}", rows);
        }
        Ok(rows)
    }

    /// Update by primary key using current values only
    async fn update(&self, pool: &DatabasePool) -> Result<u64> {
        let d = Self::describe()?;
        let columns: Vec<&Field> = d.fields.iter().chain([&d.primary_key]).collect();
        let args: Vec<DbValue> = columns.iter().map(|f| self.value(f.name)).collect();
        let types: Vec<_> = columns.iter().map(|f| f.column_type).collect();

        let rows = pool.execute_typed(&d.update, &args, &types, true).await?;
        if rows != 1 {
            warn!(table = %d.table, "failed to update by primary key: affected rows: {}", rows);
        }
        Ok(rows)
    }

    /// Delete by primary key
    async fn remove(&self, pool: &DatabasePool) -> Result<u64> {
        let d = Self::describe()?;
        let args = [self.value(d.primary_key.name)];

        let rows = pool
            .execute_typed(&d.delete, &args, &[d.primary_key.column_type], true)
            .await?;
        if rows != 1 {
            warn!(table = %d.table, "failed to remove by primary key: affected rows: {}", rows);
        }
        Ok(rows)
    }
}
