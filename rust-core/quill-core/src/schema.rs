//! # Schema Registry
//!
//! Field descriptions declared by entity types and the cached per-type
//! descriptor holding the derived SELECT/INSERT/UPDATE/DELETE templates.
//!
//! Descriptors are derived once per entity type and shared process-wide.
//! Concurrent first use of the same type resolves to a single descriptor.

use crate::database::DbValue;
use crate::entity::Entity;
use crate::error::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::info;

/// Logical column kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Bounded string (`varchar`)
    String,
    /// Boolean flag
    Boolean,
    /// 64-bit integer
    Integer,
    /// Floating point
    Float,
    /// Unbounded text
    Text,
}

impl ColumnType {
    /// Default DDL type for the column kind
    #[must_use]
    pub const fn default_ddl(self) -> &'static str {
        match self {
            Self::String => "varchar(100)",
            Self::Boolean => "boolean",
            Self::Integer => "bigint",
            Self::Float => "real",
            Self::Text => "text",
        }
    }
}

/// Value used by `save` when a field is unset
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// No default, the column receives NULL
    #[default]
    None,
    /// Constant value
    Value(DbValue),
    /// Evaluated at each use (ids, timestamps)
    Producer(fn() -> DbValue),
}

impl FieldDefault {
    /// Evaluate the default, if any
    #[must_use]
    pub fn produce(&self) -> Option<DbValue> {
        match self {
            Self::None => None,
            Self::Value(v) => Some(v.clone()),
            Self::Producer(f) => Some(f()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Value(v) => write!(f, "Value({v:?})"),
            Self::Producer(_) => write!(f, "Producer(..)"),
        }
    }
}

/// One declared column of an entity
#[derive(Debug, Clone)]
pub struct Field {
    /// Column name, also the field's name on the entity
    pub name: &'static str,
    /// Column kind
    pub column_type: ColumnType,
    /// DDL type string
    pub ddl: &'static str,
    /// Whether this column is the primary key
    pub primary_key: bool,
    /// Default used by `save` for unset values
    pub default: FieldDefault,
}

impl Field {
    fn new(name: &'static str, column_type: ColumnType, default: FieldDefault) -> Self {
        Self {
            name,
            column_type,
            ddl: column_type.default_ddl(),
            primary_key: false,
            default,
        }
    }

    /// `varchar(100)` column without default
    #[must_use]
    pub fn string(name: &'static str) -> Self {
        Self::new(name, ColumnType::String, FieldDefault::None)
    }

    /// Boolean column defaulting to `false`
    #[must_use]
    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Boolean, FieldDefault::Value(DbValue::Bool(false)))
    }

    /// `bigint` column defaulting to `0`
    #[must_use]
    pub fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer, FieldDefault::Value(DbValue::Int(0)))
    }

    /// `real` column defaulting to `0.0`
    #[must_use]
    pub fn float(name: &'static str) -> Self {
        Self::new(name, ColumnType::Float, FieldDefault::Value(DbValue::Float(0.0)))
    }

    /// `text` column without default
    #[must_use]
    pub fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text, FieldDefault::None)
    }

    /// Mark as primary key
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the DDL type (e.g. `varchar(50)`)
    #[must_use]
    pub const fn ddl(mut self, ddl: &'static str) -> Self {
        self.ddl = ddl;
        self
    }

    /// Constant default
    #[must_use]
    pub fn default_value(mut self, value: impl Into<DbValue>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Default computed on each `save`
    #[must_use]
    pub fn default_with(mut self, producer: fn() -> DbValue) -> Self {
        self.default = FieldDefault::Producer(producer);
        self
    }

    /// Remove any default
    #[must_use]
    pub fn no_default(mut self) -> Self {
        self.default = FieldDefault::None;
        self
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?}, {}:{}>", self.column_type, self.ddl, self.name)
    }
}

/// Derived, immutable metadata for one entity type
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Table name
    pub table: String,
    /// Primary key field
    pub primary_key: Field,
    /// Non-key fields in declaration order
    pub fields: Vec<Field>,
    /// `select <pk>, <fields> from <table>`
    pub select: String,
    /// `insert into <table> (<fields>, <pk>) values (?, ...)`
    pub insert: String,
    /// `update <table> set <field>=?, ... where <pk>=?`
    pub update: String,
    /// `delete from <table> where <pk>=?`
    pub delete: String,
}

impl EntityDescriptor {
    /// Build a descriptor from declared fields
    ///
    /// # Errors
    ///
    /// `Error::Schema` unless exactly one field is the primary key.
    pub fn build(entity: &str, table: &str, declared: Vec<Field>) -> Result<Self> {
        let mut primary_key: Option<Field> = None;
        let mut fields = Vec::with_capacity(declared.len());

        for field in declared {
            info!(entity, "  found mapping: {} ==> {}", field.name, field);
            if field.primary_key {
                if primary_key.is_some() {
                    return Err(Error::Schema {
                        entity: entity.to_string(),
                        reason: format!("duplicate primary key for field: {}", field.name),
                    });
                }
                primary_key = Some(field);
            } else {
                fields.push(field);
            }
        }

        let primary_key = primary_key.ok_or_else(|| Error::Schema {
            entity: entity.to_string(),
            reason: "primary key not found".to_string(),
        })?;

        let table_q = quote(table);
        let pk_q = quote(primary_key.name);
        let escaped: Vec<String> = fields.iter().map(|f| quote(f.name)).collect();

        let select = if escaped.is_empty() {
            format!("select {pk_q} from {table_q}")
        } else {
            format!("select {pk_q}, {} from {table_q}", escaped.join(", "))
        };
        let mut insert_cols = escaped.clone();
        insert_cols.push(pk_q.clone());
        let insert = format!(
            "insert into {table_q} ({}) values ({})",
            insert_cols.join(", "),
            placeholders(insert_cols.len())
        );
        let update = format!(
            "update {table_q} set {} where {pk_q}=?",
            escaped
                .iter()
                .map(|f| format!("{f}=?"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let delete = format!("delete from {table_q} where {pk_q}=?");

        Ok(Self {
            table: table.to_string(),
            primary_key,
            fields,
            select,
            insert,
            update,
            delete,
        })
    }

    /// Look up a declared field (primary key included)
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        if self.primary_key.name == name {
            return Some(&self.primary_key);
        }
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column names in select order: primary key first
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.primary_key.name).chain(self.fields.iter().map(|f| f.name))
    }
}

/// Double-quote an identifier
#[must_use]
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `?, ?, ?` with `n` markers
#[must_use]
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

type Registry = RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Return the cached descriptor of `E`, deriving it on first use
///
/// # Errors
///
/// `Error::Schema` when the entity's field list is malformed. Failures are
/// not cached.
pub fn describe<E: Entity>() -> Result<Arc<EntityDescriptor>> {
    let key = TypeId::of::<E>();
    {
        let cache = registry().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = cache.get(&key) {
            return Ok(Arc::clone(found));
        }
    }

    let mut cache = registry().write().unwrap_or_else(PoisonError::into_inner);
    // another caller may have derived it while we waited for the write lock
    if let Some(found) = cache.get(&key) {
        return Ok(Arc::clone(found));
    }

    let entity = type_label::<E>();
    let table = E::table_name().unwrap_or(entity);
    info!("found model: {} (table: {})", entity, table);
    let descriptor = Arc::new(EntityDescriptor::build(entity, table, E::fields())?);
    cache.insert(key, Arc::clone(&descriptor));
    Ok(descriptor)
}

/// Bare type name of `E` (path and generics stripped)
fn type_label<E: 'static>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
