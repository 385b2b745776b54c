//! Blog entities: users, blogs and comments.

use quill_core::{DatabasePool, DbValue, Entity, Field, Result};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Password placeholder used whenever a user leaves the server
pub const MASKED_PASSWORD: &str = "******";

const SCHEMA: &str = include_str!("../schema.sql");

/// Current time as fractional epoch seconds
#[must_use]
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// New primary key: zero-padded 15-digit millisecond timestamp, a random
/// uuid in hex and a `000` suffix (50 characters, sortable by creation time)
#[must_use]
pub fn next_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("{millis:015}{}000", Uuid::new_v4().simple())
}

fn id_default() -> DbValue {
    DbValue::String(next_id())
}

fn now_default() -> DbValue {
    DbValue::Float(now())
}

/// Create the blog tables when missing
///
/// # Errors
///
/// `Error::Query` when a statement fails.
pub async fn create_tables(pool: &DatabasePool) -> Result<()> {
    for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        pool.execute(statement, &[], true).await?;
    }
    Ok(())
}

/// A registered account
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct User {
    /// Primary key
    pub id: Option<String>,
    /// Login email
    pub email: String,
    /// `sha1("<id>:<client sha1>")` in hex
    pub passwd: String,
    /// Admin rights
    pub admin: bool,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub image: String,
    /// Creation time in epoch seconds
    pub created_at: Option<f64>,
}

impl User {
    /// Primary key, empty before the first save
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Replace the stored hash before the user is shown to anyone
    #[must_use]
    pub fn masked(mut self) -> Self {
        self.passwd = MASKED_PASSWORD.to_string();
        self
    }
}

impl Entity for User {
    fn table_name() -> Option<&'static str> {
        Some("users")
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::string("id").primary_key().ddl("varchar(50)").default_with(id_default),
            Field::string("email").ddl("varchar(50)"),
            Field::string("passwd").ddl("varchar(50)"),
            Field::boolean("admin"),
            Field::string("name").ddl("varchar(50)"),
            Field::string("image").ddl("varchar(500)"),
            Field::float("created_at").default_with(now_default),
        ]
    }

    fn value(&self, field: &str) -> DbValue {
        match field {
            "id" => self.id.clone().into(),
            "email" => self.email.clone().into(),
            "passwd" => self.passwd.clone().into(),
            "admin" => self.admin.into(),
            "name" => self.name.clone().into(),
            "image" => self.image.clone().into(),
            "created_at" => self.created_at.into(),
            _ => DbValue::Null,
        }
    }

    fn set_value(&mut self, field: &str, value: DbValue) -> Result<()> {
        match field {
            "id" => self.id = value.decode()?,
            "email" => self.email = value.decode()?,
            "passwd" => self.passwd = value.decode()?,
            "admin" => self.admin = value.decode()?,
            "name" => self.name = value.decode()?,
            "image" => self.image = value.decode()?,
            "created_at" => self.created_at = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// A blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Blog {
    /// Primary key
    pub id: Option<String>,
    /// Author id
    pub user_id: String,
    /// Author name at posting time
    pub user_name: String,
    /// Author avatar at posting time
    pub user_image: String,
    /// Title
    pub name: String,
    /// Short summary
    pub summary: String,
    /// Body
    pub content: String,
    /// Creation time in epoch seconds
    pub created_at: Option<f64>,
}

impl Blog {
    /// Primary key, empty before the first save
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl Entity for Blog {
    fn table_name() -> Option<&'static str> {
        Some("blogs")
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::string("id").primary_key().ddl("varchar(50)").default_with(id_default),
            Field::string("user_id").ddl("varchar(50)"),
            Field::string("user_name").ddl("varchar(50)"),
            Field::string("user_image").ddl("varchar(500)"),
            Field::string("name").ddl("varchar(50)"),
            Field::string("summary").ddl("varchar(200)"),
            Field::text("content"),
            Field::float("created_at").default_with(now_default),
        ]
    }

    fn value(&self, field: &str) -> DbValue {
        match field {
            "id" => self.id.clone().into(),
            "user_id" => self.user_id.clone().into(),
            "user_name" => self.user_name.clone().into(),
            "user_image" => self.user_image.clone().into(),
            "name" => self.name.clone().into(),
            "summary" => self.summary.clone().into(),
            "content" => self.content.clone().into(),
            "created_at" => self.created_at.into(),
            _ => DbValue::Null,
        }
    }

    fn set_value(&mut self, field: &str, value: DbValue) -> Result<()> {
        match field {
            "id" => self.id = value.decode()?,
            "user_id" => self.user_id = value.decode()?,
            "user_name" => self.user_name = value.decode()?,
            "user_image" => self.user_image = value.decode()?,
            "name" => self.name = value.decode()?,
            "summary" => self.summary = value.decode()?,
            "content" => self.content = value.decode()?,
            "created_at" => self.created_at = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}

/// A comment on a blog post
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comment {
    /// Primary key
    pub id: Option<String>,
    /// Commented blog
    pub blog_id: String,
    /// Author id
    pub user_id: String,
    /// Author name at posting time
    pub user_name: String,
    /// Author avatar at posting time
    pub user_image: String,
    /// Body as plain text
    pub content: String,
    /// Creation time in epoch seconds
    pub created_at: Option<f64>,
}

impl Comment {
    /// Primary key, empty before the first save
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

impl Entity for Comment {
    fn table_name() -> Option<&'static str> {
        Some("comments")
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::string("id").primary_key().ddl("varchar(50)").default_with(id_default),
            Field::string("blog_id").ddl("varchar(50)"),
            Field::string("user_id").ddl("varchar(50)"),
            Field::string("user_name").ddl("varchar(50)"),
            Field::string("user_image").ddl("varchar(500)"),
            Field::text("content"),
            Field::float("created_at").default_with(now_default),
        ]
    }

    fn value(&self, field: &str) -> DbValue {
        match field {
            "id" => self.id.clone().into(),
            "blog_id" => self.blog_id.clone().into(),
            "user_id" => self.user_id.clone().into(),
            "user_name" => self.user_name.clone().into(),
            "user_image" => self.user_image.clone().into(),
            "content" => self.content.clone().into(),
            "created_at" => self.created_at.into(),
            _ => DbValue::Null,
        }
    }

    fn set_value(&mut self, field: &str, value: DbValue) -> Result<()> {
        match field {
            "id" => self.id = value.decode()?,
            "blog_id" => self.blog_id = value.decode()?,
            "user_id" => self.user_id = value.decode()?,
            "user_name" => self.user_name = value.decode()?,
            "user_image" => self.user_image = value.decode()?,
            "content" => self.content = value.decode()?,
            "created_at" => self.created_at = value.decode()?,
            _ => {}
        }
        Ok(())
    }
}
