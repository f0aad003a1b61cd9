use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 友情链接
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category_id: i64,
    /// yes/no
    pub visible: String,
    pub sort_order: i32,
    /// _blank/_self
    pub target: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LinkCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub count: i64,
}
