use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 文章和页面共用一张表，靠post_type区分
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub post_type: String,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: String,
    pub status: String,
    pub author_id: i64,
    pub parent_id: i64,
    pub featured_media_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub comment_status: String,
    pub comment_count: i64,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 首次发布时写入一次，之后不再改动
    pub published_at: Option<DateTime<Utc>>,
}

pub const STATUS_PUBLISH: &str = "publish";
pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PRIVATE: &str = "private";
pub const STATUS_TRASH: &str = "trash";

pub const POST_STATUSES: &[&str] = &[
    STATUS_PUBLISH,
    STATUS_DRAFT,
    STATUS_PENDING,
    STATUS_PRIVATE,
    STATUS_TRASH,
];
