use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    /// 0表示顶层评论，否则指向被回复的评论
    pub parent_id: i64,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub author_ip: Option<String>,
    pub content: String,
    pub status: String,
    /// 空表示游客评论
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_SPAM: &str = "spam";
pub const STATUS_TRASH: &str = "trash";

pub const COMMENT_STATUSES: &[&str] = &[
    STATUS_APPROVED,
    STATUS_PENDING,
    STATUS_SPAM,
    STATUS_TRASH,
];
