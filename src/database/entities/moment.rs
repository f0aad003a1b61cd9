use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 说说/动态：社交风格的短内容
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Moment {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    /// publish/draft/trash
    pub status: String,
    /// JSON编码的URL数组，顺序有意义
    pub media_urls: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Moment {
    pub fn media_url_list(&self) -> Vec<String> {
        serde_json::from_str(&self.media_urls).unwrap_or_default()
    }
}
