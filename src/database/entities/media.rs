use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Media {
    pub id: i64,
    pub title: String,
    pub filename: String,
    /// image/video/audio/file四类
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    /// 对象存储内的键，删除时用
    pub storage_key: String,
    pub url: String,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

/// 根据MIME推导大类
pub fn file_type_of(mime: &str) -> &'static str {
    if mime.starts_with("image/") {
        "image"
    } else if mime.starts_with("video/") {
        "video"
    } else if mime.starts_with("audio/") {
        "audio"
    } else {
        "file"
    }
}
