use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub parent: Option<i64>,
    pub featured_media: Option<i64>,
    pub featured_image_url: Option<String>,
    pub comment_status: Option<String>,
    pub categories: Option<Vec<i64>>,
    pub tags: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub parent: Option<i64>,
    pub featured_media: Option<i64>,
    pub featured_image_url: Option<String>,
    pub comment_status: Option<String>,
    pub categories: Option<Vec<i64>>,
    pub tags: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub author: Option<i64>,
    pub categories: Option<i64>,
    pub tags: Option<i64>,
    pub search: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub force: Option<bool>,
}
