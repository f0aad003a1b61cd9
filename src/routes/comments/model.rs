use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub post: i64,
    pub parent: Option<i64>,
    pub content: String,
    /// 游客评论必填，登录用户忽略
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub post: Option<i64>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub force: Option<bool>,
}
