use serde::Deserialize;

/// 创建说说的请求体
#[derive(Debug, Deserialize)]
pub struct CreateMomentRequest {
    pub content: String,
    pub status: Option<String>,
    pub media_urls: Option<Vec<String>>,
}

/// 更新说说的请求体，全部字段可选
#[derive(Debug, Deserialize)]
pub struct UpdateMomentRequest {
    pub content: Option<String>,
    pub status: Option<String>,
    pub media_urls: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListMomentsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub force: Option<bool>,
}
