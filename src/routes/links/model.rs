use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category: Option<i64>,
    pub visible: Option<String>,
    pub sort_order: Option<i32>,
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub category: Option<i64>,
    pub visible: Option<String>,
    pub sort_order: Option<i32>,
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListLinksQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}
