use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateTermRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTermRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListTermsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
