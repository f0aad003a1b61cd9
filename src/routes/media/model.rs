use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UpdateMediaRequest {
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListMediaQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub media_type: Option<String>,
}

/// multipart表单收集到的字段
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
}
