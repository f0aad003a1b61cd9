use axum::{
    Json,
    extract::{Extension, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{Identity, permissions::{can_edit_post, can_publish}},
    database::{
        entities::media::file_type_of,
        repositories::media::{MediaChanges, MediaRepository, NewMedia},
    },
    error::{ApiError, ApiResult},
    format::{self, MediaView, pagination},
    storage,
};

use super::model::{ListMediaQuery, UpdateMediaRequest, UploadForm};

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidParameter(format!("multipart解析失败: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                form.file_name = field.file_name().map(|n| n.to_string());
                form.content_type = field.content_type().map(|c| c.to_string());
                form.bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::InvalidParameter(format!("读取文件失败: {}", e)))?
                        .to_vec(),
                );
            }
            "title" => form.title = field.text().await.ok(),
            "alt_text" => form.alt_text = field.text().await.ok(),
            "caption" => form.caption = field.text().await.ok(),
            "description" => form.description = field.text().await.ok(),
            _ => {}
        }
    }
    Ok(form)
}

/// 先写对象存储再落元数据行；落行失败时尽力回收已写入的对象，避免孤儿文件
async fn store_upload(
    pool: &sqlx::PgPool,
    store: &dyn storage::ObjectStore,
    form: UploadForm,
    author_id: i64,
) -> ApiResult<crate::database::entities::media::Media> {
    let bytes = form
        .bytes
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::InvalidParameter("缺少file字段".to_string()))?;
    let filename = form
        .file_name
        .unwrap_or_else(|| "upload.bin".to_string());
    let mime_type = form
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let storage_key = storage::storage_key_for(&filename);
    // 对象存储失败没有降级可走，向上抛500
    let url = store
        .put(&storage_key, &bytes, &mime_type)
        .await
        .map_err(|e| {
            tracing::error!("Object store put failed: {}", e);
            ApiError::Upstream("文件存储失败".to_string())
        })?;

    let title = form
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| filename.clone());

    let inserted = MediaRepository::insert(
        pool,
        NewMedia {
            title,
            filename,
            file_type: file_type_of(&mime_type).to_string(),
            file_size: bytes.len() as i64,
            mime_type,
            storage_key: storage_key.clone(),
            url,
            alt_text: form.alt_text,
            caption: form.caption,
            description: form.description,
            width: None,
            height: None,
            author_id,
        },
    )
    .await;

    match inserted {
        Ok(media) => Ok(media),
        Err(e) => {
            if let Err(cleanup) = store.delete(&storage_key).await {
                tracing::warn!(
                    "Orphaned object cleanup failed for {}: {}",
                    storage_key, cleanup
                );
            }
            Err(ApiError::from(e))
        }
    }
}

pub async fn upload_media(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    // 上传权限与发布权限同档：订阅者和投稿者不能传文件
    if !can_publish(identity.role) {
        return Err(ApiError::Forbidden);
    }

    let form = read_upload_form(multipart).await?;
    let media = store_upload(&state.pool, state.store.as_ref(), form, identity.user_id).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok((
        StatusCode::CREATED,
        Json(format::format_media(&media, &base_url)),
    ))
}

pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<ListMediaQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (media, total) =
        MediaRepository::list(&state.pool, query.media_type.as_deref(), page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = media.iter().map(|m| format::format_media(m, &base_url)).collect();

    let headers = pagination::pagination_headers(
        &format!("{}/wp-json/wp/v2/media", format::normalize_base_url(&base_url)),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MediaView>> {
    let media = MediaRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_media(&media, &base_url)))
}

pub async fn update_media(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMediaRequest>,
) -> ApiResult<Json<MediaView>> {
    let existing = MediaRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_edit_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }

    let media = MediaRepository::update(
        &state.pool,
        id,
        MediaChanges {
            title: req.title,
            alt_text: req.alt_text,
            caption: req.caption,
            description: req.description,
        },
    )
    .await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_media(&media, &base_url)))
}

pub async fn delete_media(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let existing = MediaRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !can_edit_post(&identity, existing.author_id) {
        return Err(ApiError::Forbidden);
    }

    MediaRepository::delete(&state.pool, id).await?;
    // 元数据行已删，文件清理失败只记日志
    if let Err(e) = state.store.delete(&existing.storage_key).await {
        tracing::warn!("Object store delete failed for {}: {}", existing.storage_key, e);
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sqlx::PgPool;

    use crate::storage::{ObjectStore, StorageError};

    struct RecordingStore {
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(
            &self,
            key: &str,
            _bytes: &[u8],
            _content_type: &str,
        ) -> Result<String, StorageError> {
            Ok(format!("http://files.example/{}", key))
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[sqlx::test]
    async fn failed_insert_reclaims_stored_object(pool: PgPool) {
        let store = RecordingStore {
            deleted: Mutex::new(Vec::new()),
        };
        let form = UploadForm {
            file_name: Some("a.png".to_string()),
            content_type: Some("image/png".to_string()),
            bytes: Some(b"px".to_vec()),
            ..UploadForm::default()
        };

        // 不存在的作者触发外键失败，已写入的对象必须被回收
        let result = store_upload(&pool, &store, form, 9999).await;
        assert!(result.is_err());

        let deleted = store.deleted.lock().unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with(".png"));
    }
}
