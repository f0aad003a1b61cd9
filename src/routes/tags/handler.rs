use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState, assist,
    auth::{Identity, permissions::can_view_private_fields},
    database::{
        is_unique_violation,
        repositories::terms::{TermChanges, TermRepository},
    },
    error::{ApiError, ApiResult},
    format::{self, TermView, pagination},
    webhook::events,
};

use crate::routes::categories::model::{CreateTermRequest, ListTermsQuery, UpdateTermRequest};

fn conflict_on_unique(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("名称或slug已被占用".to_string())
    } else {
        ApiError::from(e)
    }
}

pub async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTermsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (tags, total) = TermRepository::list_tags(&state.pool, page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = tags.iter().map(|t| format::format_tag(t, &base_url)).collect();

    let headers = pagination::pagination_headers(
        &format!("{}/wp-json/wp/v2/tags", format::normalize_base_url(&base_url)),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TermView>> {
    let tag = TermRepository::find_tag(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_tag(&tag, &base_url)))
}

pub async fn create_tag(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreateTermRequest>,
) -> ApiResult<impl IntoResponse> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidParameter("名称不能为空".to_string()));
    }

    let slug = match &req.slug {
        Some(slug) if !slug.trim().is_empty() => assist::slugify(slug),
        _ => assist::slugify(&req.name),
    };
    let tag = TermRepository::create_tag(&state.pool, req.name.trim(), &slug, req.description.as_deref())
        .await
        .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::TAG_CREATED,
        serde_json::json!({ "id": tag.id, "name": tag.name, "slug": tag.slug }),
    );

    let base_url = state.base_url(&settings);
    Ok((StatusCode::CREATED, Json(format::format_tag(&tag, &base_url))))
}

pub async fn update_tag(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTermRequest>,
) -> ApiResult<Json<TermView>> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }
    TermRepository::find_tag(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let tag = TermRepository::update_tag(
        &state.pool,
        id,
        TermChanges {
            name: req.name,
            slug: req.slug.map(|s| assist::slugify(&s)),
            description: req.description,
            parent_id: None,
        },
    )
    .await
    .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::TAG_UPDATED,
        serde_json::json!({ "id": tag.id, "name": tag.name, "slug": tag.slug }),
    );

    let base_url = state.base_url(&settings);
    Ok(Json(format::format_tag(&tag, &base_url)))
}

pub async fn delete_tag(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }
    TermRepository::find_tag(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    TermRepository::delete_tag(&state.pool, id).await?;

    let settings = state.settings.get(&state.pool).await;
    state
        .notifier
        .fire(&settings, events::TAG_DELETED, serde_json::json!({ "id": id }));

    Ok(Json(serde_json::json!({ "deleted": true })))
}
