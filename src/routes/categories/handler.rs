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
        entities::term::DEFAULT_TERM_ID,
        is_unique_violation,
        repositories::terms::{TermChanges, TermRepository},
    },
    error::{ApiError, ApiResult},
    format::{self, TermView, pagination},
    webhook::events,
};

use super::model::{CreateTermRequest, ListTermsQuery, UpdateTermRequest};

fn conflict_on_unique(e: sqlx::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("名称或slug已被占用".to_string())
    } else {
        ApiError::from(e)
    }
}

pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<ListTermsQuery>,
) -> ApiResult<impl IntoResponse> {
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (categories, total) = TermRepository::list_categories(&state.pool, page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = categories
        .iter()
        .map(|c| format::format_category(c, &base_url))
        .collect();

    let headers = pagination::pagination_headers(
        &format!(
            "{}/wp-json/wp/v2/categories",
            format::normalize_base_url(&base_url)
        ),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TermView>> {
    let category = TermRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_category(&category, &base_url)))
}

pub async fn create_category(
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
    let category = TermRepository::create_category(
        &state.pool,
        req.name.trim(),
        &slug,
        req.description.as_deref(),
        req.parent.unwrap_or(0),
    )
    .await
    .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::CATEGORY_CREATED,
        serde_json::json!({ "id": category.id, "name": category.name, "slug": category.slug }),
    );

    let base_url = state.base_url(&settings);
    Ok((
        StatusCode::CREATED,
        Json(format::format_category(&category, &base_url)),
    ))
}

pub async fn update_category(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTermRequest>,
) -> ApiResult<Json<TermView>> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }
    TermRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let category = TermRepository::update_category(
        &state.pool,
        id,
        TermChanges {
            name: req.name,
            slug: req.slug.map(|s| assist::slugify(&s)),
            description: req.description,
            parent_id: req.parent,
        },
    )
    .await
    .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::CATEGORY_UPDATED,
        serde_json::json!({ "id": category.id, "name": category.name, "slug": category.slug }),
    );

    let base_url = state.base_url(&settings);
    Ok(Json(format::format_category(&category, &base_url)))
}

pub async fn delete_category(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !can_view_private_fields(identity.role) {
        return Err(ApiError::Forbidden);
    }
    // 默认分类受保护，永远不可删除
    if id == DEFAULT_TERM_ID {
        return Err(ApiError::Forbidden);
    }
    TermRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    TermRepository::delete_category(&state.pool, id).await?;

    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::CATEGORY_DELETED,
        serde_json::json!({ "id": id }),
    );

    Ok(Json(serde_json::json!({ "deleted": true })))
}
