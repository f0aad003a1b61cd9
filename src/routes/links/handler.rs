use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{Identity, permissions::can_manage_site},
    database::{
        entities::term::DEFAULT_TERM_ID,
        repositories::links::{LinkChanges, LinkRepository, NewLink},
    },
    error::{ApiError, ApiResult},
    format::{self, LinkCategoryView, LinkView, pagination},
};

use super::model::{CreateLinkRequest, LinkCategoryRequest, ListLinksQuery, UpdateLinkRequest};

fn conflict_on_unique(e: sqlx::Error) -> ApiError {
    if crate::database::is_unique_violation(&e) {
        ApiError::Conflict("名称已被占用".to_string())
    } else {
        ApiError::from(e)
    }
}

fn validate_visible(value: &str) -> Result<(), ApiError> {
    if value == "yes" || value == "no" {
        Ok(())
    } else {
        Err(ApiError::InvalidParameter(format!("无效的visible: {}", value)))
    }
}

fn validate_target(value: &str) -> Result<(), ApiError> {
    if value == "_blank" || value == "_self" {
        Ok(())
    } else {
        Err(ApiError::InvalidParameter(format!("无效的target: {}", value)))
    }
}

pub async fn list_links(
    identity: Option<Extension<Identity>>,
    State(state): State<AppState>,
    Query(query): Query<ListLinksQuery>,
) -> ApiResult<impl IntoResponse> {
    // 公开访问只看visible=yes
    let privileged = identity
        .map(|Extension(id)| can_manage_site(id.role))
        .unwrap_or(false);
    let (page, per_page) = pagination::clamp_pagination(query.page, query.per_page);
    let (links, total) = LinkRepository::list(&state.pool, !privileged, page, per_page).await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    let views: Vec<_> = links.iter().map(|l| format::format_link(l, &base_url)).collect();

    let headers = pagination::pagination_headers(
        &format!("{}/wp-json/wp/v2/links", format::normalize_base_url(&base_url)),
        page,
        per_page,
        total,
    );
    Ok((headers, Json(views)))
}

pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<LinkView>> {
    let link = LinkRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_link(&link, &base_url)))
}

pub async fn create_link(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<CreateLinkRequest>,
) -> ApiResult<impl IntoResponse> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if req.name.trim().is_empty() || req.url.trim().is_empty() {
        return Err(ApiError::InvalidParameter("名称和URL不能为空".to_string()));
    }
    let visible = req.visible.unwrap_or_else(|| "yes".to_string());
    validate_visible(&visible)?;
    let target = req.target.unwrap_or_else(|| "_blank".to_string());
    validate_target(&target)?;

    let category_id = req.category.unwrap_or(DEFAULT_TERM_ID);
    LinkRepository::find_category(&state.pool, category_id)
        .await?
        .ok_or_else(|| ApiError::InvalidParameter("友链分类不存在".to_string()))?;

    let link = LinkRepository::insert(
        &state.pool,
        NewLink {
            name: req.name.trim().to_string(),
            url: req.url.trim().to_string(),
            description: req.description,
            category_id,
            visible,
            sort_order: req.sort_order.unwrap_or(0),
            target,
        },
    )
    .await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok((StatusCode::CREATED, Json(format::format_link(&link, &base_url))))
}

pub async fn update_link(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLinkRequest>,
) -> ApiResult<Json<LinkView>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if let Some(visible) = &req.visible {
        validate_visible(visible)?;
    }
    if let Some(target) = &req.target {
        validate_target(target)?;
    }
    if let Some(category_id) = req.category {
        LinkRepository::find_category(&state.pool, category_id)
            .await?
            .ok_or_else(|| ApiError::InvalidParameter("友链分类不存在".to_string()))?;
    }
    LinkRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let link = LinkRepository::update(
        &state.pool,
        id,
        LinkChanges {
            name: req.name,
            url: req.url,
            description: req.description,
            category_id: req.category,
            visible: req.visible,
            sort_order: req.sort_order,
            target: req.target,
        },
    )
    .await?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_link(&link, &base_url)))
}

pub async fn delete_link(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    LinkRepository::find_by_id(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    LinkRepository::delete(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ---- 友链分类 ----

pub async fn list_link_categories(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<LinkCategoryView>>> {
    let categories = LinkRepository::list_categories(&state.pool).await?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(
        categories
            .iter()
            .map(|c| format::format_link_category(c, &base_url))
            .collect(),
    ))
}

pub async fn get_link_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<LinkCategoryView>> {
    let category = LinkRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_link_category(&category, &base_url)))
}

pub async fn create_link_category(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<LinkCategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::InvalidParameter("名称不能为空".to_string()))?;

    let category = LinkRepository::create_category(&state.pool, name, req.description.as_deref())
        .await
        .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok((
        StatusCode::CREATED,
        Json(format::format_link_category(&category, &base_url)),
    ))
}

pub async fn update_link_category(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<LinkCategoryRequest>,
) -> ApiResult<Json<LinkCategoryView>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    LinkRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let category = LinkRepository::update_category(&state.pool, id, req.name, req.description)
        .await
        .map_err(conflict_on_unique)?;

    let settings = state.settings.get(&state.pool).await;
    let base_url = state.base_url(&settings);
    Ok(Json(format::format_link_category(&category, &base_url)))
}

pub async fn delete_link_category(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    // 默认友链分类与默认文章分类一样受保护
    if id == DEFAULT_TERM_ID {
        return Err(ApiError::Forbidden);
    }
    LinkRepository::find_category(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    LinkRepository::delete_category(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
