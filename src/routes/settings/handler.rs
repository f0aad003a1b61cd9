use std::collections::HashMap;

use axum::{
    Json,
    extract::{Extension, State},
};

use crate::{
    AppState,
    auth::{Identity, permissions::can_manage_site},
    database::repositories::settings::SettingsRepository,
    error::{ApiError, ApiResult},
    format,
    webhook::events,
};

/// 公开设置视图，秘密类键已剔除
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<HashMap<String, String>>> {
    let settings = state.settings.get(&state.pool).await;
    Ok(Json(format::format_settings(&settings, false)))
}

pub async fn get_admin_settings(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> ApiResult<Json<HashMap<String, String>>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    let settings = state.settings.get(&state.pool).await;
    Ok(Json(format::format_settings(&settings, true)))
}

pub async fn update_settings(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(values): Json<HashMap<String, String>>,
) -> ApiResult<Json<HashMap<String, String>>> {
    if !can_manage_site(identity.role) {
        return Err(ApiError::Forbidden);
    }
    if values.is_empty() {
        return Err(ApiError::InvalidParameter("设置不能为空".to_string()));
    }

    SettingsRepository::upsert_many(&state.pool, &values).await?;
    state.settings.invalidate();

    // 写入后重新读取，保证响应反映合并默认值之后的完整视图
    let settings = state.settings.get(&state.pool).await;
    state.notifier.fire(
        &settings,
        events::SETTINGS_UPDATED,
        serde_json::json!({ "changed_keys": values.keys().collect::<Vec<_>>() }),
    );

    Ok(Json(format::format_settings(&settings, true)))
}
