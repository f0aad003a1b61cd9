use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use assist::TextGenerator;
use config::Config;
use settings::SettingsCache;
use storage::ObjectStore;
use webhook::WebhookNotifier;

pub mod assist;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod middleware;
pub mod routes;
pub mod settings;
pub mod storage;
pub mod webhook;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub settings: Arc<SettingsCache>,
    pub notifier: WebhookNotifier,
    pub store: Arc<dyn ObjectStore>,
    pub generator: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    /// 对外链接的基准URL，优先取站点设置，缺失时回落到环境配置
    pub fn base_url(&self, settings: &HashMap<String, String>) -> String {
        settings
            .get("site_url")
            .filter(|url| !url.is_empty())
            .cloned()
            .unwrap_or_else(|| self.config.site_url.clone())
    }

    pub fn generator_ref(&self) -> Option<&dyn TextGenerator> {
        self.generator.as_deref()
    }
}
