use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::config::Config;
use crate::database::repositories::settings::SettingsRepository;

/// 可注入的时钟，测试时用它模拟TTL过期
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CachedSettings {
    fetched_at: DateTime<Utc>,
    values: HashMap<String, String>,
}

/// 站点设置的进程内TTL缓存，写设置时显式失效
///
/// 并发刷新允许竞争，缓存槽位后写覆盖先写，不需要额外锁协议
pub struct SettingsCache {
    defaults: HashMap<String, String>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<CachedSettings>>,
}

pub const SETTINGS_TTL_SECS: i64 = 60;

impl SettingsCache {
    pub fn new(defaults: HashMap<String, String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            defaults,
            ttl: Duration::seconds(SETTINGS_TTL_SECS),
            clock,
            slot: RwLock::new(None),
        }
    }

    /// 基于环境配置构造默认设置表，保证必需键总有值
    pub fn defaults_from_config(config: &Config) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("site_title".to_string(), config.site_title.clone());
        map.insert("site_description".to_string(), String::new());
        map.insert("site_url".to_string(), config.site_url.clone());
        map.insert("admin_email".to_string(), config.admin_email.clone());
        map.insert("posts_per_page".to_string(), "10".to_string());
        map.insert("webhook_url".to_string(), String::new());
        map.insert("webhook_secret".to_string(), String::new());
        map.insert("webhook_events".to_string(), String::new());
        map
    }

    fn cached(&self) -> Option<HashMap<String, String>> {
        let slot = self.slot.read().ok()?;
        let cached = slot.as_ref()?;
        if self.clock.now() - cached.fetched_at < self.ttl {
            Some(cached.values.clone())
        } else {
            None
        }
    }

    fn store(&self, values: HashMap<String, String>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(CachedSettings {
                fetched_at: self.clock.now(),
                values,
            });
        }
    }

    /// 读取设置：缓存未过期直接返回，否则查库并合并默认值
    /// 查库失败时降级为默认值，设置读取永远不会让其它请求失败
    pub async fn get(&self, pool: &PgPool) -> HashMap<String, String> {
        if let Some(values) = self.cached() {
            return values;
        }

        let mut values = self.defaults.clone();
        match SettingsRepository::fetch_all(pool).await {
            Ok(rows) => {
                for (key, value) in rows {
                    values.insert(key, value);
                }
                self.store(values.clone());
            }
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {:?}", e);
            }
        }
        values
    }

    /// 任何设置写入后无条件失效
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        fn advance(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now = *now + Duration::seconds(secs);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn sample() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("site_title".to_string(), "Cached".to_string());
        map
    }

    #[test]
    fn cache_hit_within_ttl() {
        let clock = Arc::new(FakeClock::new());
        let cache = SettingsCache::new(HashMap::new(), clock.clone());

        cache.store(sample());
        clock.advance(SETTINGS_TTL_SECS - 1);
        let values = cache.cached().expect("still fresh");
        assert_eq!(values.get("site_title").unwrap(), "Cached");
    }

    #[test]
    fn cache_expires_after_ttl() {
        let clock = Arc::new(FakeClock::new());
        let cache = SettingsCache::new(HashMap::new(), clock.clone());

        cache.store(sample());
        clock.advance(SETTINGS_TTL_SECS + 1);
        assert!(cache.cached().is_none());
    }

    #[test]
    fn invalidate_clears_slot() {
        let clock = Arc::new(FakeClock::new());
        let cache = SettingsCache::new(HashMap::new(), clock);

        cache.store(sample());
        cache.invalidate();
        assert!(cache.cached().is_none());
    }

    #[test]
    fn defaults_always_carry_required_keys() {
        let config = crate::config::Config {
            database_url: "postgres://localhost/test".into(),
            jwt_secret: "s".into(),
            jwt_expiration_secs: 3600,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            site_title: "Test Site".into(),
            site_url: "http://localhost:3000".into(),
            admin_email: "admin@example.com".into(),
            upload_dir: "uploads".into(),
            ai_api_url: None,
            ai_api_key: None,
            ai_model: "gpt-4o-mini".into(),
        };
        let defaults = SettingsCache::defaults_from_config(&config);
        for key in ["site_title", "site_url", "admin_email", "webhook_events"] {
            assert!(defaults.contains_key(key), "missing {}", key);
        }
        assert_eq!(defaults.get("site_title").unwrap(), "Test Site");
    }
}
