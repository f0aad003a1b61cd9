use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub mod events {
    pub const POST_CREATED: &str = "post.created";
    pub const POST_UPDATED: &str = "post.updated";
    pub const POST_PUBLISHED: &str = "post.published";
    pub const POST_DELETED: &str = "post.deleted";
    pub const CATEGORY_CREATED: &str = "category.created";
    pub const CATEGORY_UPDATED: &str = "category.updated";
    pub const CATEGORY_DELETED: &str = "category.deleted";
    pub const TAG_CREATED: &str = "tag.created";
    pub const TAG_UPDATED: &str = "tag.updated";
    pub const TAG_DELETED: &str = "tag.deleted";
    pub const COMMENT_CREATED: &str = "comment.created";
    pub const COMMENT_UPDATED: &str = "comment.updated";
    pub const COMMENT_DELETED: &str = "comment.deleted";
    pub const SETTINGS_UPDATED: &str = "settings.updated";
}

/// 文章创建时的事件选择：直接以publish创建只发post.published一条
pub fn post_create_event(status: &str) -> &'static str {
    if status == "publish" {
        events::POST_PUBLISHED
    } else {
        events::POST_CREATED
    }
}

/// 文章更新时的事件选择：非publish到publish的转换发post.published，其余发post.updated
pub fn post_update_event(old_status: &str, new_status: &str) -> &'static str {
    if old_status != "publish" && new_status == "publish" {
        events::POST_PUBLISHED
    } else {
        events::POST_UPDATED
    }
}

/// 出站webhook通知器，挂掉也不影响触发它的API请求
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// 双重门控：必须配置了webhook_url，且事件名在webhook_events白名单内
    /// 白名单为空时即使配置了URL也不发送
    fn target_url(settings: &HashMap<String, String>, event: &str) -> Option<String> {
        let url = settings.get("webhook_url").map(|s| s.trim()).unwrap_or("");
        if url.is_empty() {
            return None;
        }
        let allowed = settings
            .get("webhook_events")
            .map(|s| s.as_str())
            .unwrap_or("");
        let enabled = allowed
            .split(',')
            .map(|e| e.trim())
            .any(|e| !e.is_empty() && e == event);
        if enabled { Some(url.to_string()) } else { None }
    }

    fn sign(secret: &str, body: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body.as_bytes());
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// 发送事件，网络错误和非2xx仅记日志，永不向调用方传播
    pub fn fire(&self, settings: &HashMap<String, String>, event: &str, payload: serde_json::Value) {
        let Some(url) = Self::target_url(settings, event) else {
            return;
        };

        let envelope = json!({
            "event": event,
            "timestamp": Utc::now().to_rfc3339(),
            "payload": payload,
            "site_url": settings.get("site_url").cloned().unwrap_or_default(),
        });
        let body = envelope.to_string();

        let secret = settings.get("webhook_secret").cloned().unwrap_or_default();
        let client = self.client.clone();
        let event = event.to_string();

        tokio::spawn(async move {
            let mut request = client
                .post(&url)
                .header("Content-Type", "application/json");
            if !secret.is_empty() {
                request = request.header("X-Webhook-Signature", Self::sign(&secret, &body));
            }
            match request.body(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("Webhook {} delivered", event);
                }
                Ok(resp) => {
                    tracing::warn!("Webhook {} got status {}", event, resp.status());
                }
                Err(e) => {
                    tracing::warn!("Webhook {} delivery failed: {}", event, e);
                }
            }
        });
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str, events: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("webhook_url".to_string(), url.to_string());
        map.insert("webhook_events".to_string(), events.to_string());
        map
    }

    #[test]
    fn gated_by_url_and_allow_list() {
        // 没有URL不发
        let s = settings("", "post.created");
        assert!(WebhookNotifier::target_url(&s, "post.created").is_none());

        // 白名单为空不发
        let s = settings("https://hooks.example.com", "");
        assert!(WebhookNotifier::target_url(&s, "post.created").is_none());

        // 不在白名单不发
        let s = settings("https://hooks.example.com", "post.created, tag.created");
        assert!(WebhookNotifier::target_url(&s, "post.deleted").is_none());

        // 两个条件都满足才发
        assert_eq!(
            WebhookNotifier::target_url(&s, "post.created").as_deref(),
            Some("https://hooks.example.com")
        );
        assert_eq!(
            WebhookNotifier::target_url(&s, "tag.created").as_deref(),
            Some("https://hooks.example.com")
        );
    }

    #[test]
    fn single_fire_event_selection() {
        assert_eq!(post_create_event("publish"), events::POST_PUBLISHED);
        assert_eq!(post_create_event("draft"), events::POST_CREATED);
        assert_eq!(post_update_event("draft", "publish"), events::POST_PUBLISHED);
        assert_eq!(post_update_event("pending", "publish"), events::POST_PUBLISHED);
        assert_eq!(post_update_event("publish", "publish"), events::POST_UPDATED);
        assert_eq!(post_update_event("publish", "draft"), events::POST_UPDATED);
        assert_eq!(post_update_event("draft", "draft"), events::POST_UPDATED);
    }

    #[test]
    fn signature_is_stable_hex() {
        let sig = WebhookNotifier::sign("secret", r#"{"event":"post.created"}"#);
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        // 同样的输入必须得到同样的签名
        assert_eq!(sig, WebhookNotifier::sign("secret", r#"{"event":"post.created"}"#));
        assert_ne!(sig, WebhookNotifier::sign("other", r#"{"event":"post.created"}"#));
    }
}
