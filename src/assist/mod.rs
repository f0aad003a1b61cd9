use async_trait::async_trait;
use serde_json::json;

use crate::config::Config;

pub type GenerateError = Box<dyn std::error::Error + Send + Sync>;

/// 可选的生成式文本能力，系统正确性不依赖任何具体后端
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// OpenAI兼容接口的实现，走chat completions协议
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    /// 未配置AI_API_URL时返回None，调用方走确定性降级
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_url = config.ai_api_url.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_url,
            api_key: config.ai_api_key.clone().unwrap_or_default(),
            model: config.ai_model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 120,
        });

        let mut request = self.client.post(&self.api_url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request.send().await?.error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(content)
    }
}

/// 确定性slug算法：小写、去首尾空白、滤掉非单词字符、
/// 空白和下划线折叠为单个连字符、去掉首尾连字符
pub fn slugify(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for c in lowered.chars() {
        if c.is_whitespace() || c == '_' {
            pending_sep = true;
        } else if c.is_ascii_alphanumeric() || c == '-' {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c);
        }
        // 其余字符直接丢弃，不产生分隔符
    }
    slug.trim_matches('-').to_string()
}

/// 确定性摘要：剥掉HTML标签、折叠空白、截断
pub fn fallback_excerpt(content: &str, max_chars: usize) -> String {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => text.push(c),
            _ => {}
        }
    }
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", truncated.trim_end())
    }
}

/// 生成slug：优先走生成式后端，结果为空或过短（<2字符）时
/// 必须落回确定性算法，后端失败只记日志
pub async fn suggest_slug(generator: Option<&dyn TextGenerator>, title: &str) -> String {
    if let Some(generator) = generator {
        let prompt = format!(
            "Generate a short URL slug (lowercase words joined by hyphens, no explanation) for this title: {}",
            title
        );
        match generator.generate(&prompt).await {
            Ok(raw) => {
                let candidate = slugify(&raw);
                if candidate.chars().count() >= 2 {
                    return candidate;
                }
            }
            Err(e) => {
                tracing::warn!("Slug generation failed, using fallback: {}", e);
            }
        }
    }
    slugify(title)
}

/// 生成摘要：后端不可用或失败时落回剥标签截断
pub async fn suggest_excerpt(generator: Option<&dyn TextGenerator>, content: &str) -> String {
    if let Some(generator) = generator {
        let prompt = format!(
            "Summarize the following article in one or two sentences, plain text only:\n\n{}",
            fallback_excerpt(content, 2000)
        );
        match generator.generate(&prompt).await {
            Ok(raw) => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
            Err(e) => {
                tracing::warn!("Excerpt generation failed, using fallback: {}", e);
            }
        }
    }
    fallback_excerpt(content, 200)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Hello   World  "), "hello-world");
        assert_eq!(slugify("Hello_World"), "hello-world");
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn slugify_edge_cases() {
        assert_eq!(slugify("---Already-Hyphenated---"), "already-hyphenated");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("Rust 2024 风格"), "rust-2024");
        assert_eq!(slugify("a__b  c"), "a-b-c");
    }

    #[test]
    fn excerpt_strips_tags_and_truncates() {
        let html = "<p>Hello <strong>world</strong>, this is a post.</p>";
        assert_eq!(fallback_excerpt(html, 200), "Hello world, this is a post.");

        let long = "word ".repeat(100);
        let excerpt = fallback_excerpt(&long, 20);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= 24);
    }

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Err("backend down".into())
        }
    }

    #[tokio::test]
    async fn slug_falls_back_when_generated_too_short() {
        let generator = FixedGenerator("x");
        let slug = suggest_slug(Some(&generator), "Hello World").await;
        assert_eq!(slug, "hello-world");
    }

    #[tokio::test]
    async fn slug_uses_generator_when_valid() {
        let generator = FixedGenerator("My Custom Slug");
        let slug = suggest_slug(Some(&generator), "Hello World").await;
        assert_eq!(slug, "my-custom-slug");
    }

    #[tokio::test]
    async fn slug_falls_back_on_generator_error() {
        let slug = suggest_slug(Some(&FailingGenerator), "Hello World").await;
        assert_eq!(slug, "hello-world");
    }

    #[tokio::test]
    async fn slug_deterministic_without_generator() {
        assert_eq!(suggest_slug(None, "Hello World").await, "hello-world");
    }
}
