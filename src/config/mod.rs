use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub site_title: String,
    pub site_url: String,
    pub admin_email: String,
    pub upload_dir: String,
    pub ai_api_url: Option<String>,
    pub ai_api_key: Option<String>,
    pub ai_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // 令牌有效期按天配置，默认7天
        let jwt_expiration_days = env::var("JWT_EXPIRATION")
            .unwrap_or_else(|_| "7".into())
            .trim_end_matches('d')
            .parse::<u64>()
            .unwrap_or(7);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration_days * 24 * 3600,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()
                .unwrap_or(3000),
            site_title: env::var("SITE_TITLE").unwrap_or_else(|_| "My Blog".into()),
            site_url: env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()),
            ai_api_url: env::var("AI_API_URL").ok().filter(|s| !s.is_empty()),
            ai_api_key: env::var("AI_API_KEY").ok().filter(|s| !s.is_empty()),
            ai_model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }
}
