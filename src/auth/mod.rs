use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub mod permissions;

pub use permissions::Role;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,         // 用户ID
    pub username: String, // 用户名
    pub email: String,    // 邮箱
    pub role: Role,       // 角色
    pub exp: i64,         // 过期时间
    pub iat: i64,         // 签发时间
}

/// 请求上下文中的已认证身份，由认证中间件写入request extension
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.sub,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

pub fn generate_token(
    user_id: i64,
    username: &str,
    email: &str,
    role: Role,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::seconds(config.jwt_expiration().as_secs() as i64))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        email: email.to_string(),
        role,
        exp: expiration,
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// 校验令牌，无效/过期一律返回None，不向调用方抛异常
pub fn verify_token(token: &str, config: &Config) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            jwt_secret: "test-secret".into(),
            jwt_expiration_secs: 7 * 24 * 3600,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            site_title: "Test".into(),
            site_url: "http://localhost:3000".into(),
            admin_email: "admin@example.com".into(),
            upload_dir: "uploads".into(),
            ai_api_url: None,
            ai_api_key: None,
            ai_model: "gpt-4o-mini".into(),
        }
    }

    #[test]
    fn token_round_trip() {
        let config = test_config();
        let token =
            generate_token(42, "alice", "alice@example.com", Role::Editor, &config).unwrap();
        let claims = verify_token(&token, &config).expect("token should verify");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Editor);
    }

    #[test]
    fn tampered_token_rejected() {
        let config = test_config();
        let token = generate_token(1, "a", "a@b.c", Role::Subscriber, &config).unwrap();
        assert!(verify_token(&format!("{}x", token), &config).is_none());

        let mut other = test_config();
        other.jwt_secret = "another-secret".into();
        assert!(verify_token(&token, &other).is_none());
    }

    #[test]
    fn password_hash_and_verify() {
        let hashed = hash_password("s3cret").unwrap();
        assert_ne!(hashed, "s3cret");
        assert!(verify_password("s3cret", &hashed).unwrap());
        assert!(!verify_password("wrong", &hashed).unwrap());
    }
}
