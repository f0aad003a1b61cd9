use sqlx::PgPool;

use crate::auth::permissions::Role;
use crate::database::entities::user::User;

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, role, status, \
     registered_at, last_login, avatar_url, bio";

/// 用户部分更新的变更集，None表示保持原值
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

/// 用户存储库
pub struct UserRepository;

impl UserRepository {
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    /// 开放注册的默认角色：首个用户引导为管理员，其余为订阅者
    pub async fn registration_role(pool: &PgPool) -> Result<Role, sqlx::Error> {
        let count = Self::count(pool).await?;
        Ok(if count == 0 {
            Role::Administrator
        } else {
            Role::Subscriber
        })
    }

    /// 创建用户，角色由调用方决定（首个注册者引导为管理员）
    pub async fn create(
        pool: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        role: &str,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, display_name, role, status) \
             VALUES ($1, $2, $3, $4, $5, 'active') \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(role)
        .fetch_one(pool)
        .await?;

        tracing::info!("Created user {} with role {}", user.username, user.role);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// 登录入口允许用户名或邮箱
    pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $1"
        ))
        .bind(login)
        .fetch_optional(pool)
        .await
    }

    pub async fn username_or_email_taken(
        pool: &PgPool,
        username: &str,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2",
        )
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list(
        pool: &PgPool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let total = Self::count(pool).await?;
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY registered_at ASC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((users, total))
    }

    /// 部分更新：只覆盖提供的字段
    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: UserChanges,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET \
                email = COALESCE($2, email), \
                password_hash = COALESCE($3, password_hash), \
                display_name = COALESCE($4, display_name), \
                role = COALESCE($5, role), \
                status = COALESCE($6, status), \
                avatar_url = COALESCE($7, avatar_url), \
                bio = COALESCE($8, bio) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.display_name)
        .bind(changes.role)
        .bind(changes.status)
        .bind(changes.avatar_url)
        .bind(changes.bio)
        .fetch_one(pool)
        .await
    }

    pub async fn record_login(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn deactivate(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET status = 'inactive' WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
