use sqlx::PgPool;

use crate::database::entities::moment::Moment;

const MOMENT_COLUMNS: &str = "id, content, author_id, status, media_urls, view_count, \
     like_count, comment_count, created_at, updated_at";

#[derive(Debug, Default)]
pub struct MomentChanges {
    pub content: Option<String>,
    pub status: Option<String>,
    /// JSON编码后的URL数组
    pub media_urls: Option<String>,
}

/// 说说存储库
pub struct MomentRepository;

impl MomentRepository {
    pub async fn insert(
        pool: &PgPool,
        content: &str,
        author_id: i64,
        status: &str,
        media_urls: &str,
    ) -> Result<Moment, sqlx::Error> {
        sqlx::query_as::<_, Moment>(&format!(
            "INSERT INTO moments (content, author_id, status, media_urls) \
             VALUES ($1, $2, $3, $4) RETURNING {MOMENT_COLUMNS}"
        ))
        .bind(content)
        .bind(author_id)
        .bind(status)
        .bind(media_urls)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Moment>, sqlx::Error> {
        sqlx::query_as::<_, Moment>(&format!(
            "SELECT {MOMENT_COLUMNS} FROM moments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        privileged: bool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Moment>, i64), sqlx::Error> {
        // 公开访问只看publish，管理视角看除trash外全部
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM moments \
             WHERE (($1 AND status <> 'trash') OR (NOT $1 AND status = 'publish'))",
        )
        .bind(privileged)
        .fetch_one(pool)
        .await?;
        let moments = sqlx::query_as::<_, Moment>(&format!(
            "SELECT {MOMENT_COLUMNS} FROM moments \
             WHERE (($1 AND status <> 'trash') OR (NOT $1 AND status = 'publish')) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(privileged)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((moments, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: MomentChanges,
    ) -> Result<Moment, sqlx::Error> {
        sqlx::query_as::<_, Moment>(&format!(
            "UPDATE moments SET \
                content = COALESCE($2, content), \
                status = COALESCE($3, status), \
                media_urls = COALESCE($4, media_urls), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {MOMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.content)
        .bind(changes.status)
        .bind(changes.media_urls)
        .fetch_one(pool)
        .await
    }

    pub async fn trash(pool: &PgPool, id: i64) -> Result<Moment, sqlx::Error> {
        sqlx::query_as::<_, Moment>(&format!(
            "UPDATE moments SET status = 'trash', updated_at = NOW() WHERE id = $1 \
             RETURNING {MOMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM moments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn increment_view(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE moments SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn increment_like(pool: &PgPool, id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE moments SET like_count = like_count + 1 WHERE id = $1 RETURNING like_count",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
