use sqlx::PgPool;

use crate::database::entities::media::Media;

const MEDIA_COLUMNS: &str = "id, title, filename, file_type, file_size, mime_type, storage_key, \
     url, alt_text, caption, description, width, height, author_id, created_at";

#[derive(Debug)]
pub struct NewMedia {
    pub title: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_key: String,
    pub url: String,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub author_id: i64,
}

#[derive(Debug, Default)]
pub struct MediaChanges {
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
}

/// 媒体库存储库，只管元数据行，文件本体在对象存储
pub struct MediaRepository;

impl MediaRepository {
    pub async fn insert(pool: &PgPool, new: NewMedia) -> Result<Media, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "INSERT INTO media (title, filename, file_type, file_size, mime_type, storage_key, \
                 url, alt_text, caption, description, width, height, author_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(new.title)
        .bind(new.filename)
        .bind(new.file_type)
        .bind(new.file_size)
        .bind(new.mime_type)
        .bind(new.storage_key)
        .bind(new.url)
        .bind(new.alt_text)
        .bind(new.caption)
        .bind(new.description)
        .bind(new.width)
        .bind(new.height)
        .bind(new.author_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Media>, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        file_type: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Media>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM media WHERE ($1::text IS NULL OR file_type = $1)",
        )
        .bind(file_type)
        .fetch_one(pool)
        .await?;
        let media = sqlx::query_as::<_, Media>(&format!(
            "SELECT {MEDIA_COLUMNS} FROM media WHERE ($1::text IS NULL OR file_type = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(file_type)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((media, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: MediaChanges,
    ) -> Result<Media, sqlx::Error> {
        sqlx::query_as::<_, Media>(&format!(
            "UPDATE media SET \
                title = COALESCE($2, title), \
                alt_text = COALESCE($3, alt_text), \
                caption = COALESCE($4, caption), \
                description = COALESCE($5, description) \
             WHERE id = $1 RETURNING {MEDIA_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.alt_text)
        .bind(changes.caption)
        .bind(changes.description)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
