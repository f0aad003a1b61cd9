use std::collections::HashMap;

use sqlx::PgPool;

/// 站点设置存储库，扁平的key/value表
pub struct SettingsRepository;

impl SettingsRepository {
    pub async fn fetch_all(pool: &PgPool) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as::<_, (String, String)>("SELECT key, value FROM settings")
            .fetch_all(pool)
            .await
    }

    pub async fn upsert_many(
        pool: &PgPool,
        values: &HashMap<String, String>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
