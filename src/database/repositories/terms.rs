use sqlx::PgPool;

use crate::database::entities::term::{Category, DEFAULT_TERM_ID, Tag};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, count";
const TAG_COLUMNS: &str = "id, name, slug, description, count";

#[derive(Debug, Default)]
pub struct TermChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// 分类/标签存储库，包括文章挂载关系与反范式计数维护
pub struct TermRepository;

impl TermRepository {
    pub async fn create_category(
        pool: &PgPool,
        name: &str,
        slug: &str,
        description: Option<&str>,
        parent_id: i64,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (name, slug, description, parent_id) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name)
        .bind(slug)
        .bind(description)
        .bind(parent_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_category(pool: &PgPool, id: i64) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_categories(
        pool: &PgPool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Category>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
            .fetch_one(pool)
            .await?;
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((categories, total))
    }

    pub async fn update_category(
        pool: &PgPool,
        id: i64,
        changes: TermChanges,
    ) -> Result<Category, sqlx::Error> {
        sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET \
                name = COALESCE($2, name), \
                slug = COALESCE($3, slug), \
                description = COALESCE($4, description), \
                parent_id = COALESCE($5, parent_id) \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.slug)
        .bind(changes.description)
        .bind(changes.parent_id)
        .fetch_one(pool)
        .await
    }

    /// 删除分类（id=1的默认分类由handler层拒绝），挂载过的文章回落到默认分类
    pub async fn delete_category(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // 被删分类下的文章改挂默认分类，避免文章失去分类
        sqlx::query(
            "INSERT INTO post_categories (post_id, category_id) \
             SELECT post_id, $2 FROM post_categories WHERE category_id = $1 \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(DEFAULT_TERM_ID)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE categories SET count = (SELECT COUNT(*) FROM post_categories WHERE category_id = $1) \
             WHERE id = $1",
        )
        .bind(DEFAULT_TERM_ID)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM post_categories WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn create_tag(
        pool: &PgPool,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> Result<Tag, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "INSERT INTO tags (name, slug, description) VALUES ($1, $2, $3) \
             RETURNING {TAG_COLUMNS}"
        ))
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(pool)
        .await
    }

    pub async fn find_tag(pool: &PgPool, id: i64) -> Result<Option<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_tags(
        pool: &PgPool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Tag>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags")
            .fetch_one(pool)
            .await?;
        let tags = sqlx::query_as::<_, Tag>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags ORDER BY name ASC LIMIT $1 OFFSET $2"
        ))
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((tags, total))
    }

    pub async fn update_tag(
        pool: &PgPool,
        id: i64,
        changes: TermChanges,
    ) -> Result<Tag, sqlx::Error> {
        sqlx::query_as::<_, Tag>(&format!(
            "UPDATE tags SET \
                name = COALESCE($2, name), \
                slug = COALESCE($3, slug), \
                description = COALESCE($4, description) \
             WHERE id = $1 RETURNING {TAG_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.slug)
        .bind(changes.description)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_tag(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM post_tags WHERE tag_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn category_ids_of_post(
        pool: &PgPool,
        post_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM post_categories WHERE post_id = $1 ORDER BY category_id",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
    }

    pub async fn tag_ids_of_post(pool: &PgPool, post_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT tag_id FROM post_tags WHERE post_id = $1 ORDER BY tag_id",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await
    }

    /// 整体替换文章的分类集合。两遍处理而不是求差集：
    /// 先对旧集合全部减计数并清空挂载，再写入新集合并全部加计数，
    /// 保证count始终等于当前挂载数。整个过程在一个事务里
    pub async fn set_post_categories(
        pool: &PgPool,
        post_id: i64,
        category_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE categories SET count = count - 1 \
             WHERE id IN (SELECT category_id FROM post_categories WHERE post_id = $1)",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        for category_id in category_ids {
            sqlx::query(
                "INSERT INTO post_categories (post_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE categories SET count = count + 1 WHERE id = $1")
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// 同set_post_categories，作用于标签
    pub async fn set_post_tags(
        pool: &PgPool,
        post_id: i64,
        tag_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE tags SET count = count - 1 \
             WHERE id IN (SELECT tag_id FROM post_tags WHERE post_id = $1)",
        )
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE tags SET count = count + 1 WHERE id = $1")
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
