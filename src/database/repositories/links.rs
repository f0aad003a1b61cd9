use sqlx::PgPool;

use crate::database::entities::link::{Link, LinkCategory};

const LINK_COLUMNS: &str =
    "id, name, url, description, category_id, visible, sort_order, target, created_at";
const LINK_CATEGORY_COLUMNS: &str = "id, name, description, count";

#[derive(Debug)]
pub struct NewLink {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub visible: String,
    pub sort_order: i32,
    pub target: String,
}

#[derive(Debug, Default)]
pub struct LinkChanges {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub visible: Option<String>,
    pub sort_order: Option<i32>,
    pub target: Option<String>,
}

/// 友情链接及其分类存储库
pub struct LinkRepository;

impl LinkRepository {
    /// 创建链接并同步分类计数
    pub async fn insert(pool: &PgPool, new: NewLink) -> Result<Link, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let link = sqlx::query_as::<_, Link>(&format!(
            "INSERT INTO links (name, url, description, category_id, visible, sort_order, target) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {LINK_COLUMNS}"
        ))
        .bind(new.name)
        .bind(new.url)
        .bind(new.description)
        .bind(new.category_id)
        .bind(new.visible)
        .bind(new.sort_order)
        .bind(new.target)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE link_categories SET count = count + 1 WHERE id = $1")
            .bind(link.category_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(link)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Link>, sqlx::Error> {
        sqlx::query_as::<_, Link>(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// visible_only用于公开访问，只返回visible=yes的链接
    pub async fn list(
        pool: &PgPool,
        visible_only: bool,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Link>, i64), sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM links WHERE (NOT $1 OR visible = 'yes')",
        )
        .bind(visible_only)
        .fetch_one(pool)
        .await?;
        let links = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE (NOT $1 OR visible = 'yes') \
             ORDER BY sort_order ASC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(visible_only)
        .bind(per_page)
        .bind((page - 1) * per_page)
        .fetch_all(pool)
        .await?;
        Ok((links, total))
    }

    /// 部分更新；换分类时旧减新增，放在同一事务里
    pub async fn update(pool: &PgPool, id: i64, changes: LinkChanges) -> Result<Link, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let old_category: i64 =
            sqlx::query_scalar::<_, i64>("SELECT category_id FROM links WHERE id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let link = sqlx::query_as::<_, Link>(&format!(
            "UPDATE links SET \
                name = COALESCE($2, name), \
                url = COALESCE($3, url), \
                description = COALESCE($4, description), \
                category_id = COALESCE($5, category_id), \
                visible = COALESCE($6, visible), \
                sort_order = COALESCE($7, sort_order), \
                target = COALESCE($8, target) \
             WHERE id = $1 RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.url)
        .bind(changes.description)
        .bind(changes.category_id)
        .bind(changes.visible)
        .bind(changes.sort_order)
        .bind(changes.target)
        .fetch_one(&mut *tx)
        .await?;

        if link.category_id != old_category {
            sqlx::query("UPDATE link_categories SET count = count - 1 WHERE id = $1")
                .bind(old_category)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE link_categories SET count = count + 1 WHERE id = $1")
                .bind(link.category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(link)
    }

    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE link_categories SET count = count - 1 \
             WHERE id = (SELECT category_id FROM links WHERE id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let result = sqlx::query("DELETE FROM links WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn create_category(
        pool: &PgPool,
        name: &str,
        description: Option<&str>,
    ) -> Result<LinkCategory, sqlx::Error> {
        sqlx::query_as::<_, LinkCategory>(&format!(
            "INSERT INTO link_categories (name, description) VALUES ($1, $2) \
             RETURNING {LINK_CATEGORY_COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await
    }

    pub async fn find_category(
        pool: &PgPool,
        id: i64,
    ) -> Result<Option<LinkCategory>, sqlx::Error> {
        sqlx::query_as::<_, LinkCategory>(&format!(
            "SELECT {LINK_CATEGORY_COLUMNS} FROM link_categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_categories(pool: &PgPool) -> Result<Vec<LinkCategory>, sqlx::Error> {
        sqlx::query_as::<_, LinkCategory>(&format!(
            "SELECT {LINK_CATEGORY_COLUMNS} FROM link_categories ORDER BY id ASC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn update_category(
        pool: &PgPool,
        id: i64,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<LinkCategory, sqlx::Error> {
        sqlx::query_as::<_, LinkCategory>(&format!(
            "UPDATE link_categories SET \
                name = COALESCE($2, name), \
                description = COALESCE($3, description) \
             WHERE id = $1 RETURNING {LINK_CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await
    }

    /// 删除友链分类（默认分类由handler拒绝），其下链接移入默认分类
    pub async fn delete_category(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let moved = sqlx::query("UPDATE links SET category_id = 1 WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE link_categories SET count = count + $1 WHERE id = 1")
            .bind(moved.rows_affected() as i64)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM link_categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
