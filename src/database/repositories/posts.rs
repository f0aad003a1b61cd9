use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::entities::post::{Post, STATUS_PUBLISH, STATUS_TRASH};

/// 列表查询的类型化过滤器，统一翻译成参数化谓词
#[derive(Debug, Clone, Default)]
pub struct PostListFilter {
    pub post_type: String,
    /// None时公开访问者只看publish，管理视角看除trash外全部
    pub status: Option<String>,
    pub author: Option<i64>,
    pub category: Option<i64>,
    pub tag: Option<i64>,
    pub search: Option<String>,
    pub slug: Option<String>,
    /// 是否拥有管理视角（可见非公开状态）
    pub privileged: bool,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug)]
pub struct NewPost {
    pub post_type: String,
    pub title: String,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: String,
    pub status: String,
    pub author_id: i64,
    pub parent_id: i64,
    pub featured_media_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub comment_status: String,
}

/// 部分更新变更集，None保持原值
#[derive(Debug, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub parent_id: Option<i64>,
    pub featured_media_id: Option<i64>,
    pub featured_image_url: Option<String>,
    pub comment_status: Option<String>,
}

const POST_COLUMNS: &str = "id, post_type, title, content, excerpt, slug, status, author_id, \
     parent_id, featured_media_id, featured_image_url, comment_status, comment_count, \
     view_count, created_at, updated_at, published_at";

/// 文章/页面存储库
pub struct PostRepository;

impl PostRepository {
    pub async fn insert(pool: &PgPool, new: NewPost) -> Result<Post, sqlx::Error> {
        // 首次直接以publish创建时published_at立即生效
        let published_at: Option<DateTime<Utc>> = if new.status == STATUS_PUBLISH {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts (post_type, title, content, excerpt, slug, status, author_id, \
                 parent_id, featured_media_id, featured_image_url, comment_status, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(new.post_type)
        .bind(new.title)
        .bind(new.content)
        .bind(new.excerpt)
        .bind(new.slug)
        .bind(new.status)
        .bind(new.author_id)
        .bind(new.parent_id)
        .bind(new.featured_media_id)
        .bind(new.featured_image_url)
        .bind(new.comment_status)
        .bind(published_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        post_type: &str,
        id: i64,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND post_type = $2"
        ))
        .bind(id)
        .bind(post_type)
        .fetch_optional(pool)
        .await
    }

    pub async fn slug_exists(
        pool: &PgPool,
        slug: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM posts WHERE slug = $1 AND ($2::bigint IS NULL OR id <> $2)",
        )
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// 碰撞时追加-1、-2…直到唯一；循环受现有行数约束必然终止，
    /// 最终仍以存储层唯一约束为准
    pub async fn unique_slug(
        pool: &PgPool,
        base: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, sqlx::Error> {
        let base = if base.is_empty() { "post" } else { base };
        if !Self::slug_exists(pool, base, exclude_id).await? {
            return Ok(base.to_string());
        }

        let bound = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await?
            + 2;
        for i in 1..=bound {
            let candidate = format!("{}-{}", base, i);
            if !Self::slug_exists(pool, &candidate, exclude_id).await? {
                return Ok(candidate);
            }
        }
        // 理论上到不了这里，交给唯一约束做最终裁决
        Ok(format!("{}-{}", base, bound + 1))
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &PostListFilter) {
        qb.push(" WHERE post_type = ").push_bind(filter.post_type.clone());

        match &filter.status {
            Some(status) => {
                qb.push(" AND status = ").push_bind(status.clone());
            }
            None if filter.privileged => {
                qb.push(" AND status <> ").push_bind(STATUS_TRASH);
            }
            None => {
                qb.push(" AND status = ").push_bind(STATUS_PUBLISH);
            }
        }

        if let Some(author) = filter.author {
            qb.push(" AND author_id = ").push_bind(author);
        }
        if let Some(category) = filter.category {
            qb.push(" AND id IN (SELECT post_id FROM post_categories WHERE category_id = ")
                .push_bind(category)
                .push(")");
        }
        if let Some(tag) = filter.tag {
            qb.push(" AND id IN (SELECT post_id FROM post_tags WHERE tag_id = ")
                .push_bind(tag)
                .push(")");
        }
        if let Some(slug) = &filter.slug {
            qb.push(" AND slug = ").push_bind(slug.clone());
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR content ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    pub async fn list(
        pool: &PgPool,
        filter: &PostListFilter,
    ) -> Result<(Vec<Post>, i64), sqlx::Error> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts");
        Self::push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.per_page)
            .push(" OFFSET ")
            .push_bind((filter.page - 1) * filter.per_page);
        let posts = qb.build_query_as::<Post>().fetch_all(pool).await?;

        Ok((posts, total))
    }

    /// 部分更新；published_at只在首次转为publish时写入一次
    pub async fn update(
        pool: &PgPool,
        id: i64,
        changes: PostChanges,
    ) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET \
                title = COALESCE($2, title), \
                content = COALESCE($3, content), \
                excerpt = COALESCE($4, excerpt), \
                slug = COALESCE($5, slug), \
                status = COALESCE($6, status), \
                parent_id = COALESCE($7, parent_id), \
                featured_media_id = COALESCE($8, featured_media_id), \
                featured_image_url = COALESCE($9, featured_image_url), \
                comment_status = COALESCE($10, comment_status), \
                published_at = CASE \
                    WHEN published_at IS NULL AND COALESCE($6, status) = 'publish' THEN NOW() \
                    ELSE published_at END, \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.excerpt)
        .bind(changes.slug)
        .bind(changes.status)
        .bind(changes.parent_id)
        .bind(changes.featured_media_id)
        .bind(changes.featured_image_url)
        .bind(changes.comment_status)
        .fetch_one(pool)
        .await
    }

    /// 软删除：移入回收站
    pub async fn trash(pool: &PgPool, id: i64) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET status = 'trash', updated_at = NOW() WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// 硬删除，连同分类/标签挂载一起清理并回补计数
    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "UPDATE categories SET count = count - 1 \
             WHERE id IN (SELECT category_id FROM post_categories WHERE post_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE tags SET count = count - 1 \
             WHERE id IN (SELECT tag_id FROM post_tags WHERE post_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    pub async fn increment_view(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// 评论数按已批准评论重算，不做增量维护
    pub async fn refresh_comment_count(pool: &PgPool, post_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE posts SET comment_count = \
                 (SELECT COUNT(*) FROM comments WHERE post_id = $1 AND status = 'approved') \
             WHERE id = $1",
        )
        .bind(post_id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
