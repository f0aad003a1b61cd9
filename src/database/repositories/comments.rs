use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::database::entities::comment::{Comment, STATUS_APPROVED};

const COMMENT_COLUMNS: &str = "id, post_id, parent_id, author_name, author_email, author_url, \
     author_ip, content, status, user_id, created_at";

#[derive(Debug)]
pub struct NewComment {
    pub post_id: i64,
    pub parent_id: i64,
    pub author_name: String,
    pub author_email: Option<String>,
    pub author_url: Option<String>,
    pub author_ip: Option<String>,
    pub content: String,
    pub status: String,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentListFilter {
    pub post_id: Option<i64>,
    pub status: Option<String>,
    /// 非管理视角强制只看approved
    pub privileged: bool,
    pub page: i64,
    pub per_page: i64,
}

/// 评论存储库，parent_id=0为顶层，否则构成回复树
pub struct CommentRepository;

impl CommentRepository {
    pub async fn insert(pool: &PgPool, new: NewComment) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (post_id, parent_id, author_name, author_email, author_url, \
                 author_ip, content, status, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(new.post_id)
        .bind(new.parent_id)
        .bind(new.author_name)
        .bind(new.author_email)
        .bind(new.author_url)
        .bind(new.author_ip)
        .bind(new.content)
        .bind(new.status)
        .bind(new.user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &CommentListFilter) {
        qb.push(" WHERE 1 = 1");
        if let Some(post_id) = filter.post_id {
            qb.push(" AND post_id = ").push_bind(post_id);
        }
        match &filter.status {
            Some(status) if filter.privileged => {
                qb.push(" AND status = ").push_bind(status.clone());
            }
            _ if filter.privileged => {
                qb.push(" AND status <> 'trash'");
            }
            _ => {
                qb.push(" AND status = ").push_bind(STATUS_APPROVED);
            }
        }
    }

    pub async fn list(
        pool: &PgPool,
        filter: &CommentListFilter,
    ) -> Result<(Vec<Comment>, i64), sqlx::Error> {
        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM comments");
        Self::push_filters(&mut count_qb, filter);
        let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments"));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.per_page)
            .push(" OFFSET ")
            .push_bind((filter.page - 1) * filter.per_page);
        let comments = qb.build_query_as::<Comment>().fetch_all(pool).await?;

        Ok((comments, total))
    }

    pub async fn update(
        pool: &PgPool,
        id: i64,
        content: Option<String>,
        status: Option<String>,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET \
                content = COALESCE($2, content), \
                status = COALESCE($3, status) \
             WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(content)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn trash(pool: &PgPool, id: i64) -> Result<Comment, sqlx::Error> {
        sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET status = 'trash' WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(pool)
        .await
    }

    /// 整棵回复子树一并清除，不留悬空parent_id
    pub async fn delete(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "WITH RECURSIVE subtree AS ( \
                SELECT id FROM comments WHERE id = $1 \
                UNION ALL \
                SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id \
             ) \
             DELETE FROM comments WHERE id IN (SELECT id FROM subtree)",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
