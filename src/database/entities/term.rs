use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 分类，id=1是受保护的默认分类（未分类），不可删除
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: i64,
    /// 反范式的挂载数，随文章分类变更事务性维护
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub count: i64,
}

/// 默认分类与默认友链分类共用的保护ID
pub const DEFAULT_TERM_ID: i64 = 1;
