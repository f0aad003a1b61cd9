mod handler;
// 标签路由复用同一套请求模型
pub(crate) mod model;

pub use handler::{create_category, delete_category, get_category, list_categories, update_category};
