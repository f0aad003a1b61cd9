mod handler;
mod model;

pub use handler::{create_comment, delete_comment, get_comment, list_comments, update_comment};
