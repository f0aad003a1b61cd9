mod handler;

pub use handler::{create_tag, delete_tag, get_tag, list_tags, update_tag};
