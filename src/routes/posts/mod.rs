mod handler;
mod model;

pub use handler::{
    create_page, create_post, delete_page, delete_post, get_page, get_post, list_pages,
    list_posts, update_page, update_post,
};
