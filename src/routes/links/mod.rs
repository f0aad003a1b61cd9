mod handler;
mod model;

pub use handler::{
    create_link, create_link_category, delete_link, delete_link_category, get_link,
    get_link_category, list_link_categories, list_links, update_link, update_link_category,
};
