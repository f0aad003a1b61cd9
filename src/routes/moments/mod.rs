mod handler;
mod model;

pub use handler::{
    create_moment, delete_moment, get_moment, like_moment, list_moments, update_moment,
};
