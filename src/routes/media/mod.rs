mod handler;
mod model;

pub use handler::{delete_media, get_media, list_media, update_media, upload_media};
