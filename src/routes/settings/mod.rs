mod handler;

pub use handler::{get_admin_settings, get_settings, update_settings};
