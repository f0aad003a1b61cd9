pub mod categories;
pub mod comments;
pub mod links;
pub mod media;
pub mod moments;
pub mod posts;
pub mod settings;
pub mod tags;
pub mod users;
