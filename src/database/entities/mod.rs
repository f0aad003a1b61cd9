pub mod comment;
pub mod link;
pub mod media;
pub mod moment;
pub mod post;
pub mod term;
pub mod user;
