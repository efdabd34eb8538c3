pub mod aggregate;
pub mod api;
pub mod articles;
pub mod feed;
pub mod serve;
pub mod status;
pub mod task;
pub mod user;
