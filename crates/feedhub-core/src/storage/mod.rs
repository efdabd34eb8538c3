mod article_repo;
mod database;
mod external_api_repo;
mod feed_repo;
mod link_repo;
mod task_repo;
mod user_repo;

pub use article_repo::ArticleRepository;
pub use database::Database;
pub use external_api_repo::ExternalApiRepository;
pub use feed_repo::FeedRepository;
pub use link_repo::FeedArticleRepository;
pub use task_repo::TaskRepository;
pub use user_repo::UserRepository;
