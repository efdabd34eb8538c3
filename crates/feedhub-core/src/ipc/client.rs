//! IPC Client for connecting to daemon
//!
//! Provides a type-safe interface for communicating with the daemon.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::*;
use crate::model::{Article, ExternalApi, Feed, Pagination, Task};
use crate::provider::ProviderTag;
use crate::{Error, Result};

/// Client for communicating with the daemon
#[derive(Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Create a new daemon client
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if daemon is running by sending a ping
    pub async fn ping(&self) -> Result<bool> {
        match self.call(methods::PING, serde_json::Value::Null).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<StatusResponse> {
        let result = self.call(methods::STATUS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Register a new user account
    pub async fn signup(&self, email: &str, password: &str) -> Result<SignupResponse> {
        let params = serde_json::json!({
            "email": email,
            "password": password
        });
        let result = self.call(methods::USER_SIGNUP, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Create a new feed
    pub async fn create_feed(
        &self,
        user_id: i64,
        title: &str,
        url: Option<&str>,
        description: Option<&str>,
    ) -> Result<Feed> {
        let params = serde_json::json!({
            "user_id": user_id,
            "title": title,
            "url": url,
            "description": description
        });
        let result = self.call(methods::FEED_CREATE, params).await?;
        let response: FeedResponse = serde_json::from_value(result)?;
        Ok(response.feed)
    }

    /// List a user's feeds
    pub async fn list_feeds(&self, user_id: i64) -> Result<Vec<Feed>> {
        let params = serde_json::json!({ "user_id": user_id });
        let result = self.call(methods::FEED_LIST, params).await?;
        let response: FeedListResponse = serde_json::from_value(result)?;
        Ok(response.feeds)
    }

    /// Get a single feed
    pub async fn get_feed(&self, user_id: i64, feed_id: i64) -> Result<Feed> {
        let params = serde_json::json!({ "user_id": user_id, "id": feed_id });
        let result = self.call(methods::FEED_GET, params).await?;
        let response: FeedResponse = serde_json::from_value(result)?;
        Ok(response.feed)
    }

    /// Delete a feed
    pub async fn delete_feed(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let params = serde_json::json!({ "user_id": user_id, "id": feed_id });
        let result = self.call(methods::FEED_DELETE, params).await?;
        let deleted: bool = serde_json::from_value(
            result
                .get("deleted")
                .cloned()
                .unwrap_or(serde_json::Value::Bool(false)),
        )?;
        Ok(deleted)
    }

    /// Aggregate a feed from external providers
    pub async fn aggregate_feed(
        &self,
        user_id: i64,
        feed_id: i64,
        providers: Option<Vec<ProviderTag>>,
    ) -> Result<AggregateResponse> {
        let params = serde_json::json!({
            "user_id": user_id,
            "feed_id": feed_id,
            "providers": providers
        });
        let result = self.call(methods::FEED_AGGREGATE, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Articles linked into a feed, newest first
    pub async fn feed_articles(
        &self,
        user_id: i64,
        feed_id: i64,
        page: Pagination,
    ) -> Result<Vec<Article>> {
        let params = serde_json::json!({
            "user_id": user_id,
            "feed_id": feed_id,
            "page": page
        });
        let result = self.call(methods::FEED_ARTICLES, params).await?;
        let response: ArticleListResponse = serde_json::from_value(result)?;
        Ok(response.articles)
    }

    /// Get a single article by ID. A miss surfaces as `Error::NotFound`.
    pub async fn get_article(&self, id: i64) -> Result<Article> {
        let params = serde_json::json!({ "id": id });
        let result = self.call(methods::ARTICLE_GET, params).await?;
        let response: ArticleResponse = serde_json::from_value(result)?;
        Ok(response.article)
    }

    /// Remove an article from a feed without deleting the article
    pub async fn unlink_article(&self, user_id: i64, feed_id: i64, article_id: i64) -> Result<bool> {
        let params = serde_json::json!({
            "user_id": user_id,
            "feed_id": feed_id,
            "article_id": article_id
        });
        let result = self.call(methods::ARTICLE_UNLINK, params).await?;
        let removed: bool = serde_json::from_value(
            result
                .get("removed")
                .cloned()
                .unwrap_or(serde_json::Value::Bool(false)),
        )?;
        Ok(removed)
    }

    /// Create a task
    pub async fn create_task(&self, user_id: i64, title: &str) -> Result<Task> {
        let params = serde_json::json!({ "user_id": user_id, "title": title });
        let result = self.call(methods::TASK_CREATE, params).await?;
        let response: TaskResponse = serde_json::from_value(result)?;
        Ok(response.task)
    }

    /// List a user's tasks
    pub async fn list_tasks(&self, user_id: i64) -> Result<Vec<Task>> {
        let params = serde_json::json!({ "user_id": user_id });
        let result = self.call(methods::TASK_LIST, params).await?;
        let response: TaskListResponse = serde_json::from_value(result)?;
        Ok(response.tasks)
    }

    /// Delete a task
    pub async fn delete_task(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let params = serde_json::json!({ "user_id": user_id, "id": task_id });
        let result = self.call(methods::TASK_DELETE, params).await?;
        let deleted: bool = serde_json::from_value(
            result
                .get("deleted")
                .cloned()
                .unwrap_or(serde_json::Value::Bool(false)),
        )?;
        Ok(deleted)
    }

    /// Register an external API endpoint
    pub async fn create_api(
        &self,
        user_id: i64,
        name: &str,
        base_url: &str,
        description: Option<&str>,
    ) -> Result<ExternalApi> {
        let params = serde_json::json!({
            "user_id": user_id,
            "name": name,
            "base_url": base_url,
            "description": description
        });
        let result = self.call(methods::API_CREATE, params).await?;
        let response: ApiResponse = serde_json::from_value(result)?;
        Ok(response.api)
    }

    /// List a user's registered external APIs
    pub async fn list_apis(&self, user_id: i64) -> Result<Vec<ExternalApi>> {
        let params = serde_json::json!({ "user_id": user_id });
        let result = self.call(methods::API_LIST, params).await?;
        let response: ApiListResponse = serde_json::from_value(result)?;
        Ok(response.apis)
    }

    /// Delete a registered external API
    pub async fn delete_api(&self, user_id: i64, api_id: i64) -> Result<bool> {
        let params = serde_json::json!({ "user_id": user_id, "id": api_id });
        let result = self.call(methods::API_DELETE, params).await?;
        let deleted: bool = serde_json::from_value(
            result
                .get("deleted")
                .cloned()
                .unwrap_or(serde_json::Value::Bool(false)),
        )?;
        Ok(deleted)
    }

    /// Send a request and receive a response
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to connect to daemon at {}: {}. Is the daemon running?",
                self.socket_path.display(),
                e
            ))
        })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        // Build request
        let request = Request::new(method).with_params(params);
        let request_json = serde_json::to_string(&request)?;

        // Send request
        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        // Read response
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;

        let response: Response = serde_json::from_str(&response_line)?;

        if let Some(error) = response.error {
            return Err(match error.code {
                ERR_NOT_FOUND => Error::NotFound(error.message),
                ERR_FORBIDDEN => Error::Forbidden(error.message),
                code => Error::Other(format!("RPC error {}: {}", code, error.message)),
            });
        }

        response
            .result
            .ok_or_else(|| Error::Other("Empty response".to_string()))
    }
}

/// Check if daemon is reachable
pub async fn is_daemon_running(socket_path: &std::path::Path) -> bool {
    let client = DaemonClient::new(socket_path.to_path_buf());
    client.ping().await.unwrap_or(false)
}
