//! Protocol definitions for daemon-client communication.
//!
//! Uses JSON-RPC style request/response format over Unix socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{AggregateOutcome, ProviderFailure};
use crate::model::{Article, ExternalApi, Feed, Pagination, Task};
use crate::provider::ProviderTag;

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Uuid, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Uuid, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn ok(id: Uuid) -> Self {
        Self::success(id, serde_json::json!({"ok": true}))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

// Error codes
pub const ERR_PARSE: i32 = -32700;
pub const ERR_INVALID_REQUEST: i32 = -32600;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;
pub const ERR_DAEMON_NOT_RUNNING: i32 = -32000;
// 404/403-equivalents surfaced by the core
pub const ERR_NOT_FOUND: i32 = -32004;
pub const ERR_FORBIDDEN: i32 = -32003;

// Method names
pub mod methods {
    pub const PING: &str = "ping";
    pub const STATUS: &str = "status";

    // User methods
    pub const USER_SIGNUP: &str = "user.signup";

    // Feed methods
    pub const FEED_CREATE: &str = "feed.create";
    pub const FEED_LIST: &str = "feed.list";
    pub const FEED_GET: &str = "feed.get";
    pub const FEED_UPDATE: &str = "feed.update";
    pub const FEED_DELETE: &str = "feed.delete";
    pub const FEED_AGGREGATE: &str = "feed.aggregate";
    pub const FEED_ARTICLES: &str = "feed.articles";

    // Article methods
    pub const ARTICLE_GET: &str = "article.get";
    pub const ARTICLE_UNLINK: &str = "article.unlink";

    // Task methods
    pub const TASK_CREATE: &str = "task.create";
    pub const TASK_LIST: &str = "task.list";
    pub const TASK_UPDATE: &str = "task.update";
    pub const TASK_DELETE: &str = "task.delete";

    // External API registration methods
    pub const API_CREATE: &str = "api.create";
    pub const API_LIST: &str = "api.list";
    pub const API_UPDATE: &str = "api.update";
    pub const API_DELETE: &str = "api.delete";
}

// Parameter structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupParams {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerParams {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedIdParams {
    pub user_id: i64,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCreateParams {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedUpdateParams {
    pub user_id: i64,
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateParams {
    pub user_id: i64,
    pub feed_id: i64,
    /// Defaults to all built-in providers when omitted
    #[serde(default)]
    pub providers: Option<Vec<ProviderTag>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedArticlesParams {
    pub user_id: i64,
    pub feed_id: i64,
    #[serde(default)]
    pub page: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleIdParams {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlinkParams {
    pub user_id: i64,
    pub feed_id: i64,
    pub article_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCreateParams {
    pub user_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskUpdateParams {
    pub user_id: i64,
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCreateParams {
    pub user_id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUpdateParams {
    pub user_id: i64,
    pub id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

// Response structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_secs: u64,
    pub scheduler_running: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub feed: Feed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedListResponse {
    pub feeds: Vec<Feed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub added: Vec<Article>,
    pub failed: Vec<ProviderFailure>,
}

impl From<AggregateOutcome> for AggregateResponse {
    fn from(outcome: AggregateOutcome) -> Self {
        Self {
            added: outcome.added,
            failed: outcome.failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleListResponse {
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub article: Article,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub api: ExternalApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiListResponse {
    pub apis: Vec<ExternalApi>,
}
