//! IPC Server for daemon
//!
//! Listens on Unix socket and handles client requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::*;
use crate::aggregate::Aggregator;
use crate::config::AppConfig;
use crate::model::{FeedUpdate, NewExternalApi, NewFeed, NewTask, NewUser};
use crate::provider::ProviderTag;
use crate::storage::{
    ArticleRepository, Database, ExternalApiRepository, FeedArticleRepository, FeedRepository,
    TaskRepository, UserRepository,
};
use crate::{Error, Result};

/// Maximum number of concurrent IPC requests to prevent connection pool exhaustion
const MAX_CONCURRENT_REQUESTS: usize = 10;

/// IPC Server that handles client connections
pub struct DaemonServer {
    db: Arc<Database>,
    config: Arc<AppConfig>,
    socket_path: PathBuf,
    start_time: Instant,
    /// Semaphore to limit concurrent request processing
    request_semaphore: Arc<Semaphore>,
}

impl DaemonServer {
    pub fn new(db: Arc<Database>, config: Arc<AppConfig>) -> Self {
        let socket_path = config.socket_path();
        Self {
            db,
            config,
            socket_path,
            start_time: Instant::now(),
            request_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        }
    }

    /// Run the IPC server
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        // Remove old socket file if exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on: {}", self.socket_path.display());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let db = self.db.clone();
                            let config = self.config.clone();
                            let start_time = self.start_time;
                            let semaphore = self.request_semaphore.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, db, config, start_time, semaphore).await {
                                    warn!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("IPC server shutting down");
                        break;
                    }
                }
            }
        }

        // Cleanup socket file
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    db: Arc<Database>,
    config: Arc<AppConfig>,
    start_time: Instant,
    semaphore: Arc<Semaphore>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        // Acquire semaphore permit to limit concurrent request processing
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| Error::Other(format!("Failed to acquire semaphore: {}", e)))?;

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!("Received request: {} (id: {})", request.method, request.id);
                handle_request(request, &db, &config, start_time).await
            }
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                Response::error(Uuid::nil(), ERR_PARSE, format!("Parse error: {}", e))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Map a core error onto the matching RPC error code
fn failure(id: Uuid, e: Error) -> Response {
    match e {
        Error::NotFound(msg) => Response::error(id, ERR_NOT_FOUND, msg),
        Error::Forbidden(msg) => Response::error(id, ERR_FORBIDDEN, msg),
        other => Response::error(id, ERR_INTERNAL, other.to_string()),
    }
}

async fn handle_request(
    request: Request,
    db: &Database,
    config: &AppConfig,
    start_time: Instant,
) -> Response {
    let id = request.id;

    match request.method.as_str() {
        methods::PING => Response::success(id, serde_json::json!({"ok": true})),

        methods::STATUS => {
            let uptime = start_time.elapsed().as_secs();
            Response::success(
                id,
                serde_json::json!({
                    "running": true,
                    "uptime_secs": uptime,
                    "scheduler_running": config.sync.aggregate_interval_secs > 0,
                }),
            )
        }

        methods::USER_SIGNUP => match serde_json::from_value::<SignupParams>(request.params) {
            Ok(params) => {
                let repo = UserRepository::new(db);
                let new_user = NewUser {
                    email: params.email,
                    password: params.password,
                };
                match repo.create(&new_user).await {
                    Ok(user) => Response::success(
                        id,
                        serde_json::json!({ "id": user.id, "email": user.email }),
                    ),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_CREATE => match serde_json::from_value::<FeedCreateParams>(request.params) {
            Ok(params) => {
                let repo = FeedRepository::new(db);
                let new_feed = NewFeed {
                    user_id: params.user_id,
                    title: params.title,
                    url: params.url,
                    site_url: params.site_url,
                    description: params.description,
                };
                match repo.create(&new_feed).await {
                    Ok(feed) => Response::success(id, serde_json::json!({ "feed": feed })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_LIST => match serde_json::from_value::<OwnerParams>(request.params) {
            Ok(params) => {
                let repo = FeedRepository::new(db);
                match repo.list_by_owner(params.user_id).await {
                    Ok(feeds) => Response::success(id, serde_json::json!({ "feeds": feeds })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_GET => match serde_json::from_value::<OwnedIdParams>(request.params) {
            Ok(params) => {
                let repo = FeedRepository::new(db);
                match repo.find_for_owner(params.user_id, params.id).await {
                    Ok(Some(feed)) => Response::success(id, serde_json::json!({ "feed": feed })),
                    Ok(None) => {
                        Response::error(id, ERR_NOT_FOUND, format!("feed {}", params.id))
                    }
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_UPDATE => match serde_json::from_value::<FeedUpdateParams>(request.params) {
            Ok(params) => {
                let repo = FeedRepository::new(db);
                let update = FeedUpdate {
                    title: params.title,
                    url: params.url,
                    site_url: params.site_url,
                    description: params.description,
                };
                match repo.update(params.user_id, params.id, &update).await {
                    Ok(feed) => Response::success(id, serde_json::json!({ "feed": feed })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_DELETE => match serde_json::from_value::<OwnedIdParams>(request.params) {
            Ok(params) => {
                let repo = FeedRepository::new(db);
                match repo.delete(params.user_id, params.id).await {
                    Ok(deleted) => Response::success(id, serde_json::json!({ "deleted": deleted })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_AGGREGATE => {
            match serde_json::from_value::<AggregateParams>(request.params) {
                Ok(params) => {
                    let providers = params
                        .providers
                        .unwrap_or_else(|| ProviderTag::ALL.to_vec());
                    let aggregator = Aggregator::new(db, config);
                    match aggregator
                        .aggregate_feed(params.feed_id, params.user_id, &providers)
                        .await
                    {
                        Ok(outcome) => {
                            let resp = AggregateResponse::from(outcome);
                            Response::success(
                                id,
                                serde_json::json!({
                                    "added": resp.added,
                                    "failed": resp.failed,
                                }),
                            )
                        }
                        Err(e) => failure(id, e),
                    }
                }
                Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
            }
        }

        methods::FEED_ARTICLES => {
            match serde_json::from_value::<FeedArticlesParams>(request.params) {
                Ok(params) => {
                    let feeds = FeedRepository::new(db);
                    match feeds.find_for_owner(params.user_id, params.feed_id).await {
                        Ok(Some(_)) => {
                            let links = FeedArticleRepository::new(db);
                            match links.list_for_feed(params.feed_id, params.page).await {
                                Ok(articles) => Response::success(
                                    id,
                                    serde_json::json!({ "articles": articles }),
                                ),
                                Err(e) => failure(id, e),
                            }
                        }
                        Ok(None) => {
                            Response::error(id, ERR_NOT_FOUND, format!("feed {}", params.feed_id))
                        }
                        Err(e) => failure(id, e),
                    }
                }
                Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
            }
        }

        methods::ARTICLE_GET => match serde_json::from_value::<ArticleIdParams>(request.params) {
            Ok(params) => {
                let repo = ArticleRepository::new(db);
                match repo.find_by_id(params.id).await {
                    Ok(Some(article)) => {
                        Response::success(id, serde_json::json!({ "article": article }))
                    }
                    Ok(None) => {
                        Response::error(id, ERR_NOT_FOUND, format!("article {}", params.id))
                    }
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::ARTICLE_UNLINK => match serde_json::from_value::<UnlinkParams>(request.params) {
            Ok(params) => {
                let feeds = FeedRepository::new(db);
                match feeds.find_for_owner(params.user_id, params.feed_id).await {
                    Ok(Some(_)) => {
                        let links = FeedArticleRepository::new(db);
                        match links.unlink(params.feed_id, params.article_id).await {
                            Ok(removed) => {
                                Response::success(id, serde_json::json!({ "removed": removed }))
                            }
                            Err(e) => failure(id, e),
                        }
                    }
                    Ok(None) => {
                        Response::error(id, ERR_NOT_FOUND, format!("feed {}", params.feed_id))
                    }
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::TASK_CREATE => match serde_json::from_value::<TaskCreateParams>(request.params) {
            Ok(params) => {
                let repo = TaskRepository::new(db);
                let new_task = NewTask {
                    user_id: params.user_id,
                    title: params.title,
                };
                match repo.create(&new_task).await {
                    Ok(task) => Response::success(id, serde_json::json!({ "task": task })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::TASK_LIST => match serde_json::from_value::<OwnerParams>(request.params) {
            Ok(params) => {
                let repo = TaskRepository::new(db);
                match repo.list_by_owner(params.user_id).await {
                    Ok(tasks) => Response::success(id, serde_json::json!({ "tasks": tasks })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::TASK_UPDATE => match serde_json::from_value::<TaskUpdateParams>(request.params) {
            Ok(params) => {
                let repo = TaskRepository::new(db);
                match repo.update(params.user_id, params.id, &params.title).await {
                    Ok(task) => Response::success(id, serde_json::json!({ "task": task })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::TASK_DELETE => match serde_json::from_value::<OwnedIdParams>(request.params) {
            Ok(params) => {
                let repo = TaskRepository::new(db);
                match repo.delete(params.user_id, params.id).await {
                    Ok(deleted) => Response::success(id, serde_json::json!({ "deleted": deleted })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::API_CREATE => match serde_json::from_value::<ApiCreateParams>(request.params) {
            Ok(params) => {
                let repo = ExternalApiRepository::new(db);
                let new_api = NewExternalApi {
                    user_id: params.user_id,
                    name: params.name,
                    base_url: params.base_url,
                    description: params.description,
                };
                match repo.create(&new_api).await {
                    Ok(api) => Response::success(id, serde_json::json!({ "api": api })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::API_LIST => match serde_json::from_value::<OwnerParams>(request.params) {
            Ok(params) => {
                let repo = ExternalApiRepository::new(db);
                match repo.list_by_owner(params.user_id).await {
                    Ok(apis) => Response::success(id, serde_json::json!({ "apis": apis })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::API_UPDATE => match serde_json::from_value::<ApiUpdateParams>(request.params) {
            Ok(params) => {
                let repo = ExternalApiRepository::new(db);
                let api = NewExternalApi {
                    user_id: params.user_id,
                    name: params.name,
                    base_url: params.base_url,
                    description: params.description,
                };
                match repo.update(params.user_id, params.id, &api).await {
                    Ok(api) => Response::success(id, serde_json::json!({ "api": api })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::API_DELETE => match serde_json::from_value::<OwnedIdParams>(request.params) {
            Ok(params) => {
                let repo = ExternalApiRepository::new(db);
                match repo.delete(params.user_id, params.id).await {
                    Ok(deleted) => Response::success(id, serde_json::json!({ "deleted": deleted })),
                    Err(e) => failure(id, e),
                }
            }
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        _ => Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_rpc_code() {
        let id = Uuid::new_v4();
        let resp = failure(id, Error::NotFound("feed 9".to_string()));
        assert_eq!(resp.error.unwrap().code, ERR_NOT_FOUND);
    }

    #[test]
    fn test_forbidden_maps_to_rpc_code() {
        let id = Uuid::new_v4();
        let resp = failure(id, Error::Forbidden("feed 9".to_string()));
        assert_eq!(resp.error.unwrap().code, ERR_FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let config = AppConfig::default();
        let request = Request::new("nope.nothing");
        let resp = handle_request(request, &db, &config, Instant::now()).await;
        assert_eq!(resp.error.unwrap().code, ERR_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_article_get_miss_is_not_found() {
        let db = Database::new_in_memory().await.unwrap();
        let config = AppConfig::default();

        let request =
            Request::new(methods::ARTICLE_GET).with_params(serde_json::json!({ "id": 424242 }));
        let resp = handle_request(request, &db, &config, Instant::now()).await;

        assert!(!resp.is_success());
        assert_eq!(resp.error.unwrap().code, ERR_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_signup_then_feed_roundtrip() {
        let db = Database::new_in_memory().await.unwrap();
        let config = AppConfig::default();

        let request = Request::new(methods::USER_SIGNUP).with_params(serde_json::json!({
            "email": "alice@example.com",
            "password": "secret",
        }));
        let resp = handle_request(request, &db, &config, Instant::now()).await;
        assert!(resp.is_success());
        let user_id = resp.result.unwrap()["id"].as_i64().unwrap();

        let request = Request::new(methods::FEED_CREATE).with_params(serde_json::json!({
            "user_id": user_id,
            "title": "Tech news",
        }));
        let resp = handle_request(request, &db, &config, Instant::now()).await;
        assert!(resp.is_success());
        let feed_id = resp.result.unwrap()["feed"]["id"].as_i64().unwrap();

        let request = Request::new(methods::FEED_GET).with_params(serde_json::json!({
            "user_id": user_id,
            "id": feed_id,
        }));
        let resp = handle_request(request, &db, &config, Instant::now()).await;
        assert!(resp.is_success());

        // Another user cannot see the feed
        let request = Request::new(methods::FEED_GET).with_params(serde_json::json!({
            "user_id": user_id + 1,
            "id": feed_id,
        }));
        let resp = handle_request(request, &db, &config, Instant::now()).await;
        assert_eq!(resp.error.unwrap().code, ERR_NOT_FOUND);
    }
}
