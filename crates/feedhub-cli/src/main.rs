use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedhub_core::{provider::ProviderTag, storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "feedhub")]
#[command(version, about = "Feed aggregation backend with external article synchronization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (IPC server plus background scheduler)
    Serve,
    /// Check daemon status
    Status,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage feeds
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },
    /// Pull articles from external providers into a feed
    Aggregate {
        /// Owner of the feed
        #[arg(long)]
        user: i64,
        /// Feed to aggregate into; omit to sweep every feed of every user
        #[arg(long)]
        feed: Option<i64>,
        /// Providers to pull from (defaults to all)
        #[arg(long = "provider")]
        providers: Vec<ProviderTag>,
    },
    /// List articles linked into a feed, newest first
    Articles {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        feed: i64,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Manage registered external API endpoints
    Api {
        #[command(subcommand)]
        action: ApiAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a new account
    Add { email: String, password: String },
    /// List all accounts
    List,
}

#[derive(Subcommand)]
enum FeedAction {
    /// Create a feed
    Add {
        #[arg(long)]
        user: i64,
        title: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List a user's feeds
    List {
        #[arg(long)]
        user: i64,
    },
    /// Delete a feed
    Rm {
        #[arg(long)]
        user: i64,
        id: i64,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    Add {
        #[arg(long)]
        user: i64,
        title: String,
    },
    List {
        #[arg(long)]
        user: i64,
    },
    Rm {
        #[arg(long)]
        user: i64,
        id: i64,
    },
}

#[derive(Subcommand)]
enum ApiAction {
    Add {
        #[arg(long)]
        user: i64,
        name: String,
        base_url: String,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        #[arg(long)]
        user: i64,
    },
    Rm {
        #[arg(long)]
        user: i64,
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Status talks to the running daemon, everything else opens the database
    if let Commands::Status = cli.command {
        return commands::status::run(&config).await;
    }

    let db = Arc::new(Database::new(&config).await?);

    match cli.command {
        Commands::Serve => commands::serve::run(db, config).await,
        Commands::Status => unreachable!(),
        Commands::User { action } => match action {
            UserAction::Add { email, password } => {
                commands::user::add(&db, &email, &password).await
            }
            UserAction::List => commands::user::list(&db).await,
        },
        Commands::Feed { action } => match action {
            FeedAction::Add {
                user,
                title,
                url,
                description,
            } => commands::feed::add(&db, user, &title, url, description).await,
            FeedAction::List { user } => commands::feed::list(&db, user).await,
            FeedAction::Rm { user, id } => commands::feed::rm(&db, user, id).await,
        },
        Commands::Aggregate {
            user,
            feed,
            providers,
        } => commands::aggregate::run(&db, &config, user, feed, &providers).await,
        Commands::Articles {
            user,
            feed,
            limit,
            offset,
        } => commands::articles::run(&db, user, feed, limit, offset).await,
        Commands::Task { action } => match action {
            TaskAction::Add { user, title } => commands::task::add(&db, user, &title).await,
            TaskAction::List { user } => commands::task::list(&db, user).await,
            TaskAction::Rm { user, id } => commands::task::rm(&db, user, id).await,
        },
        Commands::Api { action } => match action {
            ApiAction::Add {
                user,
                name,
                base_url,
                description,
            } => commands::api::add(&db, user, &name, &base_url, description).await,
            ApiAction::List { user } => commands::api::list(&db, user).await,
            ApiAction::Rm { user, id } => commands::api::rm(&db, user, id).await,
        },
    }
}
