use anyhow::Result;

use feedhub_core::model::NewUser;
use feedhub_core::storage::{Database, UserRepository};

pub async fn add(db: &Database, email: &str, password: &str) -> Result<()> {
    let repo = UserRepository::new(db);
    let user = repo
        .create(&NewUser {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await?;

    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

pub async fn list(db: &Database) -> Result<()> {
    let repo = UserRepository::new(db);
    let users = repo.list_all().await?;

    if users.is_empty() {
        println!("No users yet.");
        return Ok(());
    }

    println!("Users ({}):\n", users.len());
    for user in &users {
        println!("  {} - {}", user.id, user.email);
    }

    Ok(())
}
