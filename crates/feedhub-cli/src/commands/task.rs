use anyhow::Result;

use feedhub_core::model::NewTask;
use feedhub_core::storage::{Database, TaskRepository};

pub async fn add(db: &Database, user_id: i64, title: &str) -> Result<()> {
    let repo = TaskRepository::new(db);
    let task = repo
        .create(&NewTask {
            user_id,
            title: title.to_string(),
        })
        .await?;

    println!("Created task: {} ({})", task.title, task.id);
    Ok(())
}

pub async fn list(db: &Database, user_id: i64) -> Result<()> {
    let repo = TaskRepository::new(db);
    let tasks = repo.list_by_owner(user_id).await?;

    if tasks.is_empty() {
        println!("No tasks yet.");
        return Ok(());
    }

    println!("Tasks ({}):\n", tasks.len());
    for task in &tasks {
        println!("  {} - {}", task.id, task.title);
    }

    Ok(())
}

pub async fn rm(db: &Database, user_id: i64, task_id: i64) -> Result<()> {
    let repo = TaskRepository::new(db);

    if repo.delete(user_id, task_id).await? {
        println!("Deleted task {}", task_id);
    } else {
        println!("Task {} not found.", task_id);
    }

    Ok(())
}
