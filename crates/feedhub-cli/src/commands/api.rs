use anyhow::Result;

use feedhub_core::model::NewExternalApi;
use feedhub_core::storage::{Database, ExternalApiRepository};

pub async fn add(
    db: &Database,
    user_id: i64,
    name: &str,
    base_url: &str,
    description: Option<String>,
) -> Result<()> {
    let repo = ExternalApiRepository::new(db);
    let api = repo
        .create(&NewExternalApi {
            user_id,
            name: name.to_string(),
            base_url: base_url.to_string(),
            description,
        })
        .await?;

    println!("Registered API: {} ({})", api.name, api.id);
    Ok(())
}

pub async fn list(db: &Database, user_id: i64) -> Result<()> {
    let repo = ExternalApiRepository::new(db);
    let apis = repo.list_by_owner(user_id).await?;

    if apis.is_empty() {
        println!("No registered APIs yet.");
        return Ok(());
    }

    println!("Registered APIs ({}):\n", apis.len());
    for api in &apis {
        println!("  {} - {} ({})", api.id, api.name, api.base_url);
        if let Some(desc) = &api.description {
            println!("    {}", desc);
        }
    }

    Ok(())
}

pub async fn rm(db: &Database, user_id: i64, api_id: i64) -> Result<()> {
    let repo = ExternalApiRepository::new(db);

    if repo.delete(user_id, api_id).await? {
        println!("Deleted API registration {}", api_id);
    } else {
        println!("API registration {} not found.", api_id);
    }

    Ok(())
}
