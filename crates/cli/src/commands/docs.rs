//! `turnwise docs`: manage vector stores for the file search tool.

use std::path::PathBuf;

use turnwise_config::AppConfig;
use turnwise_providers::ResponsesProvider;

fn provider() -> Result<ResponsesProvider, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(turnwise_providers::build_from_config(&config)?)
}

pub async fn create(name: &str, expire_days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let store = provider()?.create_vector_store(name, expire_days).await?;
    println!("✅ Created vector store {}", store.id);
    println!();
    println!("   Search it with:");
    println!("     turnwise chat --preset documents --vector-store {}", store.id);
    Ok(())
}

pub async fn upload(store_id: &str, paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let provider = provider()?;
    let mut failures = 0;

    for path in paths {
        let attached = async {
            let file_id = provider.upload_document(path).await?;
            provider.attach_document(store_id, &file_id).await
        }
        .await;

        match attached {
            Ok(file) => println!(
                "  ✅ {} → {} ({})",
                path.display(),
                file.id,
                file.status.as_deref().unwrap_or("queued")
            ),
            Err(e) => {
                println!("  ❌ {}: {e}", path.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} of {} document(s) failed", paths.len()).into());
    }
    Ok(())
}

pub async fn delete(store_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    if provider()?.delete_vector_store(store_id).await? {
        println!("✅ Deleted vector store {store_id}");
    } else {
        println!("⚠️  The service did not confirm deletion of {store_id}");
    }
    Ok(())
}
