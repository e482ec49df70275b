// Download every stored listening-data blob into DATA_DIR, keeping the
// <user>/<kind>.json layout.
// Run: cargo run --bin sync_bucket

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let bucket = std::env::var("GCS_BUCKET_NAME").map_err(|_| "GCS_BUCKET_NAME must be set")?;
    let endpoint = std::env::var("STORAGE_EMULATOR_HOST")
        .unwrap_or_else(|_| "https://storage.googleapis.com".to_string());
    let endpoint = endpoint.trim_end_matches('/');
    let access_token = std::env::var("GCS_ACCESS_TOKEN").ok();
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "fetched_data".into()));

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let mut names = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut request = client
            .get(format!("{}/storage/v1/b/{}/o", endpoint, bucket))
            .query(&[("fields", "items(name),nextPageToken")]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token)]);
        }
        if let Some(token) = &access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            eprintln!("\n❌ Listing bucket {} failed: {} - {}", bucket, status, text);
            eprintln!("Is GCS_ACCESS_TOKEN set (or STORAGE_EMULATOR_HOST for local runs)?");
            std::process::exit(1);
        }

        let page: ObjectList = response.json().await?;
        names.extend(page.items.into_iter().map(|o| o.name));
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    if names.is_empty() {
        println!("Bucket {} is empty!", bucket);
        return Ok(());
    }
    println!("Found {} files. Syncing to '{}/'...", names.len(), data_dir.display());

    let mut failed = 0;
    for name in names.iter().filter(|n| !n.ends_with('/')) {
        if !Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            eprintln!("Skipping suspicious object name {}", name);
            continue;
        }

        println!("Downloading {} ...", name);
        let mut request = client.get(format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            endpoint,
            bucket,
            urlencoding::encode(name)
        ));
        if let Some(token) = &access_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            eprintln!("   FAIL: {} - {}", name, response.status());
            failed += 1;
            continue;
        }

        let local_path = data_dir.join(name);
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&local_path, response.bytes().await?).await?;
    }

    if failed == 0 {
        println!("\n✅ Sync complete!");
    } else {
        println!("\nSync finished with {} failed download(s)", failed);
    }
    Ok(())
}
