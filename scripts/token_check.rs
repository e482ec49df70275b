// Quick diagnostic: check that a user access token can read listening stats
// Run: SPOTIFY_TOKEN=... cargo run --bin token_check > top_tracks.tsv

use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let token = std::env::var("SPOTIFY_TOKEN").map_err(|_| "SPOTIFY_TOKEN must be set")?;
    let api_url = std::env::var("SPOTIFY_API_URL")
        .unwrap_or_else(|_| "https://api.spotify.com".to_string());
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    // 1. Who does the token belong to
    eprintln!("1. Getting current user (GET /v1/me)...");
    let me = get_json(&client, &format!("{}/v1/me", api_url), &token, &[]).await?;
    eprintln!(
        "   OK. User: {} ({})",
        me["display_name"].as_str().unwrap_or("?"),
        me["id"].as_str().unwrap_or("?")
    );

    // 2. Top tracks of the last four weeks
    eprintln!("\n2. Getting top tracks (GET /v1/me/top/tracks)...");
    let tracks = get_json(
        &client,
        &format!("{}/v1/me/top/tracks", api_url),
        &token,
        &[("time_range", "short_term"), ("limit", "50")],
    )
    .await?;

    let items = tracks["items"].as_array().map(|a| a.as_slice()).unwrap_or(&[]);
    eprintln!("   OK. {} track(s)\n", items.len());

    println!("id\tname\tartists\tpopularity");
    for item in items {
        let artists: Vec<&str> = item["artists"]
            .as_array()
            .map(|a| a.iter().filter_map(|artist| artist["name"].as_str()).collect())
            .unwrap_or_default();
        println!(
            "{}\t{}\t{}\t{}",
            clean(item["id"].as_str().unwrap_or("")),
            clean(item["name"].as_str().unwrap_or("")),
            clean(&artists.join(", ")),
            item["popularity"].as_u64().map(|p| p.to_string()).unwrap_or_default()
        );
    }

    Ok(())
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    query: &[(&str, &str)],
) -> Result<Value, Box<dyn std::error::Error>> {
    let response = client
        .get(url)
        .header("Authorization", format!("Bearer {}", token))
        .query(query)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(format!("{} returned {}: {}", url, status, body).into());
    }
    Ok(serde_json::from_str(&body)?)
}

// Keep each field on one TSV cell
fn clean(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}
