use anyhow::{Context, Result};
use flightdeck::geometry::{PathRequest, reconstruct};
use std::path::Path;

pub async fn handle_path(file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let request: PathRequest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse path request in {:?}", file))?;

    let reconstruction = reconstruct(&request)?;
    println!("{}", serde_json::to_string_pretty(&reconstruction)?);
    Ok(())
}
