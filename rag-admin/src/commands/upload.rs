use std::path::Path;

use anyhow::{Context, bail};
use services::s3::ObjectStore;

pub async fn run(file: &Path) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("{} is not a readable file", file.display());
    }
    let store = ObjectStore::from_env().context("S3 upload is not configured")?;
    let url = store.upload_file(file).await?;
    println!("uploaded {} to {url}", file.display());
    Ok(())
}
