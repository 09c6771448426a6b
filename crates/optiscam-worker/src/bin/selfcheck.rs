use std::path::Path;

use optiscam_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use optiscam_ml_client::MlClient;
use optiscam_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "optiscam-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_dir(&config.work_dir).await?;
    if let Some(report_dir) = &config.report_dir {
        ensure_dir(report_dir).await?;
    }

    check_ffmpeg()?;
    check_ffprobe()?;
    if let Err(e) = check_ytdlp() {
        println!("optiscam-selfcheck: warning: {} (remote jobs will fail)", e);
    }

    let client = MlClient::from_env()?;
    if !client.health_check().await? {
        return Err(anyhow::anyhow!(
            "model sidecar at {} is not ready",
            client.base_url()
        ));
    }

    println!("optiscam-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}
