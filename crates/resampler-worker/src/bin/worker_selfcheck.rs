use std::path::Path;

use resampler_media::{check_tool, OptimizerConfig};
use resampler_worker::config::REQUIRED_ENV;
use resampler_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env()?;
    let optimizer = OptimizerConfig::from_env();
    let scp = std::env::var("SCP_BIN").unwrap_or_else(|_| "scp".to_string());

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool(&optimizer.binary)?;
    ensure_tool(&scp)?;
    ensure_env_present(REQUIRED_ENV)?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_tool(program: &str) -> anyhow::Result<()> {
    let path = check_tool(program).map_err(|e| anyhow::anyhow!("{} not available: {}", program, e))?;
    println!("worker-selfcheck: found {} at {}", program, path.display());
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
