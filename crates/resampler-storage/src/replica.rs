//! Remote copy of preview variants to file-serving hosts.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Replicated-destination configuration.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Hosts that each receive an identical copy.
    pub hosts: Vec<String>,
    /// Directory holding preview files on every host.
    pub preview_dir: PathBuf,
    /// Copy program, invoked as `<scp_bin> [scp_args..] <local> <host>:<remote>`.
    pub scp_bin: String,
    pub scp_args: Vec<String>,
    /// Wall-clock bound for a single host copy.
    pub copy_timeout: Duration,
}

impl ReplicaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let hosts = parse_hosts(
            &std::env::var("DESTINATION_HOSTS")
                .map_err(|_| StorageError::config_error("DESTINATION_HOSTS not set"))?,
        );
        if hosts.is_empty() {
            return Err(StorageError::config_error("DESTINATION_HOSTS is empty"));
        }

        Ok(Self {
            hosts,
            preview_dir: std::env::var("PREVIEW_DIR")
                .unwrap_or_else(|_| "/var/www/data/preview".to_string())
                .into(),
            scp_bin: std::env::var("SCP_BIN").unwrap_or_else(|_| "scp".to_string()),
            // Batch mode: never prompt for a password inside a daemon.
            scp_args: vec!["-B".to_string(), "-q".to_string()],
            copy_timeout: Duration::from_secs(
                std::env::var("REPLICA_COPY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// Split a comma-separated host list, dropping blank entries.
pub fn parse_hosts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

/// Copies one local file to one path on one remote host.
#[async_trait]
pub trait HostCopier: Send + Sync {
    async fn copy(&self, local: &Path, host: &str, remote: &Path) -> StorageResult<()>;
}

/// `scp`-based copier.
#[derive(Debug, Clone)]
pub struct ScpCopier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ScpCopier {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &ReplicaConfig) -> Self {
        Self::new(config.scp_bin.clone(), config.scp_args.clone(), config.copy_timeout)
    }
}

#[async_trait]
impl HostCopier for ScpCopier {
    async fn copy(&self, local: &Path, host: &str, remote: &Path) -> StorageResult<()> {
        let target = format!("{}:{}", host, remote.display());
        debug!("Copying {} to {}", local.display(), target);

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(local)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StorageError::copy_failed(host, format!("spawn {}: {}", self.program, e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Copy to {} timed out after {:?}", host, self.timeout);
                return Err(StorageError::copy_failed(
                    host,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(StorageError::copy_failed(
                host,
                format!("{} exited with {}: {}", self.program, output.status, stderr),
            ))
        }
    }
}
