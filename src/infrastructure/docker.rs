use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::VectorDbConfig;

const HEALTH_CHECK_RETRIES: u32 = 10;
const QDRANT_STORAGE_MOUNT: &str = "/qdrant/storage";

/// Settings for the locally managed Qdrant container.
#[derive(Debug, Clone, PartialEq)]
pub struct QdrantContainer {
    pub name: String,
    pub image: String,
    pub http_port: u16,
    pub grpc_port: u16,
    /// Host directory bind-mounted as the container's storage.
    pub storage_dir: PathBuf,
}

impl QdrantContainer {
    pub fn from_config(config: &VectorDbConfig, storage_dir: &Path) -> Self {
        Self {
            name: config.container_name.clone(),
            image: config.container_image.clone(),
            http_port: config.http_port,
            grpc_port: config.grpc_port,
            storage_dir: storage_dir.to_path_buf(),
        }
    }

    /// Arguments for `docker run` that start a fresh container.
    pub fn run_args(&self) -> Vec<String> {
        vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "-p".to_string(),
            format!("{}:6333", self.http_port),
            "-p".to_string(),
            format!("{}:6334", self.grpc_port),
            "-v".to_string(),
            format!("{}:{}", self.storage_dir.display(), QDRANT_STORAGE_MOUNT),
            self.image.clone(),
        ]
    }

    fn health_endpoint(&self) -> String {
        format!("http://localhost:{}/collections", self.http_port)
    }
}

/// Container state as reported by `docker ps --format {{.Status}}`.
#[derive(Debug, PartialEq, Eq)]
enum ContainerState {
    Running,
    Stopped,
    Missing,
}

fn parse_status(ps_stdout: &str) -> ContainerState {
    if ps_stdout.contains("Up") {
        ContainerState::Running
    } else if !ps_stdout.trim().is_empty() {
        ContainerState::Stopped
    } else {
        ContainerState::Missing
    }
}

/// Makes sure the Qdrant container is running and healthy.
pub async fn ensure_qdrant_via_docker(container: QdrantContainer) -> Result<()> {
    tokio::task::spawn_blocking(move || ensure_qdrant_sync(&container))
        .await
        .context("Failed to execute blocking task")?
}

fn run_docker(args: &[String]) -> Result<std::process::Output> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute docker {}", args.first().map(String::as_str).unwrap_or("")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "docker {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(output)
}

fn ensure_qdrant_sync(container: &QdrantContainer) -> Result<()> {
    run_docker(&["--version".to_string()]).context("Docker is not installed or not runnable")?;
    log::info!("Docker found.");

    std::fs::create_dir_all(&container.storage_dir).with_context(|| {
        format!("Failed to create vector store directory {}", container.storage_dir.display())
    })?;

    log::info!("Checking for Qdrant container: {}", container.name);
    let ps = run_docker(&[
        "ps".to_string(),
        "-a".to_string(),
        "--filter".to_string(),
        format!("name=^{}$", container.name),
        "--format".to_string(),
        "{{.Status}}".to_string(),
    ])?;
    let ps_stdout = String::from_utf8_lossy(&ps.stdout);
    log::debug!("docker ps output: {}", ps_stdout);

    match parse_status(&ps_stdout) {
        ContainerState::Running => {
            log::info!("Qdrant container '{}' is already running.", container.name);
        }
        ContainerState::Stopped => {
            log::info!("Qdrant container '{}' exists but is not running. Starting it...", container.name);
            run_docker(&["start".to_string(), container.name.clone()])?;
        }
        ContainerState::Missing => {
            log::info!(
                "Qdrant container '{}' not found. Creating it with storage at {}...",
                container.name,
                container.storage_dir.display()
            );
            run_docker(&container.run_args())?;
        }
    }

    wait_until_healthy(container)
}

fn wait_until_healthy(container: &QdrantContainer) -> Result<()> {
    let endpoint = container.health_endpoint();
    log::info!("Performing health check on Qdrant ({})...", endpoint);
    for attempt in 1..=HEALTH_CHECK_RETRIES {
        match ureq::get(&endpoint).timeout(Duration::from_secs(2)).call() {
            Ok(resp) if resp.status() == 200 => {
                log::info!("Qdrant is up.");
                return Ok(());
            }
            Ok(resp) => {
                log::warn!(
                    "Qdrant health check returned status {}. Retry {}/{}",
                    resp.status(),
                    attempt,
                    HEALTH_CHECK_RETRIES
                );
            }
            Err(e) => {
                log::warn!(
                    "Qdrant health check failed: {}. Retry {}/{}",
                    e,
                    attempt,
                    HEALTH_CHECK_RETRIES
                );
            }
        }
        std::thread::sleep(Duration::from_secs(3));
    }
    Err(anyhow!(
        "Qdrant did not become healthy at {} after {} attempts",
        endpoint,
        HEALTH_CHECK_RETRIES
    ))
}
