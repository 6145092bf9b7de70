use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// OCR Server Manager
/// Reuses a running PaddleOCR server or starts the configured binary
pub struct OcrServerManager {
    process: Option<Child>,
    base_url: String,
    binary: Option<PathBuf>,
    client: reqwest::Client,
    max_attempts: u32,
    poll_interval: Duration,
}

impl OcrServerManager {
    /// Create a new server manager
    pub fn new(base_url: &str, binary: Option<&str>) -> Self {
        Self {
            process: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            binary: binary.map(PathBuf::from),
            client: reqwest::Client::new(),
            max_attempts: 60,
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Override how long `start` waits for the server (attempts * interval)
    pub fn with_readiness(mut self, max_attempts: u32, poll_interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.poll_interval = poll_interval;
        self
    }

    /// Make sure a server answers on the base URL
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_server_running().await {
            info!(base_url = %self.base_url, "OCR server already running");
            return Ok(());
        }

        let binary = self
            .binary
            .clone()
            .ok_or_else(|| format!("No OCR server at {} and no server binary configured", self.base_url))?;

        info!(binary = %binary.display(), "Starting OCR server");
        let child = Self::spawn(&binary)?;
        self.process = Some(child);

        self.wait_for_ready().await?;
        info!(base_url = %self.base_url, "OCR server started");
        Ok(())
    }

    fn spawn(binary: &Path) -> Result<Child, String> {
        if !binary.exists() {
            return Err(format!("OCR server binary not found at: {}", binary.display()));
        }

        let mut command = Command::new(binary);
        if let Some(dir) = binary.parent().filter(|d| !d.as_os_str().is_empty()) {
            command.current_dir(dir);
        }
        command
            .spawn()
            .map_err(|e| format!("Failed to start server: {}", e))
    }

    /// Check if server is running by hitting health endpoint
    pub async fn is_server_running(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self.client.get(&url).timeout(Duration::from_secs(2)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn wait_for_ready(&mut self) -> Result<(), String> {
        for attempt in 1..=self.max_attempts {
            if self.is_server_running().await {
                debug!(attempt, "OCR server ready");
                return Ok(());
            }

            if let Some(child) = self.process.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    self.process = None;
                    return Err(format!("OCR server exited during startup ({})", status));
                }
            }

            if attempt % 4 == 0 {
                debug!(attempt, max_attempts = self.max_attempts, "Waiting for OCR server");
            }
            sleep(self.poll_interval).await;
        }

        Err(format!(
            "OCR server did not become ready at {} within {:.0} seconds",
            self.base_url,
            self.poll_interval.as_secs_f64() * self.max_attempts as f64
        ))
    }

    /// Stop the server gracefully via shutdown endpoint, fallback to kill.
    /// A server this manager did not start is left alone.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };

        let shutdown_url = format!("{}/shutdown", self.base_url);
        let graceful = self
            .client
            .post(&shutdown_url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .is_ok();

        if graceful {
            sleep(Duration::from_millis(1000)).await;
            if let Ok(Some(_)) = child.try_wait() {
                info!("OCR server stopped (graceful)");
                return;
            }
        }

        match child.kill() {
            Ok(_) => {
                let _ = child.wait();
                info!("OCR server stopped (forced)");
            }
            Err(e) => warn!(error = %e, "Failed to stop OCR server"),
        }
    }

    pub fn is_managed(&self) -> bool {
        self.process.is_some()
    }

    /// Get the server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for OcrServerManager {
    fn drop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_manager(binary: Option<&str>) -> OcrServerManager {
        OcrServerManager::new("http://127.0.0.1:9/", binary).with_readiness(2, Duration::from_millis(10))
    }

    #[test]
    fn test_base_url_normalized() {
        let manager = unreachable_manager(None);
        assert_eq!(manager.base_url(), "http://127.0.0.1:9");
        assert!(!manager.is_managed());
    }

    #[tokio::test]
    async fn test_not_running_when_unreachable() {
        assert!(!unreachable_manager(None).is_server_running().await);
    }

    #[tokio::test]
    async fn test_start_without_binary_fails() {
        let mut manager = unreachable_manager(None);
        let result = manager.start().await;

        assert!(result.is_err());
        assert!(result.unwrap_err().contains("no server binary configured"));
    }

    #[tokio::test]
    async fn test_start_with_missing_binary_fails() {
        let mut manager = unreachable_manager(Some("/nonexistent/ocr_server"));
        let result = manager.start().await;

        assert!(result.unwrap_err().contains("not found"));
        assert!(!manager.is_managed());
    }

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let mut manager = unreachable_manager(None);
        manager.stop().await;
        assert!(!manager.is_managed());
    }
}
