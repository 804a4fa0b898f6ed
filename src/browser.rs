//! Browser lifecycle
//!
//! One Chromium process per run, owned exclusively by the harness. The
//! session is acquired once and released exactly once on every exit path;
//! `main` is responsible for calling [`BrowserSession::close`] whether the
//! run succeeded or failed, and `Drop` aborts the background tasks as a
//! backstop.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

use crate::config::HarnessConfig;
use crate::console::ConsoleLog;
use crate::error::HarnessError;

const VIEWPORT_WIDTH: u32 = 1280;
const VIEWPORT_HEIGHT: u32 = 720;

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    console_task: JoinHandle<()>,
    page: Page,
    console: ConsoleLog,
    user_data_dir: String,
}

impl BrowserSession {
    /// Directory where the fetcher caches downloaded Chromium binaries.
    fn fetcher_cache_dir() -> PathBuf {
        let base = std::env::var("HOME").map_or_else(|_| PathBuf::from("/tmp"), PathBuf::from);
        base.join(".cache/chat-smoke/chromium")
    }

    fn browser_config(
        headless: bool,
        user_data_dir: &str,
        executable: Option<&Path>,
    ) -> Result<BrowserConfig, HarnessError> {
        // Remove a stale profile dir so Chromium's SingletonLock from a
        // previous crashed run cannot block the launch.
        let _ = std::fs::remove_dir_all(user_data_dir);

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .user_data_dir(user_data_dir)
            .viewport(chromiumoxide::handler::viewport::Viewport {
                width: VIEWPORT_WIDTH,
                height: VIEWPORT_HEIGHT,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            });

        builder = if headless {
            builder.new_headless_mode()
        } else {
            builder.with_head()
        };

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(HarnessError::LaunchFailed)
    }

    async fn launch_with(
        config: &HarnessConfig,
        user_data_dir: &str,
        executable: Option<&Path>,
    ) -> Result<Self, HarnessError> {
        let browser_config = Self::browser_config(config.headless, user_data_dir, executable)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| HarnessError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarnessError::LaunchFailed(e.to_string()))?;

        // Listener goes on before any navigation so early emissions land in
        // the log too.
        let console = ConsoleLog::new();
        let console_task = console.attach(&page).await?;

        Ok(Self {
            browser,
            handler_task,
            console_task,
            page,
            console,
            user_data_dir: user_data_dir.to_string(),
        })
    }

    /// Launch a fresh browser for this run.
    ///
    /// Tries system Chrome first. On failure, downloads a compatible
    /// Chromium via the fetcher and caches it for future runs. Each run gets
    /// its own profile directory, so sequential runs share no state.
    pub async fn launch(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let user_data_dir = format!("/tmp/chat-smoke-{}", uuid::Uuid::new_v4());

        match Self::launch_with(config, &user_data_dir, None).await {
            Ok(session) => return Ok(session),
            Err(e) => {
                tracing::info!("System Chrome not available ({e}), trying fetcher...");
            }
        }

        let cache_dir = Self::fetcher_cache_dir();
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            HarnessError::LaunchFailed(format!(
                "Failed to create cache dir {}: {e}",
                cache_dir.display()
            ))
        })?;

        let fetcher_opts = BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .map_err(|e| HarnessError::LaunchFailed(format!("Fetcher config error: {e}")))?;

        let fetcher = BrowserFetcher::new(fetcher_opts);
        let info = fetcher
            .fetch()
            .await
            .map_err(|e| HarnessError::LaunchFailed(format!("Chromium download failed: {e:#}")))?;

        tracing::info!("Using Chromium at {:?}", info.executable_path);

        Self::launch_with(config, &user_data_dir, Some(&info.executable_path)).await
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn console(&self) -> &ConsoleLog {
        &self.console
    }

    /// Release the browser. Called exactly once per session, on success and
    /// on failure alike.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close failed: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Browser did not exit cleanly: {e}");
        }
        self.console_task.abort();
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            tracing::debug!(dir = %self.user_data_dir, "Profile dir cleanup failed: {e}");
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.console_task.abort();
        self.handler_task.abort();
    }
}
