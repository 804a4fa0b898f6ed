//! Fixed harness configuration
//!
//! There is deliberately no command-line surface: the harness is a bare
//! invocable with its configuration baked in. A few values (target URL,
//! artifact path, headless) can be overridden through `CHAT_SMOKE_*`
//! environment variables for local runs against a differently-hosted client.

use std::time::Duration;

/// Marker the client prefixes onto streamed-response console lines.
pub const PART_MARKER: &str = "[PART]";

/// Maximum entries printed in the final console summary.
pub const SUMMARY_CAP: usize = 20;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Chat client page under test.
    pub url: String,
    /// Run Chromium without a visible window.
    pub headless: bool,

    /// Visible text of the connect control.
    pub connect_label: String,
    /// Visible text of the new-session control.
    pub new_session_label: String,
    /// Visible text of the send control.
    pub send_label: String,
    /// CSS selector for the message input.
    pub input_selector: String,
    /// Message typed into the input.
    pub message: String,

    /// Dwell after clicking connect (D1).
    pub connect_dwell: Duration,
    /// Dwell after clicking new-session (D2).
    pub session_dwell: Duration,
    /// Settle dwell once the input is ready (D3).
    pub input_settle: Duration,
    /// Dwell after filling the input (D4).
    pub compose_dwell: Duration,

    /// Bound on waiting for the input to become visible and enabled (T1).
    pub input_ready_timeout: Duration,
    /// Bound on the navigation network-idle wait.
    pub navigation_timeout: Duration,
    /// Window in which no new resource requests must land for navigation
    /// to count as settled.
    pub network_quiet_window: Duration,
    /// Bound on waiting for the response to finish streaming.
    pub response_timeout: Duration,

    /// Where the final screenshot is written.
    pub screenshot_path: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000/opencode-client.html".to_string(),
            headless: true,
            connect_label: "connect".to_string(),
            new_session_label: "new session".to_string(),
            send_label: "send".to_string(),
            input_selector: "textarea".to_string(),
            message: "list desktop files".to_string(),
            connect_dwell: Duration::from_secs(2),
            session_dwell: Duration::from_secs(3),
            input_settle: Duration::from_millis(500),
            compose_dwell: Duration::from_millis(500),
            input_ready_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(15),
            network_quiet_window: Duration::from_millis(500),
            response_timeout: Duration::from_secs(20),
            screenshot_path: "test_result.png".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults with `CHAT_SMOKE_URL`, `CHAT_SMOKE_SCREENSHOT` and
    /// `CHAT_SMOKE_HEADED` applied on top.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CHAT_SMOKE_URL") {
            config.url = url;
        }
        if let Ok(path) = std::env::var("CHAT_SMOKE_SCREENSHOT") {
            config.screenshot_path = path;
        }
        if std::env::var("CHAT_SMOKE_HEADED").is_ok() {
            config.headless = false;
        }
        config
    }
}
