//! Page interaction primitives
//!
//! All interaction goes through JavaScript evaluation in the page context:
//! locating controls by visible text, filling the input, and probing
//! enabled/visible state. Each call is awaited to completion before the next
//! one is issued, so harness actions never overlap.

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::error::HarnessError;

/// Interval between predicate probes.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct PageDriver<'a> {
    page: &'a Page,
}

impl<'a> PageDriver<'a> {
    pub fn new(page: &'a Page) -> Self {
        Self { page }
    }

    async fn eval_bool(&self, script: String) -> Result<bool, HarnessError> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().and_then(serde_json::Value::as_bool) == Some(true))
    }

    /// Navigate and block until the network-idle heuristic is met: document
    /// fully loaded and no new resource fetches within the quiet window.
    pub async fn navigate(
        &self,
        url: &str,
        timeout: Duration,
        quiet_window: Duration,
    ) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || HarnessError::NavigationTimeout {
            url: url.to_string(),
            timeout,
        };

        tracing::info!(url, "Navigating");
        tokio::time::timeout_at(deadline, self.page.goto(url))
            .await
            .map_err(|_| timed_out())??;

        let mut last_count: Option<u64> = None;
        let mut stable_since = Instant::now();

        loop {
            if Instant::now() >= deadline {
                return Err(timed_out());
            }

            // The evaluate itself is held to the deadline, and a failed probe
            // (renderer mid-navigation, transient "cannot find context") counts
            // as not-settled rather than aborting the wait.
            let result = match tokio::time::timeout_at(deadline, self.page.evaluate(settle_script()))
                .await
            {
                Err(_) => return Err(timed_out()),
                Ok(Err(e)) => {
                    tracing::debug!(url, "Settle probe failed, re-polling: {e}");
                    sleep(POLL_INTERVAL).await;
                    continue;
                }
                Ok(Ok(result)) => result,
            };

            // The probe returns JSON.stringify output; primitives round-trip
            // through CDP reliably where bare objects may come back as
            // previews only.
            let settled = result
                .value()
                .and_then(serde_json::Value::as_str)
                .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
                .and_then(|v| {
                    let complete = v.get("complete")?.as_bool()?;
                    let resources = v.get("resources")?.as_u64()?;
                    Some((complete, resources))
                });

            if let Some((complete, resources)) = settled {
                if last_count != Some(resources) {
                    last_count = Some(resources);
                    stable_since = Instant::now();
                }
                if complete && stable_since.elapsed() >= quiet_window {
                    tracing::debug!(url, resources, "Navigation settled");
                    return Ok(());
                }
            }

            sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the first button-like control whose visible text contains
    /// `label` (case-insensitive).
    pub async fn click_text(&self, label: &str) -> Result<(), HarnessError> {
        if self.eval_bool(click_script(label)).await? {
            Ok(())
        } else {
            Err(HarnessError::ElementNotFound(label.to_string()))
        }
    }

    /// Set the value of the control at `selector` and fire input/change
    /// events so the client's own listeners observe the edit.
    pub async fn fill(&self, selector: &str, text: &str) -> Result<(), HarnessError> {
        if self.eval_bool(fill_script(selector, text)).await? {
            Ok(())
        } else {
            Err(HarnessError::ElementNotFound(selector.to_string()))
        }
    }

    /// Block until the control at `selector` is both visible and enabled.
    pub async fn wait_for_ready(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || HarnessError::ElementTimeout {
            what: selector.to_string(),
            timeout,
        };
        loop {
            match tokio::time::timeout_at(deadline, self.eval_bool(ready_script(selector))).await {
                Err(_) => return Err(timed_out()),
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(timed_out());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Block until the text-located control is enabled again. The client
    /// disables its send control while a response is streaming, so
    /// re-enablement marks completion.
    pub async fn wait_for_enabled(
        &self,
        label: &str,
        timeout: Duration,
    ) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.eval_bool(enabled_script(label))).await {
                Err(_) => return Err(HarnessError::ResponseTimeout(timeout)),
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::ResponseTimeout(timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Full-page PNG screenshot written to `path`.
    pub async fn screenshot(&self, path: &str) -> Result<(), HarnessError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        let png = self.page.screenshot(params).await?;
        tokio::fs::write(path, &png).await?;
        tracing::info!(path, bytes = png.len(), "Screenshot written");
        Ok(())
    }
}

const BUTTON_QUERY: &str = "button, [role='button'], input[type='submit'], input[type='button']";

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn find_control_js(label: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({query})).find(el => \
         ((el.textContent || el.value || '').trim().toLowerCase().includes({label})))",
        query = js_string(BUTTON_QUERY),
        label = js_string(&label.to_lowercase()),
    )
}

fn click_script(label: &str) -> String {
    format!(
        "(() => {{ const el = {find}; if (!el) return false; el.click(); return true; }})()",
        find = find_control_js(label),
    )
}

fn enabled_script(label: &str) -> String {
    format!(
        "(() => {{ const el = {find}; return !!el && !el.disabled; }})()",
        find = find_control_js(label),
    )
}

fn fill_script(selector: &str, text: &str) -> String {
    format!(
        "(() => {{ \
           const el = document.querySelector({sel}); \
           if (!el) return false; \
           el.value = {text}; \
           el.dispatchEvent(new Event('input', {{bubbles: true}})); \
           el.dispatchEvent(new Event('change', {{bubbles: true}})); \
           return true; \
         }})()",
        sel = js_string(selector),
        text = js_string(text),
    )
}

fn ready_script(selector: &str) -> String {
    format!(
        "(() => {{ \
           const el = document.querySelector({sel}); \
           if (!el || el.disabled) return false; \
           const style = window.getComputedStyle(el); \
           return style.display !== 'none' && style.visibility !== 'hidden'; \
         }})()",
        sel = js_string(selector),
    )
}

fn settle_script() -> String {
    "JSON.stringify({ complete: document.readyState === 'complete', \
        resources: performance.getEntriesByType('resource').length })"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_script_lowercases_and_quotes_label() {
        let script = click_script("New Session");
        assert!(script.contains("\"new session\""));
        assert!(script.contains("el.click()"));
    }

    #[test]
    fn fill_script_escapes_message_text() {
        let script = fill_script("textarea", "say \"hi\"\nplease");
        assert!(script.contains("\"textarea\""));
        // serde_json string escaping keeps the script a single valid expression
        assert!(script.contains(r#""say \"hi\"\nplease""#));
    }

    #[test]
    fn ready_script_checks_disabled_and_visibility() {
        let script = ready_script("textarea");
        assert!(script.contains("el.disabled"));
        assert!(script.contains("getComputedStyle"));
    }

    #[test]
    fn enabled_script_targets_text_located_control() {
        let script = enabled_script("send");
        assert!(script.contains("\"send\""));
        assert!(script.contains("!el.disabled"));
    }
}
