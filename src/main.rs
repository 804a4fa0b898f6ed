//! chat-smoke — end-to-end smoke harness for a chat-style web client.
//!
//! Drives a real Chromium through the client's session flow (connect, new
//! session, compose, send) and verifies the response completes within a
//! bounded window, capturing console output and a final screenshot along the
//! way. Any step failure aborts the run and exits non-zero with no artifacts.

mod browser;
mod capture;
mod config;
mod console;
mod driver;
mod error;
mod sequencer;


use browser::BrowserSession;
use config::HarnessConfig;
use driver::PageDriver;
use error::HarnessError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), HarnessError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_smoke=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HarnessConfig::from_env();
    let session = BrowserSession::launch(&config).await?;

    // The browser is released exactly once, on success and failure alike.
    let outcome = drive(&session, &config).await;
    session.close().await;
    outcome
}

async fn drive(session: &BrowserSession, config: &HarnessConfig) -> Result<(), HarnessError> {
    let driver = PageDriver::new(session.page());
    driver
        .navigate(
            &config.url,
            config.navigation_timeout,
            config.network_quiet_window,
        )
        .await?;
    sequencer::run(&driver, config).await?;
    capture::capture(&driver, session.console(), config).await
}
