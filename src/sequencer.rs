//! Interaction state machine
//!
//! Fixed linear sequence: connect, create a session, wait for the input to
//! come alive, compose, send, await the response. Each state performs its
//! outgoing action against the page and yields its successor; any bounded
//! wait that expires aborts the run immediately with no retry.

use std::time::Duration;
use tokio::time::sleep;

use crate::config::HarnessConfig;
use crate::driver::PageDriver;
use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Connecting,
    SessionCreating,
    AwaitingInputReady,
    Composing,
    Sending,
    AwaitingResponse,
    Done,
    TimedOut,
}

impl SequencerState {
    /// Successor in the fixed sequence. Terminal states map to themselves.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::Connecting,
            Self::Connecting => Self::SessionCreating,
            Self::SessionCreating => Self::AwaitingInputReady,
            Self::AwaitingInputReady => Self::Composing,
            Self::Composing => Self::Sending,
            Self::Sending => Self::AwaitingResponse,
            Self::AwaitingResponse => Self::Done,
            Self::Done => Self::Done,
            Self::TimedOut => Self::TimedOut,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::TimedOut)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::SessionCreating => "session_creating",
            Self::AwaitingInputReady => "awaiting_input_ready",
            Self::Composing => "composing",
            Self::Sending => "sending",
            Self::AwaitingResponse => "awaiting_response",
            Self::Done => "done",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Terminal state a failure lands in, if the machine defines one for it. An
/// expired response window is the only failure with its own terminal state;
/// everything else aborts the sequence in place.
fn failure_state(err: &HarnessError) -> Option<SequencerState> {
    match err {
        HarnessError::ResponseTimeout(_) => Some(SequencerState::TimedOut),
        _ => None,
    }
}

/// Drive the sequence until `Done`; a stalled response lands in `TimedOut`
/// first, then the error propagates out unchanged. Any other failed action
/// or expired wait aborts immediately.
pub async fn run(driver: &PageDriver<'_>, config: &HarnessConfig) -> Result<(), HarnessError> {
    let mut state = SequencerState::Idle;
    while !state.is_terminal() {
        state = match step(driver, config, state).await {
            Ok(next) => next,
            Err(e) => {
                if let Some(terminal) = failure_state(&e) {
                    state = terminal;
                    tracing::warn!(state = state.name(), "Response stalled");
                }
                return Err(e);
            }
        };
        tracing::info!(state = state.name(), "Sequencer advanced");
    }
    Ok(())
}

async fn step(
    driver: &PageDriver<'_>,
    config: &HarnessConfig,
    state: SequencerState,
) -> Result<SequencerState, HarnessError> {
    match state {
        SequencerState::Idle => {
            driver.click_text(&config.connect_label).await?;
            dwell(config.connect_dwell).await;
        }
        SequencerState::Connecting => {
            driver.click_text(&config.new_session_label).await?;
            dwell(config.session_dwell).await;
        }
        SequencerState::SessionCreating => {
            driver
                .wait_for_ready(&config.input_selector, config.input_ready_timeout)
                .await?;
            dwell(config.input_settle).await;
        }
        SequencerState::AwaitingInputReady => {
            driver.fill(&config.input_selector, &config.message).await?;
            dwell(config.compose_dwell).await;
        }
        SequencerState::Composing => {
            driver.click_text(&config.send_label).await?;
        }
        SequencerState::Sending => {
            // The client disables its send control while the response is
            // streaming; re-enablement is the completion signal.
            driver
                .wait_for_enabled(&config.send_label, config.response_timeout)
                .await?;
        }
        SequencerState::AwaitingResponse => {}
        SequencerState::Done | SequencerState::TimedOut => {}
    }
    Ok(state.next())
}

async fn dwell(duration: Duration) {
    sleep(duration).await;
}
