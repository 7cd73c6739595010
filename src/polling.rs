//! Generic polling loop trait and runner.
//!
//! The loop never runs two iterations at once: each tick awaits the previous
//! iteration, and ticks missed while an iteration was running are delayed
//! rather than bunched up.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a single processing iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    /// New rows were buffered.
    ProcessedItems,
    /// Nothing new this time.
    NoItems,
    /// Shutdown was requested.
    Shutdown,
}

/// A processor driven by [`run_polling_loop`].
#[allow(async_fn_in_trait)]
pub trait PollingProcessor {
    /// The error type for this processor.
    type Error: std::error::Error;

    /// Run one iteration.
    ///
    /// # Arguments
    /// * `cold_start` - True on the first iteration
    async fn process(&mut self, cold_start: bool) -> Result<IterationResult, Self::Error>;
}

/// Call `processor.process` every `poll_interval` until `shutdown` is
/// cancelled or the processor returns [`IterationResult::Shutdown`].
///
/// The first iteration runs immediately. An error from the processor ends
/// the loop and is returned.
pub async fn run_polling_loop<P: PollingProcessor>(
    processor: &mut P,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), P::Error> {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cold_start = true;

    loop {
        if shutdown.run_until_cancelled(ticker.tick()).await.is_none() {
            info!("Shutdown requested during poll wait");
            break;
        }

        let result = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Shutdown requested during processing");
                IterationResult::Shutdown
            }

            result = processor.process(cold_start) => result?,
        };
        cold_start = false;

        match result {
            IterationResult::Shutdown => break,
            IterationResult::NoItems => {
                debug!(interval_ms = poll_interval.as_millis(), "No new rows");
            }
            IterationResult::ProcessedItems => {}
        }
    }

    Ok(())
}
