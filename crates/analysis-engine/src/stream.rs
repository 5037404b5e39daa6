//! Live quote stream lifecycle: connect, read, reconnect on drop.

use market_core::{LiveQuote, QuoteFeed};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Drive a live quote subscription for one symbol until `shutdown` fires.
///
/// Connection drops, read errors and connect failures all schedule another
/// attempt after a fixed `backoff` — indefinitely, with no retry cap. The
/// shutdown signal is armed against the connect call, the read loop and the
/// pending backoff timer, so a teardown can never race a reconnect. Stream
/// failures stay in here: they are logged and retried, never published.
pub async fn run_quote_stream(
    feed: Arc<dyn QuoteFeed>,
    symbol: String,
    backoff: Duration,
    shutdown: Arc<Notify>,
    apply: impl Fn(LiveQuote) + Send + 'static,
) {
    loop {
        let mut connection = tokio::select! {
            connected = feed.connect(&symbol) => match connected {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::warn!("Quote stream connect for {} failed: {}", symbol, e);
                    if !sleep_or_shutdown(backoff, &shutdown).await {
                        return;
                    }
                    continue;
                }
            },
            _ = shutdown.notified() => return,
        };

        tracing::debug!("Quote stream for {} connected", symbol);
        loop {
            tokio::select! {
                tick = connection.next_quote() => match tick {
                    Some(Ok(quote)) => apply(quote),
                    Some(Err(e)) => {
                        tracing::warn!("Quote stream error for {}: {}", symbol, e);
                        break;
                    }
                    None => {
                        tracing::info!("Quote stream for {} closed, reconnecting in {:?}", symbol, backoff);
                        break;
                    }
                },
                _ = shutdown.notified() => return,
            }
        }

        if !sleep_or_shutdown(backoff, &shutdown).await {
            return;
        }
    }
}

/// Wait out the reconnect backoff. Returns false if shutdown fired first.
async fn sleep_or_shutdown(backoff: Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(backoff) => true,
        _ = shutdown.notified() => false,
    }
}
