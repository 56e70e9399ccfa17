//! Periodic quote push over a bounded channel.
//!
//! The producer task owns its interval timer. It stops when the handle is
//! cancelled or when the receiver is dropped, whichever comes first.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::ResolveError;
use crate::resolver::QuoteResolver;
use crate::{Quote, Symbol};

const CHANNEL_CAPACITY: usize = 64;
const MIN_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Quote(Quote),
    Failed { symbol: Symbol, error: ResolveError },
}

/// Controls a running feed.
#[derive(Debug)]
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Stops the producer and waits for it to exit.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            debug!(%error, "feed task did not exit cleanly");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct QuoteFeed;

impl QuoteFeed {
    /// Emits one event per symbol on every tick, starting immediately.
    pub fn spawn(
        resolver: QuoteResolver,
        symbols: Vec<Symbol>,
        period: Duration,
    ) -> (FeedHandle, mpsc::Receiver<FeedEvent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(MIN_PERIOD));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tx.closed() => break,
                    _ = interval.tick() => {}
                }

                let emit = async {
                    for symbol in &symbols {
                        let event = match resolver.quote(symbol).await {
                            Ok(quote) => FeedEvent::Quote(quote),
                            Err(error) => FeedEvent::Failed {
                                symbol: symbol.clone(),
                                error,
                            },
                        };
                        if tx.send(event).await.is_err() {
                            return false;
                        }
                    }
                    true
                };

                let keep_going = tokio::select! {
                    _ = stop.changed() => false,
                    sent = emit => sent,
                };
                if !keep_going {
                    break;
                }
            }
            debug!("quote feed stopped");
        });

        (FeedHandle { shutdown, task }, rx)
    }
}
