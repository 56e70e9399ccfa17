use std::time::Duration;

use closeline_core::{FeedEvent, MarketService, Symbol};
use serde_json::json;
use tracing::info;

use crate::cli::FeedArgs;
use crate::error::CliError;
use crate::output;

/// Prints one NDJSON line per event until `--count` events or Ctrl-C.
pub async fn run(args: &FeedArgs, service: &MarketService) -> Result<(), CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let (handle, mut events) = service.feed(symbols, Duration::from_secs(args.interval_secs));

    let mut emitted = 0_usize;
    let outcome = loop {
        if args.count.is_some_and(|limit| emitted >= limit) {
            break Ok(());
        }
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.recv() => event,
        };
        let Some(event) = event else {
            break Ok(());
        };

        let line = match event {
            FeedEvent::Quote(quote) => json!({ "event": "quote", "quote": quote }),
            FeedEvent::Failed { symbol, error } => json!({
                "event": "failed",
                "symbol": symbol,
                "code": error.code(),
                "message": error.to_string(),
            }),
        };
        if let Err(error) = output::render_line(&line) {
            break Err(error);
        }
        emitted += 1;
    };

    handle.cancel().await;
    info!(emitted, "feed finished");
    outcome
}
