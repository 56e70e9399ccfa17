use std::time::Duration;

use closeline_core::{FanOutPolicy, MarketService, Symbol};

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

pub async fn run(args: &QuoteArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    if let [symbol] = symbols.as_slice() {
        let quote = service.quotes().quote(symbol).await?;
        let source = quote.price_source;
        return Ok(CommandResult::ok(serde_json::to_value(quote)?).with_source(source));
    }

    let policy = FanOutPolicy {
        max_concurrency: args.concurrency,
        budget: Duration::from_secs(args.budget_secs),
        ..FanOutPolicy::default()
    };
    let report = service.quotes().quote_many(symbols, policy).await;

    let errors = report
        .failed
        .iter()
        .map(|failure| EnvelopeError {
            code: failure.code.to_owned(),
            message: failure.message.clone(),
            symbol: Some(failure.symbol.to_string()),
        })
        .collect();
    let warnings = report
        .timed_out
        .iter()
        .map(|symbol| format!("{symbol} timed out"))
        .collect();
    let mut sources = report
        .quotes
        .iter()
        .filter_map(|quote| quote.price_source)
        .collect::<Vec<_>>();
    sources.sort();
    sources.dedup();

    let mut result = CommandResult::ok(serde_json::to_value(&report)?)
        .with_errors(errors)
        .with_warnings(warnings);
    result.source_chain = sources;
    Ok(result)
}
