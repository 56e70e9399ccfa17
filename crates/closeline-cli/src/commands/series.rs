use closeline_core::{MarketService, Symbol};

use crate::cli::{SeriesArgs, SymbolArgs};
use crate::error::CliError;

use super::CommandResult;

pub async fn run(args: &SeriesArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let resolution = service.series().resolve_detailed(&symbol, args.days).await;

    let warnings = resolution
        .attempts
        .iter()
        .map(|attempt| format!("{} skipped: {}", attempt.provider, attempt.error))
        .collect();
    let data = serde_json::to_value(resolution.series.to_columns())?;

    Ok(CommandResult::ok(data)
        .with_source(resolution.selected)
        .with_warnings(warnings))
}

pub async fn stats(args: &SymbolArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let stats = service.stats().stats_52w(&symbol).await;
    Ok(CommandResult::ok(serde_json::to_value(stats)?))
}
