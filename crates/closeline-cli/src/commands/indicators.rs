use closeline_core::{MarketService, Symbol};
use serde_json::json;

use crate::cli::{CorrelationArgs, RsiArgs};
use crate::error::CliError;

use super::CommandResult;

pub async fn rsi(args: &RsiArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let rsi = service.indicators().rsi(&symbol, args.period, args.days).await;
    let last = rsi.values.last().copied();

    let data = json!({
        "ticker": symbol,
        "period": rsi.period,
        "last": last,
        "values": rsi.values,
    });
    Ok(CommandResult::ok(data))
}

pub async fn correlation(args: &CorrelationArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let table = service.indicators().correlation(&symbol, args.days).await;
    Ok(CommandResult::ok(serde_json::to_value(table)?))
}
