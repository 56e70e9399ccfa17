use closeline_core::{MarketService, Symbol};

use crate::cli::SymbolArgs;
use crate::error::CliError;

use super::CommandResult;

pub async fn earnings(args: &SymbolArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let info = service.reference().earnings(&symbol).await?;
    Ok(CommandResult::ok(serde_json::to_value(info)?))
}

pub async fn dividends(args: &SymbolArgs, service: &MarketService) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let info = service.reference().dividends(&symbol).await?;
    Ok(CommandResult::ok(serde_json::to_value(info)?))
}

pub async fn breadth(service: &MarketService) -> Result<CommandResult, CliError> {
    let breadth = service.reference().market_breadth().await?;
    Ok(CommandResult::ok(serde_json::to_value(breadth)?))
}
