mod feed;
mod indicators;
mod quote;
mod reference;
mod series;

use std::time::Instant;

use closeline_core::{MarketService, ProviderId};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::output::{Envelope, EnvelopeError, EnvelopeMeta};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub source_chain: Vec<ProviderId>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            source_chain: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: Option<ProviderId>) -> Self {
        self.source_chain.extend(source);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

/// Runs the selected command. Streaming commands write their own output
/// and return `None`.
pub async fn run(cli: &Cli, service: &MarketService) -> Result<Option<Envelope>, CliError> {
    let started = Instant::now();

    let command_result = match &cli.command {
        Command::Series(args) => series::run(args, service).await?,
        Command::Stats(args) => series::stats(args, service).await?,
        Command::Quote(args) => quote::run(args, service).await?,
        Command::Earnings(args) => reference::earnings(args, service).await?,
        Command::Dividends(args) => reference::dividends(args, service).await?,
        Command::Breadth => reference::breadth(service).await?,
        Command::Rsi(args) => indicators::rsi(args, service).await?,
        Command::Correlation(args) => indicators::correlation(args, service).await?,
        Command::Feed(args) => {
            feed::run(args, service).await?;
            return Ok(None);
        }
    };

    let CommandResult {
        data,
        warnings,
        errors,
        source_chain,
    } = command_result;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    Ok(Some(Envelope {
        meta: EnvelopeMeta::new(source_chain, latency_ms, warnings),
        data,
        errors,
    }))
}
