//! CLI argument definitions for closeline.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `series` | Canonical daily closes as `{dates, closes}` |
//! | `quote` | Live price pinned to the last settled close |
//! | `stats` | 52-week high/low |
//! | `earnings` | Next earnings date |
//! | `dividends` | Most recent dividend |
//! | `breadth` | Market breadth indicators |
//! | `rsi` | Wilder RSI |
//! | `correlation` | Return correlation against benchmarks |
//! | `feed` | Periodic quotes as NDJSON |
//!
//! # Examples
//!
//! ```bash
//! closeline series AAPL --days 30 --pretty
//! closeline quote AAPL MSFT BTC-USD
//! closeline feed AAPL --interval-secs 15 --count 4
//! ```

use clap::{Args, Parser, Subcommand};

/// Multi-provider daily closes with one canonical calendar.
#[derive(Debug, Parser)]
#[command(
    name = "closeline",
    author,
    version,
    about = "Multi-provider daily series and quotes on one canonical calendar"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Canonical daily close series.
    Series(SeriesArgs),
    /// Quote one or more symbols.
    Quote(QuoteArgs),
    /// 52-week high and low.
    Stats(SymbolArgs),
    /// Next earnings date within 90 days.
    Earnings(SymbolArgs),
    /// Most recent dividend.
    Dividends(SymbolArgs),
    /// VIX, TNX, SPY, XLK and XLF snapshot.
    Breadth,
    /// Wilder RSI over the canonical series.
    Rsi(RsiArgs),
    /// Correlation of daily returns against SPY, XLK, XLF, VIX and TNX.
    Correlation(CorrelationArgs),
    /// Stream quotes periodically as NDJSON.
    Feed(FeedArgs),
}

#[derive(Debug, Args)]
pub struct SymbolArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    pub symbol: String,

    /// Trading days to return (clamped to 2..=1825).
    #[arg(long, default_value_t = 30)]
    pub days: i64,
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    /// Concurrent quote derivations when several symbols are given.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Overall budget in seconds when several symbols are given.
    #[arg(long, default_value_t = 12)]
    pub budget_secs: u64,
}

#[derive(Debug, Args)]
pub struct RsiArgs {
    pub symbol: String,

    #[arg(long, default_value_t = 14)]
    pub period: usize,

    #[arg(long, default_value_t = 100)]
    pub days: i64,
}

#[derive(Debug, Args)]
pub struct CorrelationArgs {
    pub symbol: String,

    #[arg(long, default_value_t = 60)]
    pub days: i64,
}

#[derive(Debug, Args)]
pub struct FeedArgs {
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,

    #[arg(long, default_value_t = 30)]
    pub interval_secs: u64,

    /// Stop after this many events; runs until interrupted when omitted.
    #[arg(long)]
    pub count: Option<usize>,
}
