//! Behavior-driven tests for canonical series resolution.
//!
//! These tests verify which provider wins, how the session clock shapes the
//! final bar, and that repeated reads of the same snapshot agree.

use std::sync::Arc;
use std::time::Duration;

use closeline_core::testing::StubSource;
use closeline_core::{
    DataSource, FixedClock, MarketHours, ProviderId, ResolveError, ResolverPolicy, SeriesResolver,
    SourceError, SourceRegistry, Symbol,
};
use time::macros::{date, datetime};
use time::{OffsetDateTime, Weekday};

// Wednesday 2024-01-10 in New York: 10:30 (open) and 17:00 (closed).
const DURING_SESSION: OffsetDateTime = datetime!(2024-01-10 15:30 UTC);
const AFTER_CLOSE: OffsetDateTime = datetime!(2024-01-10 22:00 UTC);

fn resolver_at(now: OffsetDateTime, sources: Vec<Arc<dyn DataSource>>) -> SeriesResolver {
    SeriesResolver::new(
        Arc::new(SourceRegistry::new(sources)),
        Arc::new(ResolverPolicy::default()),
        Arc::new(FixedClock::new(now)),
        MarketHours::default(),
    )
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

const THREE_DAYS: [(&str, f64); 3] = [("2024-01-08", 100.0), ("2024-01-09", 101.0), ("2024-01-10", 102.0)];

// =============================================================================
// Provider fallback
// =============================================================================

#[tokio::test]
async fn when_primary_times_out_the_secondary_series_is_returned() {
    // Given: Yahoo fails with a timeout and Twelve Data has three bars
    let primary = Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::unavailable("timed out")));
    let secondary = Arc::new(StubSource::new(ProviderId::TwelveData).with_bars(&THREE_DAYS));
    let resolver = resolver_at(AFTER_CLOSE, vec![primary.clone(), secondary]);

    // When: Five days are requested after the close
    let resolution = resolver.resolve_detailed(&symbol("AAPL"), 5).await;

    // Then: All three bars come from Twelve Data and the timeout is recorded
    assert_eq!(resolution.selected, Some(ProviderId::TwelveData));
    assert_eq!(resolution.series.closes(), vec![100.0, 101.0, 102.0]);
    assert_eq!(resolution.attempts.len(), 1);
    assert_eq!(resolution.attempts[0].provider, ProviderId::Yahoo);
    assert_eq!(primary.series_calls(), 1);
}

#[tokio::test]
async fn when_session_is_open_todays_partial_bar_is_dropped() {
    // Given: The same three bars, with the market open on 2024-01-10
    let resolver = resolver_at(
        DURING_SESSION,
        vec![Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&THREE_DAYS))],
    );

    // When: The series is resolved
    let series = resolver.resolve(&symbol("AAPL"), 5).await;

    // Then: Only settled closes remain
    assert_eq!(series.dates(), vec![date!(2024 - 01 - 08), date!(2024 - 01 - 09)]);
}

#[tokio::test]
async fn when_secondary_is_slow_but_succeeds_it_still_wins() {
    // Given: A failing primary and a secondary that takes a while
    let resolver = resolver_at(
        AFTER_CLOSE,
        vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::unavailable("timed out"))),
            Arc::new(
                StubSource::new(ProviderId::TwelveData)
                    .with_bars(&THREE_DAYS)
                    .with_delay(Duration::from_millis(20)),
            ),
        ],
    );

    // When / Then: The slow answer is used as-is
    assert_eq!(resolver.resolve(&symbol("AAPL"), 5).await.len(), 3);
}

#[tokio::test]
async fn when_every_provider_fails_chart_mode_returns_empty() {
    // Given: No provider knows the symbol
    let resolver = resolver_at(
        AFTER_CLOSE,
        vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::no_data("unknown"))),
            Arc::new(StubSource::new(ProviderId::TwelveData).failing(SourceError::no_data("unknown"))),
            Arc::new(StubSource::new(ProviderId::Finnhub).failing(SourceError::no_data("unknown"))),
        ],
    );

    // When: Both modes are used
    let series = resolver.resolve(&symbol("ZZZZ"), 30).await;
    let required = resolver.resolve_required(&symbol("ZZZZ"), 30).await;

    // Then: Chart mode is empty and strict mode reports missing data
    assert!(series.is_empty());
    assert!(series.to_columns().is_empty());
    assert_eq!(required, Err(ResolveError::no_data("ZZZZ")));
}

#[tokio::test]
async fn when_registered_providers_are_missing_they_fail_silently() {
    // Given: Only Finnhub is configured
    let resolver = resolver_at(
        AFTER_CLOSE,
        vec![Arc::new(StubSource::new(ProviderId::Finnhub).with_bars(&THREE_DAYS))],
    );

    // When: The equity chain runs
    let resolution = resolver.resolve_detailed(&symbol("AAPL"), 5).await;

    // Then: Yahoo and Twelve Data are skipped as not registered
    assert_eq!(resolution.selected, Some(ProviderId::Finnhub));
    let codes = resolution.attempts.iter().map(|a| a.error.code()).collect::<Vec<_>>();
    assert_eq!(codes, vec!["source.not_registered", "source.not_registered"]);
}

// =============================================================================
// Calendar rules
// =============================================================================

#[tokio::test]
async fn crypto_series_keep_weekends_and_todays_bar() {
    // Given: A full week of crypto closes, including the weekend and today
    let week = [
        ("2024-01-04", 1.0),
        ("2024-01-05", 2.0),
        ("2024-01-06", 3.0),
        ("2024-01-07", 4.0),
        ("2024-01-08", 5.0),
        ("2024-01-09", 6.0),
        ("2024-01-10", 7.0),
    ];
    let resolver = resolver_at(
        DURING_SESSION,
        vec![Arc::new(StubSource::new(ProviderId::TwelveData).with_bars(&week))],
    );

    // When: Seven days are requested while equity markets are open
    let series = resolver.resolve(&symbol("BTC-USD"), 7).await;

    // Then: Every calendar day survives
    assert_eq!(series.len(), 7);
    assert_eq!(series.last().map(|bar| bar.date), Some(date!(2024 - 01 - 10)));
}

#[tokio::test]
async fn equity_series_never_contain_weekends_and_respect_the_window() {
    // Given: Two weeks of daily bars including Saturdays and Sundays
    let rows = (1..=14)
        .map(|day| (format!("2024-01-{day:02}"), f64::from(day)))
        .collect::<Vec<_>>();
    let borrowed = rows.iter().map(|(d, c)| (d.as_str(), *c)).collect::<Vec<_>>();
    let resolver = resolver_at(
        datetime!(2024-01-15 22:00 UTC),
        vec![Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&borrowed))],
    );

    for days in [2_i64, 5, 8, 30] {
        // When: Various windows are requested
        let series = resolver.resolve(&symbol("MSFT"), days).await;

        // Then: No weekend dates, strictly ascending, at most N bars
        assert!(series.len() <= usize::try_from(days).expect("positive"));
        assert!(series
            .dates()
            .iter()
            .all(|date| !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)));
        assert!(series.dates().windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[tokio::test]
async fn resolving_the_same_snapshot_twice_is_identical() {
    // Given: A fixed clock and fixed provider data
    let resolver = resolver_at(
        DURING_SESSION,
        vec![Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&THREE_DAYS))],
    );

    // When: The series is resolved twice
    let first = resolver.resolve(&symbol("AAPL"), 10).await;
    let second = resolver.resolve(&symbol("AAPL"), 10).await;

    // Then: Both results agree exactly
    assert_eq!(first, second);
}

#[tokio::test]
async fn rate_limited_chain_is_reported_in_strict_mode() {
    // Given: The only crypto providers are throttled or down
    let resolver = resolver_at(
        AFTER_CLOSE,
        vec![
            Arc::new(StubSource::new(ProviderId::TwelveData).failing(SourceError::rate_limited("429"))),
            Arc::new(StubSource::new(ProviderId::Finnhub).failing(SourceError::unavailable("503"))),
        ],
    );

    // When: Strict mode is used
    let error = resolver
        .resolve_required(&symbol("ETH-USD"), 10)
        .await
        .expect_err("every provider failed");

    // Then: The rate limit surfaces as a retryable failure
    assert_eq!(error, ResolveError::rate_limited("ETH-USD"));
    assert!(error.retryable());
    assert_eq!(error.status_hint(), 503);
}
