//! Behavior-driven tests for quotes derived from the canonical series.
//!
//! A quote's last close must always match the final bar a chart shows for
//! the same symbol, whatever the live-price provider reports.

use std::sync::Arc;
use std::time::Duration;

use closeline_core::testing::StubSource;
use closeline_core::{
    DataSource, FanOutPolicy, FeedEvent, FixedClock, MarketHours, ProviderId, QuoteFeed,
    QuoteResolver, ResolveError, ResolverPolicy, SeriesResolver, SourceError, SourceRegistry,
    Symbol,
};
use time::macros::datetime;
use time::OffsetDateTime;

fn quotes_at(now: OffsetDateTime, sources: Vec<Arc<dyn DataSource>>) -> QuoteResolver {
    QuoteResolver::new(SeriesResolver::new(
        Arc::new(SourceRegistry::new(sources)),
        Arc::new(ResolverPolicy::default()),
        Arc::new(FixedClock::new(now)),
        MarketHours::default(),
    ))
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

const BARS: [(&str, f64); 3] = [("2024-01-08", 100.0), ("2024-01-09", 101.0), ("2024-01-10", 102.0)];

#[tokio::test]
async fn quote_last_close_matches_the_two_day_chart() {
    for now in [datetime!(2024-01-10 15:30 UTC), datetime!(2024-01-10 22:00 UTC)] {
        // Given: A live provider whose own previous close disagrees with the series
        let resolver = quotes_at(
            now,
            vec![
                Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&BARS)),
                Arc::new(StubSource::new(ProviderId::Finnhub).with_symbol_price("AAPL", 103.0, Some(90.0))),
            ],
        );

        // When: The quote and a two-day chart are both produced
        let quote = resolver.quote(&symbol("AAPL")).await.expect("quote");
        let chart = resolver.series().resolve(&symbol("AAPL"), 2).await;

        // Then: The quote's last close is the chart's final close
        let last = chart.last().expect("chart has bars");
        assert_eq!(quote.last_close, last.close);
        assert_eq!(quote.last_close_date, last.date);
        assert_eq!(quote.current_price, 103.0);
    }
}

#[tokio::test]
async fn open_session_pins_the_quote_to_yesterdays_close() {
    // Given: The market is open on the day of the final bar
    let resolver = quotes_at(
        datetime!(2024-01-10 15:30 UTC),
        vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&BARS)),
            Arc::new(StubSource::new(ProviderId::Finnhub).with_price(102.0)),
        ],
    );

    // When: The quote is derived
    let quote = resolver.quote(&symbol("AAPL")).await.expect("quote");

    // Then: Change is measured against the settled close, not today's partial bar
    assert_eq!(quote.last_close, 101.0);
    assert_eq!(quote.change_pct, 0.99);
}

#[tokio::test]
async fn unknown_symbol_quote_is_no_data() {
    // Given: Every provider reports no data
    let resolver = quotes_at(
        datetime!(2024-01-10 22:00 UTC),
        vec![Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::no_data("unknown")))],
    );

    // When / Then: The quote fails with NoDataAvailable
    let error = resolver.quote(&symbol("ZZZZ")).await.expect_err("no data");
    assert_eq!(error, ResolveError::no_data("ZZZZ"));
    assert_eq!(error.status_hint(), 502);
}

#[tokio::test]
async fn live_quote_chain_falls_through_in_priority_order() {
    // Given: Finnhub fails and Twelve Data answers; Alpha Vantage is never needed
    let alpha = Arc::new(StubSource::new(ProviderId::AlphaVantage).with_price(1.0));
    let resolver = quotes_at(
        datetime!(2024-01-10 22:00 UTC),
        vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&BARS)),
            Arc::new(StubSource::new(ProviderId::Finnhub).failing_quotes(SourceError::rate_limited("429"))),
            Arc::new(StubSource::new(ProviderId::TwelveData).with_price(104.04)),
            alpha.clone(),
        ],
    );

    // When: The quote is derived
    let quote = resolver.quote(&symbol("AAPL")).await.expect("quote");

    // Then: Twelve Data supplied the price
    assert_eq!(quote.price_source, Some(ProviderId::TwelveData));
    assert_eq!(quote.change_pct, 2.0);
    assert_eq!(alpha.quote_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fan_out_returns_partial_results_within_budget() {
    // Given: One fast symbol and one whose series provider hangs
    let fast = StubSource::new(ProviderId::Yahoo).with_symbol_bars("AAPL", &BARS);
    let slow = StubSource::new(ProviderId::TwelveData)
        .with_symbol_bars("BTC-USD", &BARS)
        .with_delay(Duration::from_secs(60));
    let resolver = quotes_at(datetime!(2024-01-10 22:00 UTC), vec![Arc::new(fast), Arc::new(slow)]);
    let policy = FanOutPolicy {
        max_concurrency: 2,
        per_symbol_timeout: Duration::from_secs(30),
        budget: Duration::from_secs(5),
    };

    // When: Both are quoted together
    let report = resolver
        .quote_many(vec![symbol("BTC-USD"), symbol("AAPL")], policy)
        .await;

    // Then: The fast quote is kept and the slow one is reported as timed out
    assert_eq!(report.quotes.len(), 1);
    assert_eq!(report.quotes[0].symbol, symbol("AAPL"));
    assert_eq!(report.timed_out, vec![symbol("BTC-USD")]);
    assert!(report.partial);
}

#[tokio::test(start_paused = true)]
async fn cancelled_feed_stops_producing() {
    // Given: A running feed over one symbol
    let stub = Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&BARS));
    let resolver = quotes_at(datetime!(2024-01-10 22:00 UTC), vec![stub.clone()]);
    let (handle, mut events) = QuoteFeed::spawn(resolver, vec![symbol("AAPL")], Duration::from_secs(10));

    // When: Two ticks are received and the feed is cancelled
    for _ in 0..2 {
        let event = events.recv().await.expect("event");
        assert!(matches!(event, FeedEvent::Quote(ref quote) if quote.last_close == 102.0));
    }
    handle.cancel().await;

    // Then: The channel closes and no further upstream calls happen
    let calls = stub.series_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(events.recv().await.is_none());
    assert_eq!(stub.series_calls(), calls);
}
