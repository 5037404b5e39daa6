use std::sync::Arc;

use analysis_engine::AnalysisEngine;
use anyhow::Result;
use binance_client::{BinanceClient, BinanceQuoteFeed};
use gemini_client::GeminiClient;
use market_core::{AnalysisResult, Status};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let pair = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "BTC/USDT".to_string());

    tracing::info!("Starting Coinsight for {}", pair);

    let engine = AnalysisEngine::new(
        Arc::new(BinanceClient::new()),
        Arc::new(GeminiClient::from_env()),
        Arc::new(BinanceQuoteFeed::new()),
    );

    let mut changes = engine.subscribe();
    engine.start_analysis(&pair);

    // Wait out the pipeline, echoing live ticks as they arrive
    loop {
        changes.changed().await?;
        let view = changes.borrow_and_update().clone();
        match view.status {
            Status::Success => {
                if let Some(analysis) = &view.analysis {
                    print_report(view.symbol.as_deref().unwrap_or(&pair), analysis);
                }
                break;
            }
            Status::Error => {
                tracing::error!(
                    "Analysis failed: {}",
                    view.error_message().unwrap_or_else(|| "unknown".to_string())
                );
                return Ok(());
            }
            _ => {
                if let Some(quote) = view.live_quote {
                    tracing::info!("{} {:.2} ({:+.2}%)", pair, quote.price, quote.percent_change);
                }
            }
        }
    }

    // Keep streaming the live quote until interrupted
    tracing::info!("Streaming live quotes for {} (ctrl-c to exit)", pair);
    loop {
        tokio::select! {
            changed = changes.changed() => {
                changed?;
                let quote = changes.borrow_and_update().live_quote;
                if let Some(quote) = quote {
                    tracing::info!("{} {:.2} ({:+.2}%)", pair, quote.price, quote.percent_change);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    engine.reset();
    Ok(())
}

fn print_report(symbol: &str, analysis: &AnalysisResult) {
    println!("\n=== {symbol} ===");
    println!(
        "Recommendation: {} — {}",
        analysis.recommendation.signal.to_label(),
        analysis.recommendation.reason
    );
    println!(
        "Confidence: {:.0}% ({})",
        analysis.confidence.score * 100.0,
        analysis.confidence.reason
    );
    println!("Sentiment: {}", analysis.market_sentiment);
    println!("Market driver: {}", analysis.market_driver);
    println!("Summary: {}", analysis.summary);
    println!("Support: {:?}", analysis.support_levels);
    println!("Resistance: {:?}", analysis.resistance_levels);
    println!(
        "Buy zone: {:.2} - {:.2}",
        analysis.buy_zone.low, analysis.buy_zone.high
    );
    println!("Take profit: {:?}", analysis.take_profit_levels);
    println!("Stop loss: {:.2}", analysis.stop_loss);
    println!(
        "Trend: {} short / {} mid / {} long",
        trend_label(analysis.trend.short_term),
        trend_label(analysis.trend.mid_term),
        trend_label(analysis.trend.long_term)
    );
    println!("Bull case: {}", analysis.bull_case);
    println!("Bear case: {}", analysis.bear_case);
    println!("Key takeaways:");
    for takeaway in &analysis.key_takeaways {
        println!("  - {takeaway}");
    }
}

fn trend_label(trend: market_core::TrendDirection) -> &'static str {
    match trend {
        market_core::TrendDirection::Bullish => "bullish",
        market_core::TrendDirection::Bearish => "bearish",
        market_core::TrendDirection::Sideways => "sideways",
    }
}
