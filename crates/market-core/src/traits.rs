use async_trait::async_trait;

use crate::{
    AnalysisResult, AnalyzeError, FetchError, HistoryBundle, LiveQuote, PriceSeries, StreamError,
    Timeframe,
};

/// Source of historical price/volume series
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Fetch the series for one (symbol, timeframe) pair. The symbol must
    /// already be in canonical form. Returned series are non-empty and
    /// ascending by date.
    async fn fetch(&self, symbol: &str, timeframe: Timeframe)
        -> Result<PriceSeries, FetchError>;
}

/// Structured AI analysis over a fetched history bundle
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        symbol: &str,
        history: &HistoryBundle,
    ) -> Result<AnalysisResult, AnalyzeError>;
}

/// One established live quote subscription
#[async_trait]
pub trait QuoteConnection: Send {
    /// Next inbound tick. `None` means the connection closed.
    async fn next_quote(&mut self) -> Option<Result<LiveQuote, StreamError>>;
}

/// Transport for live quote subscriptions, one subscription per symbol
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    async fn connect(&self, symbol: &str) -> Result<Box<dyn QuoteConnection>, StreamError>;
}
