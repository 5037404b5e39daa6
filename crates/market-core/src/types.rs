use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One historical price/volume observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Named historical window/granularity combination used for charting and
/// analysis input. The provider-side interval/limit mapping lives with the
/// history fetcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[default]
    Week1,
    Month3,
    Year1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Week1, Timeframe::Month3, Timeframe::Year1];

    /// Display label as shown to consumers
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Week1 => "7D",
            Timeframe::Month3 => "3M",
            Timeframe::Year1 => "1Y",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered price/volume history for one (symbol, timeframe) pair.
/// Produced non-empty and ascending by date; immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn is_chronological(&self) -> bool {
        self.points.windows(2).all(|w| w[0].date <= w[1].date)
    }
}

/// The three fetched series handed to the analysis provider, one per
/// timeframe. Owned by a single analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBundle {
    pub series_7d: PriceSeries,
    pub series_3m: PriceSeries,
    pub series_1y: PriceSeries,
}

impl HistoryBundle {
    pub fn get(&self, timeframe: Timeframe) -> &PriceSeries {
        match timeframe {
            Timeframe::Week1 => &self.series_7d,
            Timeframe::Month3 => &self.series_3m,
            Timeframe::Year1 => &self.series_1y,
        }
    }
}

/// Latest streamed price snapshot for the tracked symbol.
/// Overwritten per tick, cleared when the tracked symbol changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveQuote {
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub is_positive: bool,
}

/// Trade direction called by an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

impl Signal {
    pub fn to_label(&self) -> &'static str {
        match self {
            Signal::Buy => "Buy",
            Signal::Hold => "Hold",
            Signal::Sell => "Sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideways,
}

/// Inclusive price band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceZone {
    pub low: f64,
    pub high: f64,
}

/// Trend calls across the three analysis horizons
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendOutlook {
    pub short_term: TrendDirection,
    pub mid_term: TrendDirection,
    pub long_term: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    /// 0.0 to 1.0
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub signal: Signal,
    pub reason: String,
}

/// Structured output of one AI analysis run. Opaque once received: replaced,
/// never mutated. Every field is required at the serde layer, so an upstream
/// response missing any of them fails deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub buy_zone: PriceZone,
    pub take_profit_levels: Vec<f64>,
    pub stop_loss: f64,
    pub trend: TrendOutlook,
    pub confidence: Confidence,
    pub market_driver: String,
    pub summary: String,
    pub recommendation: Recommendation,
    pub bull_case: String,
    pub bear_case: String,
    pub market_sentiment: String,
    pub key_takeaways: Vec<String>,
}

/// Engine status for the current analysis request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}
