use async_trait::async_trait;
use market_core::{
    AnalysisProvider, AnalysisResult, AnalyzeError, HistoryBundle, PricePoint, PriceSeries,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Only the tail of the hourly series goes into the request payload; the
/// daily and weekly series are sent whole.
const SHORT_SERIES_POINTS: usize = 60;

/// Configuration for the Gemini analysis endpoint
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    /// Server-held credential. `None` makes every analyze call fail with a
    /// configuration error before any network attempt.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    pub fn from_env() -> Self {
        Self::new(GeminiConfig::default())
    }
}

#[async_trait]
impl AnalysisProvider for GeminiClient {
    async fn analyze(
        &self,
        symbol: &str,
        history: &HistoryBundle,
    ) -> Result<AnalysisResult, AnalyzeError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AnalyzeError::Configuration("GEMINI_API_KEY not set".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        tracing::info!("Requesting analysis for {}", symbol);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request_body(symbol, history))
            .send()
            .await
            .map_err(|e| AnalyzeError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalyzeError::Upstream(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::Upstream(e.to_string()))?;

        let text = envelope
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| {
                AnalyzeError::SchemaViolation("response carried no candidate text".to_string())
            })?;

        parse_analysis(&text)
    }
}

/// Build the generateContent request: instructions plus a JSON data block
/// with the trimmed 7-day series and the full 3-month and 1-year series.
fn request_body(symbol: &str, history: &HistoryBundle) -> serde_json::Value {
    let data = json!({
        "symbol": symbol,
        "series_7d": series_payload(tail_points(&history.series_7d, SHORT_SERIES_POINTS)),
        "series_3m": series_payload(&history.series_3m.points),
        "series_1y": series_payload(&history.series_1y.points),
    });

    let prompt = format!(
        "You are a technical market analyst. Using the price/volume history below, \
         produce a trading analysis for {symbol} as a single JSON object with exactly \
         these fields: support_levels (number[]), resistance_levels (number[]), \
         buy_zone ({{low, high}}), take_profit_levels (number[]), stop_loss (number), \
         trend ({{short_term, mid_term, long_term}}, each one of bullish|bearish|sideways), \
         confidence ({{score (0..1), reason}}), market_driver (string), summary (string), \
         recommendation ({{signal (buy|hold|sell), reason}}), bull_case (string), \
         bear_case (string), market_sentiment (string), key_takeaways (string[]).\n\n{data}"
    );

    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "response_mime_type": "application/json" },
    })
}

/// Most recent `cap` points of a series
fn tail_points(series: &PriceSeries, cap: usize) -> &[PricePoint] {
    let start = series.points.len().saturating_sub(cap);
    &series.points[start..]
}

fn series_payload(points: &[PricePoint]) -> serde_json::Value {
    points
        .iter()
        .map(|p| {
            json!({
                "date": p.date.format("%Y-%m-%d %H:%M").to_string(),
                "price": p.price,
                "volume": p.volume,
            })
        })
        .collect()
}

/// Validate the model's JSON against the required-field set of
/// AnalysisResult. Any missing or mistyped field is a schema violation, not
/// a partial success.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalyzeError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| AnalyzeError::SchemaViolation(e.to_string()))
}

/// Models occasionally wrap JSON output in a markdown fence even when asked
/// for a raw object.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let t = t
        .strip_prefix("```json")
        .or_else(|| t.strip_prefix("```"))
        .unwrap_or(t);
    t.strip_suffix("```").unwrap_or(t).trim()
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}
