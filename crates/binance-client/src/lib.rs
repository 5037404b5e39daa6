use async_trait::async_trait;
use chrono::DateTime;
use market_core::{FetchError, HistoryProvider, PricePoint, PriceSeries, Timeframe};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub mod websocket;
pub use websocket::BinanceQuoteFeed;

const BASE_URL: &str = "https://api.binance.com";

/// Kline interval/limit per timeframe: hourly candles for one week, daily
/// for a quarter, weekly for a year. Fixed mapping, not caller-negotiable.
fn kline_params(timeframe: Timeframe) -> (&'static str, u32) {
    match timeframe {
        Timeframe::Week1 => ("1h", 168),
        Timeframe::Month3 => ("1d", 90),
        Timeframe::Year1 => ("1w", 52),
    }
}

/// Collapse a canonical pair ("BTC/USDT") into Binance's symbol form ("BTCUSDT")
pub fn provider_symbol(pair: &str) -> String {
    pair.chars().filter(|c| *c != '/').collect()
}

#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, base_url }
    }

    /// Get candlestick history for a pair at the timeframe's fixed
    /// interval/limit. Failures are reported to the caller, never retried
    /// here — retry policy belongs to the orchestration layer.
    async fn get_klines(
        &self,
        pair: &str,
        timeframe: Timeframe,
    ) -> Result<PriceSeries, FetchError> {
        let (interval, limit) = kline_params(timeframe);
        let url = format!("{}/api/v3/klines", self.base_url);
        let symbol_param = provider_symbol(pair);
        let limit_param = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol_param.as_str()),
                ("interval", interval),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Binance signals an unknown symbol with code -1121 on a 400
            return Err(match status.as_u16() {
                429 | 418 => FetchError::RateLimited,
                400 | 404 if body.contains("-1121") => FetchError::NotFound(pair.to_string()),
                _ => FetchError::Network(format!("HTTP {}: {}", status, body)),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let points = parse_klines(&body)?;

        Ok(PriceSeries {
            symbol: pair.to_string(),
            timeframe,
            points,
        })
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryProvider for BinanceClient {
    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<PriceSeries, FetchError> {
        tracing::debug!("Fetching {} klines for {}", timeframe, symbol);
        self.get_klines(symbol, timeframe).await
    }
}

/// Parse Binance's kline payload: an array of arrays, each row
/// `[openTime, open, high, low, close, volume, ...]` with prices as strings.
/// Rejects empty payloads and returns points sorted ascending by open time.
fn parse_klines(body: &str) -> Result<Vec<PricePoint>, FetchError> {
    let rows: Vec<Vec<Value>> =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if rows.is_empty() {
        return Err(FetchError::Malformed("empty kline payload".to_string()));
    }

    let mut points = Vec::with_capacity(rows.len());
    for row in &rows {
        let open_time = row
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| FetchError::Malformed("kline row missing open time".to_string()))?;
        let date = DateTime::from_timestamp_millis(open_time)
            .ok_or_else(|| FetchError::Malformed("kline open time out of range".to_string()))?;
        let price = field_as_f64(row, 4)
            .ok_or_else(|| FetchError::Malformed("kline row missing close price".to_string()))?;
        let volume = field_as_f64(row, 5)
            .ok_or_else(|| FetchError::Malformed("kline row missing volume".to_string()))?;

        points.push(PricePoint { date, price, volume });
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

fn field_as_f64(row: &[Value], index: usize) -> Option<f64> {
    match row.get(index)? {
        Value::String(s) => s.parse().ok(),
        v => v.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINES_FIXTURE: &str = r#"[
        [1717200000000, "67000.0", "67500.0", "66800.0", "67400.5", "1234.5", 1717203599999, "0", 100, "0", "0", "0"],
        [1717203600000, "67400.5", "67900.0", "67200.0", "67800.25", "2345.6", 1717207199999, "0", 100, "0", "0", "0"]
    ]"#;

    #[test]
    fn parses_kline_rows() {
        let points = parse_klines(KLINES_FIXTURE).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].price, 67400.5);
        assert_eq!(points[0].volume, 1234.5);
        assert_eq!(points[1].price, 67800.25);
        assert!(points[0].date < points[1].date);
    }

    #[test]
    fn sorts_out_of_order_rows_ascending() {
        let shuffled = r#"[
            [1717203600000, "1", "1", "1", "2.0", "1.0"],
            [1717200000000, "1", "1", "1", "1.0", "1.0"]
        ]"#;
        let points = parse_klines(shuffled).unwrap();
        assert_eq!(points[0].price, 1.0);
        assert_eq!(points[1].price, 2.0);
    }

    #[test]
    fn rejects_empty_payload() {
        assert_eq!(
            parse_klines("[]"),
            Err(FetchError::Malformed("empty kline payload".to_string()))
        );
    }

    #[test]
    fn rejects_non_kline_payloads() {
        assert!(matches!(
            parse_klines(r#"{"code": -1121, "msg": "Invalid symbol."}"#),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_klines(r#"[["not-a-timestamp", "1", "1", "1", "1", "1"]]"#),
            Err(FetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_klines(r#"[[1717200000000, "1", "1", "1"]]"#),
            Err(FetchError::Malformed(_))
        ));
    }

    #[test]
    fn collapses_pair_to_provider_symbol() {
        assert_eq!(provider_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(provider_symbol("1INCH/USDT"), "1INCHUSDT");
    }

    #[test]
    fn timeframe_mapping_is_fixed() {
        assert_eq!(kline_params(Timeframe::Week1), ("1h", 168));
        assert_eq!(kline_params(Timeframe::Month3), ("1d", 90));
        assert_eq!(kline_params(Timeframe::Year1), ("1w", 52));
    }
}
