use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use market_core::{LiveQuote, QuoteConnection, QuoteFeed, StreamError};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::provider_symbol;

const WS_BASE_URL: &str = "wss://stream.binance.com:9443/ws";

/// Streaming quote transport backed by Binance's 24h ticker websocket,
/// one subscription per symbol.
#[derive(Clone)]
pub struct BinanceQuoteFeed {
    ws_base: String,
}

impl BinanceQuoteFeed {
    pub fn new() -> Self {
        Self::with_base_url(WS_BASE_URL.to_string())
    }

    pub fn with_base_url(ws_base: String) -> Self {
        Self { ws_base }
    }
}

impl Default for BinanceQuoteFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteFeed for BinanceQuoteFeed {
    async fn connect(&self, symbol: &str) -> Result<Box<dyn QuoteConnection>, StreamError> {
        let url = format!(
            "{}/{}@ticker",
            self.ws_base,
            provider_symbol(symbol).to_lowercase()
        );

        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        tracing::info!("Connected to Binance ticker stream for {}", symbol);

        Ok(Box::new(BinanceTickerConnection { ws }))
    }
}

struct BinanceTickerConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl QuoteConnection for BinanceTickerConnection {
    async fn next_quote(&mut self) -> Option<Result<LiveQuote, StreamError>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    // Non-ticker frames (subscription acks etc.) are skipped
                    if let Some(quote) = parse_ticker(&text) {
                        return Some(Ok(quote));
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.ws.send(Message::Pong(data)).await {
                        return Some(Err(StreamError::Protocol(e.to_string())));
                    }
                }
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Err(e)) => return Some(Err(StreamError::Protocol(e.to_string()))),
                _ => {}
            }
        }
    }
}

/// Extract a LiveQuote from a 24h-ticker event: `c` last price, `p` absolute
/// change, `P` percent change, all sent as strings.
fn parse_ticker(text: &str) -> Option<LiveQuote> {
    let event: serde_json::Value = serde_json::from_str(text).ok()?;
    let price = event.get("c")?.as_str()?.parse::<f64>().ok()?;
    let change = event.get("p")?.as_str()?.parse::<f64>().ok()?;
    let percent_change = event.get("P")?.as_str()?.parse::<f64>().ok()?;

    Some(LiveQuote {
        price,
        change,
        percent_change,
        is_positive: change >= 0.0,
    })
}
