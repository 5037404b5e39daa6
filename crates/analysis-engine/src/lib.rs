use dashmap::DashMap;
use market_core::{
    symbol, AnalysisProvider, AnalysisResult, EngineError, HistoryBundle, HistoryProvider,
    LiveQuote, PriceSeries, QuoteFeed, Status, Timeframe,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

pub mod stream;

/// Default delay between live-stream reconnect attempts
const STREAM_BACKOFF: Duration = Duration::from_secs(5);

/// Everything a consumer can observe about the engine: current status,
/// tracked symbol, fetched series, selected timeframe, analysis, live quote
/// and error. Cloned snapshots are published on every transition.
#[derive(Debug, Clone, Default)]
pub struct MarketView {
    pub status: Status,
    pub symbol: Option<String>,
    pub history: Option<HistoryBundle>,
    pub active_timeframe: Timeframe,
    pub analysis: Option<AnalysisResult>,
    pub live_quote: Option<LiveQuote>,
    pub error: Option<EngineError>,
}

impl MarketView {
    /// The series currently selected for display, if fetched
    pub fn active_series(&self) -> Option<&PriceSeries> {
        self.history.as_ref().map(|h| h.get(self.active_timeframe))
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// View plus the generation counter it is guarded by. One lock, short
/// critical sections, never held across an await.
struct Shared {
    view: MarketView,
    generation: u64,
}

struct StreamHandle {
    shutdown: Arc<Notify>,
}

/// Orchestrates analysis pipelines and the live quote stream for one
/// "current symbol" at a time.
///
/// Every state write funnels through [`commit`](Self::commit), which rejects
/// writes stamped with a superseded generation: starting a new analysis (or
/// resetting) bumps the generation once, revoking both the old pipeline and
/// the old quote stream in a single step.
#[derive(Clone)]
pub struct AnalysisEngine {
    history: Arc<dyn HistoryProvider>,
    analyst: Arc<dyn AnalysisProvider>,
    feed: Arc<dyn QuoteFeed>,
    shared: Arc<Mutex<Shared>>,
    cache: Arc<DashMap<String, AnalysisResult>>,
    changes: Arc<watch::Sender<MarketView>>,
    stream: Arc<Mutex<Option<StreamHandle>>>,
    stream_backoff: Duration,
}

impl AnalysisEngine {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        analyst: Arc<dyn AnalysisProvider>,
        feed: Arc<dyn QuoteFeed>,
    ) -> Self {
        Self::with_stream_backoff(history, analyst, feed, STREAM_BACKOFF)
    }

    /// The reconnect backoff is injectable so tests don't sleep for real
    /// seconds.
    pub fn with_stream_backoff(
        history: Arc<dyn HistoryProvider>,
        analyst: Arc<dyn AnalysisProvider>,
        feed: Arc<dyn QuoteFeed>,
        stream_backoff: Duration,
    ) -> Self {
        let view = MarketView::default();
        let (changes, _) = watch::channel(view.clone());

        Self {
            history,
            analyst,
            feed,
            shared: Arc::new(Mutex::new(Shared {
                view,
                generation: 0,
            })),
            cache: Arc::new(DashMap::new()),
            changes: Arc::new(changes),
            stream: Arc::new(Mutex::new(None)),
            stream_backoff,
        }
    }

    /// Observe every state transition
    pub fn subscribe(&self) -> watch::Receiver<MarketView> {
        self.changes.subscribe()
    }

    /// Point-in-time copy of the observable state
    pub fn snapshot(&self) -> MarketView {
        self.shared.lock().view.clone()
    }

    /// Last successful analysis for a symbol, if one was produced this
    /// session. Survives `reset`.
    pub fn cached(&self, symbol: &str) -> Option<AnalysisResult> {
        self.cache.get(symbol).map(|entry| entry.value().clone())
    }

    /// Normalize and validate `raw`, then supersede any in-flight request
    /// with a fresh fetch pipeline and live stream for the pair. Invalid
    /// input transitions straight to `Error` without issuing a fetch.
    pub fn start_analysis(&self, raw: &str) {
        let pair = symbol::normalize_pair(raw);

        if !symbol::is_valid_pair(&pair) {
            tracing::warn!("Rejected invalid pair input {:?}", raw);
            {
                let mut shared = self.shared.lock();
                shared.generation += 1;
                shared.view = MarketView {
                    status: Status::Error,
                    error: Some(EngineError::InvalidPair(pair)),
                    ..MarketView::default()
                };
                let _ = self.changes.send(shared.view.clone());
            }
            // the tracked symbol is gone, so the old stream goes with it
            self.teardown_stream();
            return;
        }

        tracing::info!("Starting analysis for {}", pair);
        let generation = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.view = MarketView {
                status: Status::Loading,
                symbol: Some(pair.clone()),
                ..MarketView::default()
            };
            let _ = self.changes.send(shared.view.clone());
            shared.generation
        };

        self.teardown_stream();
        self.spawn_stream(generation, pair.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_pipeline(generation, pair).await;
        });
    }

    /// Pure selection of which fetched series is displayed. No fetch, no
    /// supersession.
    pub fn set_active_timeframe(&self, timeframe: Timeframe) {
        let mut shared = self.shared.lock();
        shared.view.active_timeframe = timeframe;
        let _ = self.changes.send(shared.view.clone());
    }

    /// Return to `Idle`, superseding in-flight work and stopping the live
    /// stream. The analysis cache is intentionally preserved.
    pub fn reset(&self) {
        {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.view = MarketView::default();
            let _ = self.changes.send(shared.view.clone());
        }
        self.teardown_stream();
        tracing::info!("Engine reset");
    }

    /// Apply a state mutation only if `generation` is still current.
    /// Returns whether the write was applied.
    fn commit(&self, generation: u64, mutate: impl FnOnce(&mut MarketView)) -> bool {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return false;
        }
        mutate(&mut shared.view);
        let _ = self.changes.send(shared.view.clone());
        true
    }

    /// One analysis request: fetch all three timeframes concurrently
    /// (fail-fast), then run the analysis over the combined bundle. Every
    /// write is generation-guarded, so a superseded pipeline's results are
    /// silently discarded no matter when they arrive.
    async fn run_pipeline(&self, generation: u64, pair: String) {
        let fetched = tokio::try_join!(
            self.history.fetch(&pair, Timeframe::Week1),
            self.history.fetch(&pair, Timeframe::Month3),
            self.history.fetch(&pair, Timeframe::Year1),
        );

        let bundle = match fetched {
            Ok((series_7d, series_3m, series_1y)) => HistoryBundle {
                series_7d,
                series_3m,
                series_1y,
            },
            Err(e) => {
                tracing::warn!("History fetch for {} failed: {}", pair, e);
                self.commit(generation, |view| {
                    view.status = Status::Error;
                    view.error = Some(EngineError::History(e));
                });
                return;
            }
        };

        if !self.commit(generation, |view| view.history = Some(bundle.clone())) {
            tracing::debug!("Pipeline for {} superseded before analysis", pair);
            return;
        }

        match self.analyst.analyze(&pair, &bundle).await {
            Ok(result) => {
                let applied = self.commit(generation, |view| {
                    view.status = Status::Success;
                    view.analysis = Some(result.clone());
                });
                if applied {
                    self.cache.insert(pair.clone(), result);
                    tracing::info!("Analysis for {} complete", pair);
                } else {
                    tracing::debug!("Discarding superseded analysis result for {}", pair);
                }
            }
            Err(e) => {
                tracing::warn!("Analysis for {} failed: {}", pair, e);
                self.commit(generation, |view| {
                    view.status = Status::Error;
                    view.error = Some(EngineError::Analysis(e));
                });
            }
        }
    }

    fn spawn_stream(&self, generation: u64, pair: String) {
        let shutdown = Arc::new(Notify::new());
        *self.stream.lock() = Some(StreamHandle {
            shutdown: shutdown.clone(),
        });

        let engine = self.clone();
        let feed = self.feed.clone();
        let backoff = self.stream_backoff;
        tokio::spawn(async move {
            stream::run_quote_stream(feed, pair, backoff, shutdown, move |quote| {
                engine.commit(generation, |view| view.live_quote = Some(quote));
            })
            .await;
        });
    }

    /// Stop the current live stream, if any. Callers bump the generation
    /// first, so once this returns no tick from the old stream can be
    /// applied; the notify disarms the pending reconnect timer and wakes the
    /// reader so the task exits without another connect.
    fn teardown_stream(&self) {
        if let Some(handle) = self.stream.lock().take() {
            handle.shutdown.notify_one();
        }
    }
}
