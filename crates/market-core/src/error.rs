use thiserror::Error;

/// History fetch failures. Reported to the caller as-is, never retried by
/// the fetcher itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Unknown symbol: {0}")]
    NotFound(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed history payload: {0}")]
    Malformed(String),
}

/// Analysis request failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeError {
    #[error("Analysis provider not configured: {0}")]
    Configuration(String),

    #[error("Analysis response violates schema: {0}")]
    SchemaViolation(String),

    #[error("Analysis provider error: {0}")]
    Upstream(String),
}

/// The single user-visible failure carried in the engine view. Terminal for
/// the current request, never fatal: a new analysis always recovers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid trading pair (expected e.g. BTC/USDT): {0}")]
    InvalidPair(String),

    #[error("History fetch failed: {0}")]
    History(#[from] FetchError),

    #[error("Analysis request failed: {0}")]
    Analysis(#[from] AnalyzeError),
}

/// Live stream failures. Internal to the stream lifecycle: logged and
/// retried, never surfaced as an engine error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream connect failed: {0}")]
    Connect(String),

    #[error("Stream protocol error: {0}")]
    Protocol(String),
}
