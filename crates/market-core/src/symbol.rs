//! Trading-pair input handling.

/// Normalize raw user input into canonical pair form: trimmed, uppercased,
/// stripped of any character outside `[A-Z0-9/]`.
pub fn normalize_pair(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '/')
        .collect()
}

/// A valid pair is "2+ alphanumerics, '/', 3+ alphanumerics", e.g. `BTC/USDT`.
/// Expects already-normalized input.
pub fn is_valid_pair(symbol: &str) -> bool {
    let Some((base, quote)) = symbol.split_once('/') else {
        return false;
    };
    base.len() >= 2
        && quote.len() >= 3
        && base.chars().all(|c| c.is_ascii_alphanumeric())
        && quote.chars().all(|c| c.is_ascii_alphanumeric())
}
