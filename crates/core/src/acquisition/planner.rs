//! Request batch planning.

use marketfeed_market_data::ExchangeTokens;

/// Split tokens into request-sized batches.
///
/// Exchanges are visited in order and each exchange's tokens are cut into
/// chunks of at most `max_per_request`. Chunks are appended to the current
/// batch while it stays within the limit; otherwise the current batch is
/// closed and the chunk starts the next one. Token order is preserved across
/// the concatenation of all batches.
///
/// A `max_per_request` of zero is treated as one.
pub fn plan(tokens: &ExchangeTokens, max_per_request: usize) -> Vec<ExchangeTokens> {
    let max = max_per_request.max(1);
    let mut batches = Vec::new();
    let mut current = ExchangeTokens::new();

    for (exchange, exchange_tokens) in tokens.iter() {
        for chunk in exchange_tokens.chunks(max) {
            if !current.is_empty() && current.total() + chunk.len() > max {
                batches.push(std::mem::take(&mut current));
            }
            current.extend(exchange, chunk.iter().cloned());
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
