/// Classification for retry policy.
///
/// Tells the acquisition loop what to do after a provider call fails. No class
/// stops the loop; provider failures are counted and the cycle moves on.
///
/// # Behavior Summary
///
/// | Class | Retry this batch now? | Re-authenticate? |
/// |-------|-----------------------|------------------|
/// | `Never` | No | No |
/// | `NextCycle` | No, it is asked for again next cycle | No |
/// | `Reconnect` | No | Yes, before the next cycle |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// The request itself is invalid; repeating it will fail the same way.
    Never,

    /// Transient failure (rate limit, timeout, 5xx, network).
    ///
    /// The batch is skipped for this cycle. Because the token partition is
    /// recomputed every cycle, the same tokens are requested again on the next one.
    NextCycle,

    /// The session is no longer valid. The caller should run `connect` again
    /// before issuing further requests.
    Reconnect,
}
