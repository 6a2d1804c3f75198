//! Progress reporting for batch runs.
//!
//! [`ProgressCallback`] keeps the batch processor independent of how
//! progress is shown. The CLI renders it with `indicatif`.
//! Library callers pass `None`.

/// Receives progress updates from a running batch.
///
/// Implementations must be `Send + Sync` because workers report from
/// spawned tasks.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}
