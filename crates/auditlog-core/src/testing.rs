// ABOUTME: Test helper that captures counters emitted through the metrics facade.
// ABOUTME: Lets crates assert on request and eviction counts without a real exporter.

use metrics::LocalRecorderGuard;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

/// A local metrics recorder whose counters can be read back.
pub struct CounterCapture {
    recorder: DebuggingRecorder,
}

impl Default for CounterCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterCapture {
    pub fn new() -> Self {
        Self {
            recorder: DebuggingRecorder::new(),
        }
    }

    /// Route metrics emitted on this thread into the capture until the guard
    /// drops. Async tests must run on a current-thread runtime.
    pub fn install(&self) -> LocalRecorderGuard<'_> {
        metrics::set_default_local_recorder(&self.recorder)
    }

    /// Run `f` with the capture installed.
    pub fn during<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&self.recorder, f)
    }

    /// Value of counter `name` carrying exactly `labels`, in any order.
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.recorder
            .snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| {
                let key = key.key();
                let recorded: Vec<(&str, &str)> = key.labels().map(|l| (l.key(), l.value())).collect();
                let same_labels = recorded.len() == labels.len()
                    && labels.iter().all(|label| recorded.contains(label));
                match value {
                    DebugValue::Counter(count) if key.name() == name && same_labels => Some(count),
                    _ => None,
                }
            })
            .unwrap_or(0)
    }

    /// Number of distinct counter series recorded under `name`.
    pub fn series(&self, name: &str) -> usize {
        self.recorder
            .snapshotter()
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, value)| {
                key.key().name() == name && matches!(value, DebugValue::Counter(_))
            })
            .count()
    }
}
