use tokio::sync::mpsc;

/// One progress update. `message == None` tells the consumer to hide any
/// progress surface (emitted once when an operation finishes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub current: i32,
    pub total: i32,
    pub message: Option<String>,
}

/// Cloneable handle feeding progress events into a bounded channel. Emission
/// never blocks; when the consumer lags, events are dropped (progress is
/// advisory).
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    /// Creates a sink and the receiver a UI adapter drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that swallows every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, current: i32, total: i32, message: Option<&str>) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(ProgressEvent {
                current,
                total,
                message: message.map(str::to_string),
            });
        }
    }

    /// Emits the terminal hide event.
    pub fn finish(&self) {
        self.emit(100, 100, None);
    }
}

/// Blends a per-file percentage into a whole-batch percentage.
pub fn blended_percent(file_index: usize, file_percent: i32, total_files: usize) -> i32 {
    if total_files == 0 {
        return 0;
    }
    ((file_index * 100) as i32 + file_percent) / total_files as i32
}

/// Suppresses progress noise: a percentage passes only when it changed and
/// is even, or when the caller marks a boundary (file complete).
#[derive(Debug)]
pub struct PercentGate {
    last: i32,
}

impl PercentGate {
    pub fn new() -> Self {
        Self { last: -1 }
    }

    pub fn accept(&mut self, percent: i32, boundary: bool) -> bool {
        if boundary || (percent != self.last && percent % 2 == 0) {
            self.last = percent;
            true
        } else {
            false
        }
    }
}

impl Default for PercentGate {
    fn default() -> Self {
        Self::new()
    }
}
