//! Progress reporting for bulk operations.

use parking_lot::Mutex;

/// Observes progress of bulk operations such as emptying the index.
///
/// Purely observational: implementations cannot affect control flow, and an
/// operation over an empty tree may call `begin` and `done` with no `worked`
/// in between.
pub trait Listener: Send + Sync {
    /// The operation is starting and expects this many units of work.
    fn begin(&self, units_of_work: u64);

    /// This many further units have completed since the last notification.
    fn worked(&self, units: u64);

    /// The operation finished (successfully or not).
    fn done(&self);
}

/// Ignores all notifications. Useful when progress is not needed.
pub struct NullListener;

impl Listener for NullListener {
    fn begin(&self, _units_of_work: u64) {}

    fn worked(&self, _units: u64) {}

    fn done(&self) {}
}

/// Logs progress at a fixed percentage granularity via `log::info!`.
pub struct ProgressLoggingListener {
    name: String,
    state: Mutex<ProgressState>,
}

struct ProgressState {
    total: u64,
    worked: u64,
    last_logged_percent: u64,
}

impl ProgressLoggingListener {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ProgressState {
                total: 0,
                worked: 0,
                last_logged_percent: 0,
            }),
        }
    }
}

impl Listener for ProgressLoggingListener {
    fn begin(&self, units_of_work: u64) {
        let mut state = self.state.lock();
        state.total = units_of_work;
        state.worked = 0;
        state.last_logged_percent = 0;
        log::info!("{}: starting, {} units of work", self.name, units_of_work);
    }

    fn worked(&self, units: u64) {
        let mut state = self.state.lock();
        state.worked += units;
        if state.total == 0 {
            return;
        }
        let percent = state.worked * 100 / state.total;
        // log every 10%
        if percent >= state.last_logged_percent + 10 {
            state.last_logged_percent = percent - percent % 10;
            log::info!(
                "{}: {}% ({}/{})",
                self.name,
                percent,
                state.worked,
                state.total
            );
        }
    }

    fn done(&self) {
        let state = self.state.lock();
        log::info!("{}: done ({} units)", self.name, state.worked);
    }
}
