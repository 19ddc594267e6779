use crate::{
    util::{eprint_msg, ErrorCode},
    SyslaneError, TimeLimit,
};
use chrono::{Local, Utc};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::{
    sync::{Arc, Mutex, PoisonError},
    thread::{Builder as ThreadBuilder, JoinHandle},
};

const TIMER: &str = "syslane-rotation-timer";

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Calls a function whenever the clock passes a calendar boundary.
///
/// The timer runs in its own thread; it re-arms itself after every call. Dropping the timer
/// stops it.
pub struct Timer {
    limit: TimeLimit,
    use_utc: bool,
    callback: Callback,
    running: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl Timer {
    /// Creates a stopped timer that calls `callback` at every boundary of `limit`,
    /// computed in local time.
    pub fn new<F>(limit: TimeLimit, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            limit,
            use_utc: false,
            callback: Arc::new(callback),
            running: Mutex::new(None),
        }
    }

    /// Computes boundaries in UTC rather than in local time.
    #[must_use]
    pub fn use_utc(mut self, use_utc: bool) -> Self {
        self.use_utc = use_utc;
        self
    }

    /// The configured boundary.
    #[must_use]
    pub fn limit(&self) -> TimeLimit {
        self.limit
    }

    /// Starts the timer; a running timer is not affected.
    ///
    /// # Errors
    ///
    /// `SyslaneError::Io` if the timer thread cannot be spawned.
    pub fn start(&self) -> Result<(), SyslaneError> {
        let mut running = self.running.lock().map_err(|_| SyslaneError::Poison)?;
        if running.is_some() {
            return Ok(());
        }

        let (sender, receiver) = crossbeam_channel::bounded::<()>(1);
        let limit = self.limit;
        let use_utc = self.use_utc;
        let callback = Arc::clone(&self.callback);
        let handle = ThreadBuilder::new()
            .name(TIMER.to_string())
            .spawn(move || loop {
                let delay = if use_utc {
                    let now = Utc::now();
                    limit.next_boundary(&now) - now
                } else {
                    let now = Local::now();
                    limit.next_boundary(&now) - now
                };
                match receiver.recv_timeout(delay.to_std().unwrap_or_default()) {
                    Err(RecvTimeoutError::Timeout) => callback(),
                    Ok(()) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        eprint_msg(ErrorCode::Timer, "rotation timer lost its owner");
                        break;
                    }
                }
            })?;
        *running = Some((sender, handle));
        Ok(())
    }

    /// Stops the timer and waits for its thread to terminate; a stopped timer is not affected.
    pub fn stop(&self) {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((sender, handle)) = taken {
            sender.send(()).ok();
            // the callback may stop its own timer
            if handle.thread().id() != std::thread::current().id() {
                handle.join().ok();
            }
        }
    }

    /// True while the timer is started.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("limit", &self.limit)
            .field("use_utc", &self.use_utc)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
