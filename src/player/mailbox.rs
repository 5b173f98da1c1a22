use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

struct State<C> {
    queue: VecDeque<C>,
    woken: bool,
    closed: bool,
    submitted: u64,
    processed: u64,
}

/// Command queue of a run-loop thread.
///
/// Producers push and signal; the owning thread waits, drains the whole queue
/// and reports how many commands it handled so `send_and_wait` callers can
/// return once their command went through.
pub struct Mailbox<C> {
    state: Mutex<State<C>>,
    signal: Condvar,
    drained: Condvar,
}

impl<C> Mailbox<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                woken: false,
                closed: false,
                submitted: 0,
                processed: 0,
            }),
            signal: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<C>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `command`, returns its ticket. Commands sent after `close` are dropped.
    pub fn send(&self, command: C) -> u64 {
        let mut state = self.lock();
        if state.closed {
            return state.submitted;
        }
        state.queue.push_back(command);
        state.submitted += 1;
        self.signal.notify_one();
        state.submitted
    }

    /// Queue `command` and block until the owning thread has handled it
    pub fn send_and_wait(&self, command: C) {
        let ticket = self.send(command);
        let state = self.lock();
        let _state = self
            .drained
            .wait_while(state, |s| s.processed < ticket && !s.closed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    /// Interrupt a `wait` without queueing a command
    pub fn wake(&self) {
        let mut state = self.lock();
        state.woken = true;
        self.signal.notify_one();
    }

    /// Stop accepting commands and release every waiter
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.queue.clear();
        self.signal.notify_all();
        self.drained.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until commands arrive, `wake` is called or `timeout` elapses.
    /// Returns the drained commands, `None` once the mailbox is closed.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<Vec<C>> {
        let state = self.lock();
        let idle = |s: &mut State<C>| s.queue.is_empty() && !s.woken && !s.closed;

        let mut state = match timeout {
            None => self
                .signal
                .wait_while(state, idle)
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            Some(timeout) => {
                self.signal
                    .wait_timeout_while(state, timeout, idle)
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .0
            }
        };

        if state.closed {
            return None;
        }
        state.woken = false;
        Some(state.queue.drain(..).collect())
    }

    /// Drain queued commands without blocking
    pub fn take(&self) -> Vec<C> {
        self.lock().queue.drain(..).collect()
    }

    /// Report `count` drained commands as handled
    pub fn done(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut state = self.lock();
        state.processed += count as u64;
        self.drained.notify_all();
    }
}

impl<C> Default for Mailbox<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_commands_keep_submission_order() {
        let mailbox = Mailbox::new();
        mailbox.send(1);
        mailbox.send(2);
        mailbox.send(3);

        assert_eq!(mailbox.len(), 3);
        assert_eq!(mailbox.take(), vec![1, 2, 3]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_wait_times_out_empty() {
        let mailbox: Mailbox<u8> = Mailbox::new();
        assert_eq!(mailbox.wait(Some(Duration::from_millis(5))), Some(Vec::new()));
    }

    #[test]
    fn test_wake_interrupts_wait() {
        let mailbox: Arc<Mailbox<u8>> = Arc::new(Mailbox::new());
        let waker = Arc::clone(&mailbox);

        let handle = thread::spawn(move || waker.wake());
        assert_eq!(mailbox.wait(None), Some(Vec::new()));
        handle.join().unwrap();
    }

    #[test]
    fn test_send_and_wait_returns_after_processing() {
        let mailbox: Arc<Mailbox<&'static str>> = Arc::new(Mailbox::new());
        let worker_mailbox = Arc::clone(&mailbox);

        let worker = thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(commands) = worker_mailbox.wait(None) {
                let count = commands.len();
                seen.extend(commands);
                worker_mailbox.done(count);
            }
            seen
        });

        mailbox.send("start");
        mailbox.send_and_wait("stop");
        mailbox.close();

        assert_eq!(worker.join().unwrap(), vec!["start", "stop"]);
    }

    #[test]
    fn test_close_releases_waiters() {
        let mailbox: Mailbox<u8> = Mailbox::new();
        mailbox.close();

        assert!(mailbox.is_closed());
        assert_eq!(mailbox.wait(None), None);
        // nobody processes it, but a closed mailbox never blocks
        mailbox.send_and_wait(1);
        assert!(mailbox.is_empty());
    }
}
