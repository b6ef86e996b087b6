// Tue Jan 13 2026 - Alex

use crate::host::{RepeatingTask, Scheduler, Task};
use crate::utils::panic_message;
use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

enum Job {
    Once(Task),
    Periodic { interval: Duration, task: RepeatingTask },
}

struct Timer {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    // BinaryHeap is a max-heap; the earliest deadline must sort highest.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.due.cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A single background thread that runs every deferred and periodic task in
/// deadline order. Tasks never run concurrently with each other.
pub struct TimerQueue {
    sender: Mutex<Sender<Timer>>,
    next_seq: AtomicU64,
}

impl TimerQueue {
    pub fn start(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = channel();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(receiver))?;

        Ok(Self {
            sender: Mutex::new(sender),
            next_seq: AtomicU64::new(0),
        })
    }

    fn push(&self, due: Instant, job: Job) {
        let timer = Timer {
            due,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            job,
        };
        if self.sender.lock().send(timer).is_err() {
            log::error!("timer thread is gone, dropping task");
        }
    }
}

impl Scheduler for TimerQueue {
    fn schedule_once(&self, delay: Duration, task: Task) {
        self.push(Instant::now() + delay, Job::Once(task));
    }

    fn schedule_periodic(&self, interval: Duration, task: RepeatingTask) {
        self.push(Instant::now() + interval, Job::Periodic { interval, task });
    }
}

fn run_loop(receiver: Receiver<Timer>) {
    let mut heap: BinaryHeap<Timer> = BinaryHeap::new();

    loop {
        let received = match heap.peek() {
            Some(next) => receiver.recv_timeout(next.due.saturating_duration_since(Instant::now())),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(timer) => heap.push(timer),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        while heap.peek().map_or(false, |t| t.due <= now) {
            let Some(timer) = heap.pop() else {
                break;
            };
            if let Some(next) = fire(timer) {
                heap.push(next);
            }
        }
    }

    log::debug!("timer thread exiting");
}

fn fire(timer: Timer) -> Option<Timer> {
    match timer.job {
        Job::Once(task) => {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                log::error!("deferred task panicked: {}", panic_message(payload.as_ref()));
            }
            None
        }
        Job::Periodic { interval, mut task } => {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut task)) {
                log::error!("periodic task panicked: {}", panic_message(payload.as_ref()));
            }
            Some(Timer {
                due: Instant::now() + interval,
                seq: timer.seq,
                job: Job::Periodic { interval, task },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_once_runs_after_delay() {
        let queue = TimerQueue::start("timer-test-once").unwrap();
        let (tx, rx) = channel();
        let start = Instant::now();
        queue.schedule_once(Duration::from_millis(20), Box::new(move || {
            let _ = tx.send(Instant::now());
        }));

        let fired_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(fired_at.duration_since(start) >= Duration::from_millis(20));
    }

    #[test]
    fn test_deadline_order() {
        let queue = TimerQueue::start("timer-test-order").unwrap();
        let (tx, rx) = channel();
        let late = tx.clone();
        queue.schedule_once(Duration::from_millis(60), Box::new(move || {
            let _ = late.send("late");
        }));
        queue.schedule_once(Duration::from_millis(5), Box::new(move || {
            let _ = tx.send("early");
        }));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "early");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "late");
    }

    #[test]
    fn test_periodic_repeats_and_survives_panics() {
        let queue = TimerQueue::start("timer-test-periodic").unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        queue.schedule_periodic(Duration::from_millis(5), Box::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                panic!("first run fails");
            }
        }));

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(count.load(Ordering::SeqCst) >= 3);
    }
}
