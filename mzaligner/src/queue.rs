//! Bounded-concurrency scheduling of independent processing units.
//!
//! Each unit runs on its own thread with a private [`ProgressCounter`] and
//! [`CancellationToken`]. At most `max_running` units run at once, the rest
//! wait in submission order and start as running units complete.
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use mzfeatures_align::{CancellationToken, ProgressCounter, ProgressSink, TaskStatus};

pub type TaskId = usize;

type Job<T> = Box<dyn FnOnce(&ProgressCounter, &CancellationToken) -> Result<T, String> + Send>;

/// Status changes published by a [`TaskQueue`]
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Queued(TaskId, String),
    Started(TaskId),
    Finished(TaskId),
    Failed(TaskId, String),
    Canceled(TaskId),
}

/// How a unit ended. Only finished units carry a result.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    Finished(T),
    Error(String),
    Canceled,
}

struct Waiting<T> {
    id: TaskId,
    name: String,
    job: Job<T>,
}

struct Running {
    name: String,
    progress: Arc<ProgressCounter>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct TaskQueue<T: Send + 'static> {
    max_running: usize,
    next_id: TaskId,
    waiting: VecDeque<Waiting<T>>,
    running: HashMap<TaskId, Running>,
    completed: Vec<(TaskId, String, TaskOutcome<T>)>,
    done_sender: Sender<(TaskId, TaskOutcome<T>)>,
    done_receiver: Receiver<(TaskId, TaskOutcome<T>)>,
    event_sender: Sender<TaskEvent>,
    event_receiver: Receiver<TaskEvent>,
    report_interval: Duration,
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Create a queue running at most `max_running` units at once. A cap of
    /// zero is treated as one.
    pub fn new(max_running: usize) -> Self {
        let (done_sender, done_receiver) = unbounded();
        let (event_sender, event_receiver) = unbounded();
        Self {
            max_running: max_running.max(1),
            next_id: 0,
            waiting: VecDeque::new(),
            running: HashMap::new(),
            completed: Vec::new(),
            done_sender,
            done_receiver,
            event_sender,
            event_receiver,
            report_interval: Duration::from_secs(10),
        }
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// A receiver of every [`TaskEvent`] this queue publishes
    pub fn events(&self) -> Receiver<TaskEvent> {
        self.event_receiver.clone()
    }

    pub fn num_running(&self) -> usize {
        self.running.len()
    }

    pub fn num_waiting(&self) -> usize {
        self.waiting.len()
    }

    /// The finished fraction of a running unit
    pub fn progress(&self, id: TaskId) -> Option<f64> {
        self.running.get(&id).map(|r| r.progress.finished_fraction())
    }

    fn publish(&self, event: TaskEvent) {
        // The queue holds a receiver itself, so sending cannot fail
        let _ = self.event_sender.send(event);
    }

    pub fn submit<F>(&mut self, name: impl Into<String>, job: F) -> TaskId
    where
        F: FnOnce(&ProgressCounter, &CancellationToken) -> Result<T, String> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let name = name.into();
        debug!("Queued task {id} {name}");
        self.publish(TaskEvent::Queued(id, name.clone()));
        self.waiting.push_back(Waiting {
            id,
            name,
            job: Box::new(job),
        });
        self.fill();
        id
    }

    fn fill(&mut self) {
        while self.running.len() < self.max_running {
            let Some(unit) = self.waiting.pop_front() else {
                break;
            };
            self.start(unit);
        }
    }

    fn start(&mut self, unit: Waiting<T>) {
        let Waiting { id, name, job } = unit;
        let progress = Arc::new(ProgressCounter::new());
        let cancel = CancellationToken::new();
        let sender = self.done_sender.clone();
        let worker_progress = progress.clone();
        let worker_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                job(&worker_progress, &worker_cancel)
            }))
            .unwrap_or_else(|_| Err("the task panicked".to_string()));
            let outcome = match result {
                Ok(value) => {
                    if worker_cancel.is_canceled() {
                        TaskOutcome::Canceled
                    } else {
                        TaskOutcome::Finished(value)
                    }
                }
                Err(message) => {
                    if worker_cancel.is_canceled() {
                        TaskOutcome::Canceled
                    } else {
                        TaskOutcome::Error(message)
                    }
                }
            };
            let _ = sender.send((id, outcome));
        });
        debug!("Started task {id} {name}");
        self.publish(TaskEvent::Started(id));
        self.running.insert(
            id,
            Running {
                name,
                progress,
                cancel,
                handle,
            },
        );
    }

    /// Cancel a unit. A waiting unit is dropped without running, a running
    /// unit is asked to stop. Returns `false` for unknown or completed units.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        if let Some(pos) = self.waiting.iter().position(|w| w.id == id) {
            if let Some(unit) = self.waiting.remove(pos) {
                self.publish(TaskEvent::Canceled(id));
                self.completed.push((id, unit.name, TaskOutcome::Canceled));
            }
            return true;
        }
        if let Some(running) = self.running.get(&id) {
            running.cancel.cancel();
            return true;
        }
        false
    }

    pub fn cancel_all(&mut self) {
        let ids: Vec<TaskId> = self
            .waiting
            .iter()
            .map(|w| w.id)
            .chain(self.running.keys().copied())
            .collect();
        for id in ids {
            self.cancel(id);
        }
    }

    fn complete(&mut self, id: TaskId, outcome: TaskOutcome<T>) {
        let Some(running) = self.running.remove(&id) else {
            return;
        };
        if running.handle.join().is_err() {
            warn!("Task {id} {} did not shut down cleanly", running.name);
        }
        match &outcome {
            TaskOutcome::Finished(_) => {
                running.progress.set_status(TaskStatus::Finished);
                info!("Finished task {id} {}", running.name);
                self.publish(TaskEvent::Finished(id));
            }
            TaskOutcome::Error(message) => {
                warn!("Task {id} {} failed: {message}", running.name);
                self.publish(TaskEvent::Failed(id, message.clone()));
            }
            TaskOutcome::Canceled => {
                info!("Canceled task {id} {}", running.name);
                self.publish(TaskEvent::Canceled(id));
            }
        }
        self.completed.push((id, running.name, outcome));
        self.fill();
    }

    fn report(&self) {
        let mut ids: Vec<&TaskId> = self.running.keys().collect();
        ids.sort();
        for id in ids {
            if let Some(r) = self.running.get(id) {
                info!(
                    "Task {id} {}: {} {:0.1}%",
                    r.name,
                    r.progress.status(),
                    r.progress.finished_fraction() * 100.0
                );
            }
        }
    }

    /// Run every submitted unit to completion, returning the outcomes in
    /// submission order
    pub fn join(mut self) -> Vec<(TaskId, String, TaskOutcome<T>)> {
        while !self.running.is_empty() || !self.waiting.is_empty() {
            match self.done_receiver.recv_timeout(self.report_interval) {
                Ok((id, outcome)) => self.complete(id, outcome),
                Err(RecvTimeoutError::Timeout) => self.report(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let mut completed = std::mem::take(&mut self.completed);
        completed.sort_by_key(|(id, _, _)| *id);
        completed
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[test_log::test]
    fn test_cap_and_fifo() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::new(2);
        let events = queue.events();
        for i in 0..6usize {
            let active = active.clone();
            let peak = peak.clone();
            let order = order.clone();
            queue.submit(format!("unit-{i}"), move |progress, _cancel| {
                progress.set_total(1);
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                order.lock().unwrap().push(i);
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                progress.increment(1);
                Ok(i * 10)
            });
        }
        assert!(queue.num_running() <= 2);
        assert_eq!(queue.num_running() + queue.num_waiting(), 6);

        let results = queue.join();
        assert!(peak.load(Ordering::SeqCst) <= 2);
        let values: Vec<_> = results
            .into_iter()
            .map(|(_, _, outcome)| outcome)
            .collect();
        assert_eq!(
            values,
            (0..6).map(|i| TaskOutcome::Finished(i * 10)).collect::<Vec<_>>()
        );

        // units are admitted in submission order
        let started: Vec<TaskId> = events
            .try_iter()
            .filter_map(|e| match e {
                TaskEvent::Started(id) => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test_log::test]
    fn test_cancel_waiting_and_running() {
        let mut queue: TaskQueue<usize> = TaskQueue::new(1);
        let first = queue.submit("poll", |_progress, cancel| {
            while !cancel.is_canceled() {
                thread::sleep(Duration::from_millis(5));
            }
            Err("stopped".to_string())
        });
        let second = queue.submit("never", |_progress, _cancel| Ok(1));
        assert!(queue.cancel(second));
        assert!(queue.cancel(first));
        assert!(!queue.cancel(99));

        let results = queue.join();
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|(_, _, outcome)| *outcome == TaskOutcome::Canceled));
    }

    #[test_log::test]
    fn test_failure_is_not_published_as_result() {
        let mut queue: TaskQueue<usize> = TaskQueue::new(4);
        let events = queue.events();
        queue.submit("fails", |_progress, _cancel| Err("bad input".to_string()));
        queue.submit("works", |_progress, _cancel| Ok(3));
        let results = queue.join();
        assert_eq!(results[0].2, TaskOutcome::Error("bad input".to_string()));
        assert_eq!(results[1].2, TaskOutcome::Finished(3));
        assert!(events
            .try_iter()
            .any(|e| e == TaskEvent::Failed(0, "bad input".to_string())));
    }

    #[test_log::test]
    fn test_cancel_all() {
        let mut queue: TaskQueue<()> = TaskQueue::new(2);
        for i in 0..4 {
            queue.submit(format!("poll-{i}"), |_progress, cancel| {
                while !cancel.is_canceled() {
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(())
            });
        }
        assert_eq!(queue.num_waiting(), 2);
        queue.cancel_all();
        assert_eq!(queue.num_waiting(), 0);
        let results = queue.join();
        assert_eq!(results.len(), 4);
        assert!(results
            .iter()
            .all(|(_, _, outcome)| *outcome == TaskOutcome::Canceled));
    }
}
