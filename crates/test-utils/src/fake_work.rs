use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskdag::errors::TaskError;
use taskdag::exec::{Work, WorkFuture};

/// What a [`FakeWork`] does on each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed,
    /// Fail the first `n` attempts, then succeed.
    FailTimes(u32),
    AlwaysFail,
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Shared log of start/finish events plus a live concurrency gauge.
///
/// Cloning is cheap; all clones observe the same log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&self, id: &str) {
        self.events.lock().unwrap().push(Event::Started(id.to_string()));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
    }

    fn finish(&self, id: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Finished(id.to_string()));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Task ids in the order their attempts started (repeats for retries).
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(id) => Some(id),
                Event::Finished(_) => None,
            })
            .collect()
    }

    /// Index of the first start of `id` in the event log.
    pub fn first_start(&self, id: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| matches!(e, Event::Started(s) if s == id))
    }

    /// Index of the last finish of `id` in the event log.
    pub fn last_finish(&self, id: &str) -> Option<usize> {
        self.events()
            .iter()
            .rposition(|e| matches!(e, Event::Finished(s) if s == id))
    }

    /// Highest number of attempts observed running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

/// Records `Finished` even when the attempt is aborted or panics.
struct FinishGuard<'a> {
    recorder: &'a Recorder,
    id: &'a str,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.recorder.finish(self.id);
    }
}

/// Scripted unit of work for tests.
pub struct FakeWork {
    id: String,
    script: Script,
    delay: Duration,
    attempts: AtomicU32,
    recorder: Recorder,
}

impl FakeWork {
    pub fn new(id: &str, recorder: &Recorder) -> Self {
        Self {
            id: id.to_string(),
            script: Script::Succeed,
            delay: Duration::ZERO,
            attempts: AtomicU32::new(0),
            recorder: recorder.clone(),
        }
    }

    pub fn script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// How many times `run` has been called.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Work for FakeWork {
    fn run(&self) -> WorkFuture<'_> {
        Box::pin(async move {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.recorder.start(&self.id);
            let _guard = FinishGuard {
                recorder: &self.recorder,
                id: &self.id,
            };

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.script {
                Script::Succeed => Ok(format!("{} done", self.id)),
                Script::FailTimes(n) if attempt <= n => Err(TaskError::execution(format!(
                    "{} failed on attempt {attempt}",
                    self.id
                ))),
                Script::FailTimes(_) => Ok(format!("{} done after {attempt}", self.id)),
                Script::AlwaysFail => Err(TaskError::execution(format!("{} failed", self.id))),
                Script::Panic => panic!("{} panicked", self.id),
            }
        })
    }
}
