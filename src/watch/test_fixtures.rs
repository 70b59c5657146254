//! Shared fixtures for watcher tests.

use crate::online::{EvalError, OnlineEvaluator, OnlineSnapshot};
use crate::source::{EventSource, OsEvent, SourceError};
use crate::time::Clock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Scripted evaluator: pops queued results, then repeats the last
/// successful snapshot. Clones share the script and the call counter.
#[derive(Clone)]
pub struct MockEvaluator {
    inner: Arc<EvaluatorState>,
}

struct EvaluatorState {
    results: Mutex<VecDeque<Result<OnlineSnapshot, EvalError>>>,
    sticky: Mutex<Option<OnlineSnapshot>>,
    calls: AtomicUsize,
}

impl MockEvaluator {
    pub fn scripted(results: Vec<Result<OnlineSnapshot, EvalError>>) -> Self {
        Self {
            inner: Arc::new(EvaluatorState {
                results: Mutex::new(results.into()),
                sticky: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of `evaluate` calls observed so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

impl OnlineEvaluator for MockEvaluator {
    fn evaluate(&self) -> Result<OnlineSnapshot, EvalError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.inner.results.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.inner.sticky.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self
                .inner
                .sticky
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| OnlineSnapshot::offline("no default route"))),
        }
    }
}

/// Synthetic event source fed through a channel held by the test.
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<Result<OsEvent, SourceError>>,
}

impl ChannelEventSource {
    pub fn new() -> (mpsc::Sender<Result<OsEvent, SourceError>>, Self) {
        let (tx, rx) = mpsc::channel(crate::source::EVENT_CHANNEL_CAPACITY);
        (tx, Self { receiver: rx })
    }
}

impl EventSource for ChannelEventSource {
    type Stream = ReceiverStream<Result<OsEvent, SourceError>>;

    fn into_stream(self) -> Self::Stream {
        ReceiverStream::new(self.receiver)
    }
}

/// Fixed clock for deterministic timestamps.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    at: SystemTime,
}

impl MockClock {
    pub fn at_secs(secs: u64) -> Self {
        Self {
            at: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    pub fn time(&self) -> SystemTime {
        self.at
    }
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        self.at
    }
}

/// A platform-independent evaluation error for scripting failures.
pub fn eval_error() -> EvalError {
    #[cfg(unix)]
    {
        EvalError::Route(std::io::Error::from_raw_os_error(libc::EACCES))
    }
    #[cfg(windows)]
    {
        use windows::core::HRESULT;
        EvalError::AdapterQuery(windows::core::Error::from_hresult(HRESULT(-2_147_024_891)))
    }
}

pub fn online(cause: &str) -> Result<OnlineSnapshot, EvalError> {
    Ok(OnlineSnapshot::online(cause))
}

pub fn offline(cause: &str) -> Result<OnlineSnapshot, EvalError> {
    Ok(OnlineSnapshot::offline(cause))
}
