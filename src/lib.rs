//! netup: passive network online-state monitor
//!
//! A library for watching the host's kernel-visible network state and
//! answering, without polling or active probing, "does a plausible default
//! path to the internet exist right now?", plus a debounced change stream
//! that fires on transitions and a wake-gap detector for sleep/resume.

pub mod online;
pub mod source;
pub mod time;
pub mod wake;
pub mod watch;

pub use online::{evaluate, EvalError, OnlineSnapshot};
pub use wake::start_wake_watcher;
pub use watch::{watch, OnlineEvent, OnlineMonitor, WatchError};
