// Library exports for testing and the replay binary.
//
// # Concurrency model
//
// All transcript and approval state lives in one `Session` owned by a single
// tokio task (see `runtime`). Nothing else mutates it; timers and response
// sends run as their own tasks and report back by posting `SessionEvent`s onto
// the session channel.
//
//   - `parking_lot::Mutex`  - sync-only state shared with spawned tasks
//                             (in-flight send registry, transcript file).
//   - `tokio::sync::Mutex`  - the response writer, held across `.await`.

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod debug;
pub mod dispatch;
pub mod replay;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod transcript;

pub use runtime::{SessionRuntime, SessionSender, SessionSettings};
pub use session::{Session, SessionEvent, SessionNotice};
