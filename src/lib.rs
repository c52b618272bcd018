// Library surface for headless/integration tests and reuse.
// The binary in main.rs only adds argument parsing and terminal output.
pub mod app_dirs;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod mirror;
pub mod report;
pub mod runtime;
pub mod session;
pub mod shot;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod undo;
pub mod util;
pub mod zone;

pub use error::{ConfigError, ReportError, SessionError, StoreError};
pub use session::{PlayerRef, Session, SessionState, MAX_SHOTS};
pub use shot::{CoachAction, CoachActionKind, ShotRecord};
pub use tracker::ShotTracker;
pub use zone::Zone;
