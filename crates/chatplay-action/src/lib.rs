//! Command dispatch engine for chatplay.
//!
//! Turns a stream of chat messages into authorized, rate-limited actions
//! running on a bounded worker pool, and reports each completion exactly
//! once.

pub mod authorization;
pub mod blocklist;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod governor;
pub mod handler;
pub mod presentation;
pub mod source;
pub mod switch;
pub mod table;
pub mod task;
pub mod types;

pub use authorization::{AuthorizationResolver, IgnoreReason, Verdict};
pub use blocklist::{Blocklist, FileBlocklist, StaticBlocklist};
pub use dispatch::{DispatchStats, Dispatcher, MessageOutcome};
pub use engine::{CompletionCallback, ExecutionEngine};
pub use error::{BlocklistError, EngineError, Rejection, TableError, TaskError};
pub use governor::{AdmissionTicket, Governor};
pub use handler::{ActionContext, ActionParams, ActionRegistry, ChatAction};
pub use presentation::{Presentation, StatusLog};
pub use source::{parse_chat_line, ChannelSource, MessageSource, ReplaySource};
pub use switch::CommandSwitch;
pub use table::ActionTable;
pub use task::{Completion, Task, TaskHandle};
pub use types::{
    AuthorizationDecision, CommandEntry, ErrorOutcome, FailureFlag, TaskStatus, RANDOM_TAG,
};
