// Datachat - tool-calling data assistant
// Library exports

// Core turn loop
pub mod conversation;
pub mod errors;
pub mod orchestrator;
pub mod tools;

// Collaborators
pub mod providers;
pub mod session;
pub mod sql;

// Service plumbing
pub mod config;
pub mod logging;
pub mod server;

pub use conversation::{Message, Role, ToolCall};
pub use errors::{ToolError, ToolErrorKind, TurnError};
pub use orchestrator::{
    Orchestrator, TurnEvent, TurnHandle, TurnOutcome, TurnRequest, TurnStatus,
};
