//! Command and query protocol
//!
//! Clients send `{ key, params }` envelopes. Commands mutate state and move
//! through a small lifecycle that is broadcast as events, queries are read-only.

mod command;
mod dispatcher;
mod error;
mod query;

pub use command::{ClientCommand, CommandOutput, CommandRequest};
pub use dispatcher::Dispatcher;
pub use error::{CoreError, ErrorKind};
pub use query::{ClientQuery, QueryOutput};

use serde::{Deserialize, Serialize};

/// Lifecycle of a dispatched command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum CommandState {
	Received,
	Validated,
	Executing,
	Completed,
	Failed,
}
