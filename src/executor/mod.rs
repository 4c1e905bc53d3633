mod apply;
mod client;
mod observer;

pub use apply::{ApplyEngine, ApplyPhase, ApplyReport, ScriptResult};
pub use client::{ColumnInfo, CommandClient, CommandResult};
pub use observer::StateObserver;
