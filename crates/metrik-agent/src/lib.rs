//! The metrik agent: samples process and host metrics into a local repository
//! and periodically reports them to a metrik server.

pub mod agent;
pub mod config;
pub mod error;
pub mod reporter;

pub use agent::{Agent, AgentBuilder};
pub use config::AgentConfig;
pub use error::{AgentError, ReportError};
pub use reporter::{ReportShape, Reporter};
