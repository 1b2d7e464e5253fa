//! Terminal client for a set of engineering assistant agents (CAD,
//! meshing, simulation) served over HTTP.
//!
//! The core is [`dispatch::DispatchController`], which owns the
//! [`session::SessionState`] and moves it between idle and awaiting a
//! reply. The [`ui`] module is one front end for it; the `ask` subcommand
//! is another.

pub mod agent;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod session;
pub mod transcript;
pub mod ui;

pub use agent::{AgentId, AgentInfo};
pub use config::Config;
pub use dispatch::{DispatchController, Settlement, SubmitOutcome};
