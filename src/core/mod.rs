//! # Core Application Logic
//!
//! Turns a math question into a validated interactive scenario.
//! It knows nothing about the command line or any specific provider API.
//!
//! ```text
//!   question
//!      │
//!      ▼
//!  ┌────────┐  tool call   ┌──────────────────────────────┐
//!  │ router │ ───────────▶ │ registry                     │
//!  └────────┘              │  addition │ deletion │ division│
//!                          └──────────────┬───────────────┘
//!                                         │ JSON text
//!                                         ▼
//!                                   ┌──────────┐
//!                                   │ validate │ ──▶ Scenario
//!                                   └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: one request end to end, with limits and staged logging
//! - [`router`]: picks the representation method
//! - [`tools`]: the builders and the registry that names them
//! - [`validate`]: the local schema check on builder output
//! - [`scenario`]: the typed result shapes
//! - [`config`]: file, environment and flag resolution

pub mod agent;
pub mod config;
pub mod error;
pub mod method;
pub mod prompt;
pub mod router;
pub mod scenario;
pub mod tools;
pub mod validate;

pub use agent::{Agent, Answer};
pub use error::AgentError;
pub use method::RepresentationMethod;
pub use scenario::Scenario;
