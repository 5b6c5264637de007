#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod location;
pub mod logging;
pub mod media;
pub mod parser;
pub mod resolver;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use engine::{Engine, RequestInfo, ResponseSink};
pub use resolver::{InteractionHints, Resolution};
pub use store::{CorrelationStore, MediaRecord, PostId};
