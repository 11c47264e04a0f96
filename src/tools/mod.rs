//! Tool surface exposed to the reasoning loop.
//!
//! A fixed catalog of named, schema-validated operations ([`catalog`]),
//! a tagged union of typed call variants ([`request`]), and the
//! dispatcher that routes them to the selector store, the extraction
//! flow, the automation server, and the screenshot cache.

pub mod catalog;
pub mod dispatcher;
pub mod request;
pub mod result;

pub use catalog::ToolSpec;
pub use dispatcher::{DispatchSettings, ToolDispatcher};
pub use request::{ToolParseError, ToolRequest};
pub use result::{FailureCode, ToolResult};
