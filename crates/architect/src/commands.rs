//! Installed command artifacts.
//!
//! Every `commands/<name>.rs` file is one command. `build.rs` enumerates the
//! directory and generates the module declarations plus [`ENTRY_POINTS`], so
//! each artifact's handler is bound at compile time. Which artifacts are live
//! in a running process is decided by [`crate::registry::load_artifacts`],
//! which reads command storage once at startup.
//!
//! An artifact looks like this:
//!
//! ```ignore
//! use crate::commands::prelude::*;
//!
//! command! {
//!     name: "ping",
//!     description: "Responds with 'pong'",
//!     pattern: r"^!ping$",
//!     handler: ping_handler,
//! }
//!
//! pub async fn ping_handler(_body: &str) -> CoreResult<Option<String>> {
//!     Ok(Some("pong".to_string()))
//! }
//! ```

use crate::registry::EntryPoint;

/// Items every command artifact imports.
pub mod prelude {
    pub use crate::command;
    pub use crate::error::{CoreError, CoreResult};
}

/// Registration marker for a command artifact.
///
/// Only the handler binding is compiled; `description` and `pattern` are read
/// from the artifact source by the registry loader, so the file on disk stays
/// the single source of truth for a command's metadata.
#[macro_export]
macro_rules! command {
    (
        name: $name:literal,
        description: $description:literal,
        pattern: $pattern:literal,
        handler: $handler:ident $(,)?
    ) => {
        fn __entry(body: &str) -> $crate::registry::HandlerFuture<'_> {
            ::std::boxed::Box::pin($handler(body))
        }

        pub const ENTRY: $crate::registry::EntryPoint = $crate::registry::EntryPoint {
            name: $name,
            handler: __entry,
        };
    };
}

include!(concat!(env!("OUT_DIR"), "/command_manifest.rs"));

/// Compiled entry points of every artifact present at build time.
pub fn entry_points() -> &'static [EntryPoint] {
    ENTRY_POINTS
}
