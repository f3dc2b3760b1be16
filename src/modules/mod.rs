//! Module catalog: header parsing, the local module directory, and the
//! remote registry modules are downloaded from.

pub mod header;
pub mod kind;
pub mod registry;
pub mod store;

pub use header::ModuleHeader;
pub use kind::{validate_name, ScriptKind};
pub use registry::{RegistryClient, RegistryEntry};
pub use store::ModuleStore;

/// Convert CRLF line endings to LF
pub fn to_unix_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
