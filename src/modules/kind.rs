//! Module file naming rules and interpreter selection

use crate::errors::{NmbError, Result};

/// Interpreter family of a module, decided by its file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Bash,
    Python,
}

impl ScriptKind {
    /// `.sh` runs under bash, `.py` under python3
    pub fn from_name(name: &str) -> Result<Self> {
        if name.ends_with(".sh") {
            Ok(ScriptKind::Bash)
        } else if name.ends_with(".py") {
            Ok(ScriptKind::Python)
        } else {
            Err(NmbError::UnsupportedModuleType(name.to_string()))
        }
    }

    pub fn interpreter(&self) -> &'static str {
        match self {
            ScriptKind::Bash => "bash",
            ScriptKind::Python => "python3",
        }
    }
}

/// Reject names that are empty or would leave the modules directory
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');

    if invalid {
        return Err(NmbError::InvalidModuleName(name.to_string()));
    }
    Ok(())
}
