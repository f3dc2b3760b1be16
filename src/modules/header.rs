//! Module header parser
//!
//! Modules describe themselves with comment lines at column 0:
//!
//! ```text
//! # Help: target - host or CIDR to scan
//! # Inputs: target, ports
//! # Dependencies: nmap, jq
//! # Silent: true
//! # Logfile: logs/scan.log
//! # Follow_log: true
//! ```
//!
//! `Help` may repeat. For every other tag the first occurrence wins.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::Result;

const HELP_TAG: &str = "# Help:";
const FOLLOW_LOG_TAG: &str = "# Follow_log:";
const SILENT_TAG: &str = "# Silent:";
const LOGFILE_TAG: &str = "# Logfile:";
const DEPENDENCIES_TAG: &str = "# Dependencies:";
const INPUTS_TAG: &str = "# Inputs:";

const NO_DESCRIPTION: &str = "No description available";

/// Metadata declared in a module's comment header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleHeader {
    pub help: BTreeMap<String, String>,
    pub follow_log: bool,
    pub silent: bool,
    pub logfile: Option<String>,
    pub dependencies: Vec<String>,
    pub inputs: Vec<String>,
}

impl ModuleHeader {
    /// Parse header tags out of module source text
    pub fn parse(text: &str) -> Self {
        let mut header = ModuleHeader::default();
        let mut follow_log = None;
        let mut silent = None;
        let mut logfile = None;
        let mut dependencies = None;
        let mut inputs = None;

        for line in text.lines() {
            if let Some(info) = line.strip_prefix(HELP_TAG) {
                let (key, desc) = match info.split_once('-') {
                    Some((key, desc)) => (key.trim(), desc.trim()),
                    None => (info.trim(), NO_DESCRIPTION),
                };
                if !key.is_empty() {
                    header.help.insert(key.to_string(), desc.to_string());
                }
            } else if let Some(value) = line.strip_prefix(FOLLOW_LOG_TAG) {
                follow_log.get_or_insert_with(|| parse_flag(value));
            } else if let Some(value) = line.strip_prefix(SILENT_TAG) {
                silent.get_or_insert_with(|| parse_flag(value));
            } else if let Some(value) = line.strip_prefix(LOGFILE_TAG) {
                logfile.get_or_insert_with(|| value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(DEPENDENCIES_TAG) {
                dependencies.get_or_insert_with(|| parse_list(value));
            } else if let Some(value) = line.strip_prefix(INPUTS_TAG) {
                inputs.get_or_insert_with(|| parse_list(value));
            }
        }

        header.follow_log = follow_log.unwrap_or(false);
        header.silent = silent.unwrap_or(false);
        header.logfile = logfile.filter(|path| !path.is_empty());
        header.dependencies = dependencies.unwrap_or_default();
        header.inputs = inputs.unwrap_or_default();
        header
    }

    /// Read and parse a module file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn help_for(&self, input: &str) -> Option<&str> {
        self.help.get(input).map(String::as_str)
    }

    /// Prompt text for one declared input, with its help when present
    pub fn input_prompt(&self, input: &str) -> String {
        match self.help_for(input) {
            Some(help) => format!("{}: ({}) ", input, help),
            None => format!("{}: ", input),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
