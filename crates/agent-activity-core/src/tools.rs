//! Tool-name extraction from free-text operation labels.
//!
//! The agent runtime does not emit a dedicated tool field; some operation
//! labels encode one (`"read_file: src/main.rs"`), most do not
//! (`"Analyzing repository"`). Which convention applies depends on the
//! runtime, so the rule is chosen by configuration.

use regex::Regex;

use crate::error::{ActivityError, Result};

/// How to pull a tool name out of an operation label.
#[derive(Debug, Clone)]
pub enum ToolRule {
    /// Never extract a tool; tool usage stays empty.
    None,
    /// Text before the first `separator`, when it is a single token.
    Prefix { separator: String },
    /// First capture group of the pattern, or the whole match when the
    /// pattern has no groups.
    Regex(Regex),
}

impl Default for ToolRule {
    fn default() -> Self {
        ToolRule::Prefix {
            separator: ":".to_string(),
        }
    }
}

impl ToolRule {
    pub fn prefix(separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(ActivityError::InvalidArgument(
                "tool separator must not be empty".into(),
            ));
        }
        Ok(ToolRule::Prefix { separator })
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(ToolRule::Regex)
            .map_err(|e| ActivityError::InvalidArgument(format!("invalid tool pattern: {}", e)))
    }

    /// Extract the tool name from `operation`, if the label carries one.
    pub fn extract<'a>(&self, operation: &'a str) -> Option<&'a str> {
        let tool = match self {
            ToolRule::None => return None,
            ToolRule::Prefix { separator } => {
                let (head, _) = operation.split_once(separator.as_str())?;
                let head = head.trim();
                if head.contains(char::is_whitespace) {
                    return None;
                }
                head
            }
            ToolRule::Regex(re) => {
                let caps = re.captures(operation)?;
                caps.get(1).or_else(|| caps.get(0))?.as_str().trim()
            }
        };
        if tool.is_empty() {
            None
        } else {
            Some(tool)
        }
    }
}
