use regex::Regex;
use tracing::warn;

use crate::error::{Result, ScanError};

/// Ordered set of URI patterns a scan must not request.
///
/// Patterns match the whole URI, so `https://example.com/logout` excludes that
/// page only while `https://example.com/admin/.*` excludes a subtree.
#[derive(Debug, Clone, Default)]
pub struct ExcludeList {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl ExcludeList {
    /// Compile every pattern, failing on the first invalid one.
    pub fn try_compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut list = Self::default();
        for pattern in patterns {
            list.push(pattern.as_ref())?;
        }
        Ok(list)
    }

    /// Compile what can be compiled; invalid patterns are logged and skipped.
    pub fn lenient<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut list = Self::default();
        for pattern in patterns {
            if let Err(err) = list.push(pattern.as_ref()) {
                warn!(target: "rampart::exclude", error = %err, "skipping exclude pattern");
            }
        }
        list
    }

    fn push(&mut self, pattern: &str) -> Result<()> {
        let anchored = format!("^(?:{pattern})$");
        let regex =
            Regex::new(&anchored).map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        self.patterns.push(pattern.to_string());
        self.compiled.push(regex);
        Ok(())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    pub fn is_excluded(&self, uri: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(uri))
    }
}
