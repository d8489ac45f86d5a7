//! Node filtering: narrows a [`super::pool::ConnectionPool`] down to the subset a single
//! invocation should target.

use crate::error::PiclError;

/// Include/exclude narrowing applied to a connection pool for one invocation.
///
/// Exactly-one-of semantics: if both `included` and `excluded` are non-empty the
/// invocation is rejected before dispatch with [`PiclError::DuplicateFilter`]. An empty
/// filter selects every node.
#[derive(Debug, Clone, Default)]
pub struct ExecFilter {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
    pub with_sudo: bool,
}

impl ExecFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.included = names.into_iter().collect();
        self
    }

    pub fn exclude(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.excluded = names.into_iter().collect();
        self
    }

    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.with_sudo = sudo;
        self
    }

    /// Rejects filters that set both an include list and an exclude list.
    pub fn validate(&self) -> Result<(), PiclError> {
        if !self.included.is_empty() && !self.excluded.is_empty() {
            return Err(PiclError::DuplicateFilter);
        }
        Ok(())
    }

    /// Whether `name` is selected by this filter, per §4.3's rule: include-list wins
    /// when non-empty, else exclude-list, else everything matches.
    pub fn matches(&self, name: &str) -> bool {
        if !self.included.is_empty() {
            self.included.iter().any(|n| n == name)
        } else if !self.excluded.is_empty() {
            !self.excluded.iter().any(|n| n == name)
        } else {
            true
        }
    }
}

/// What to do when a file-transfer destination already exists on a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Leave the existing remote file untouched and report success.
    #[default]
    Ignore,
    /// Remove the existing file, then re-create it with the new content.
    Replace,
}

impl DuplicatePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Some(Self::Ignore),
            "replace" => Some(Self::Replace),
            _ => None,
        }
    }
}

/// [`ExecFilter`] plus the conflict policy applied when a copy verb's destination
/// already exists on a target node.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub filter: ExecFilter,
    pub duplicate_policy: DuplicatePolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_lists_set_is_rejected() {
        let filter = ExecFilter::new()
            .include(["a".to_string()])
            .exclude(["b".to_string()]);
        assert!(matches!(filter.validate(), Err(PiclError::DuplicateFilter)));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ExecFilter::new();
        assert!(filter.matches("nodeA"));
        assert!(filter.matches("anything"));
    }

    #[test]
    fn include_list_matches_only_named_nodes_in_any_order() {
        let filter = ExecFilter::new().include(["nodeA".to_string(), "nodeB".to_string()]);
        assert!(filter.matches("nodeA"));
        assert!(filter.matches("nodeB"));
        assert!(!filter.matches("nodeC"));
        assert!(!filter.matches("unknown-name"));
    }

    #[test]
    fn exclude_list_matches_everything_except_named_nodes() {
        let filter = ExecFilter::new().exclude(["nodeC".to_string()]);
        assert!(filter.matches("nodeA"));
        assert!(filter.matches("nodeB"));
        assert!(!filter.matches("nodeC"));
    }

    #[test]
    fn duplicate_policy_parses_case_insensitively() {
        assert_eq!(DuplicatePolicy::parse("Replace"), Some(DuplicatePolicy::Replace));
        assert_eq!(DuplicatePolicy::parse("ignore"), Some(DuplicatePolicy::Ignore));
        assert_eq!(DuplicatePolicy::parse("bogus"), None);
    }
}
