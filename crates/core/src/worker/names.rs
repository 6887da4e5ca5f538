//! Partition naming for one deployed version.

use std::collections::HashSet;

/// Names derived from `{app}-v{version}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    app: String,
    umbrella: String,
}

impl CacheNames {
    pub fn new(app: &str, version: &str) -> Self {
        Self { app: app.to_string(), umbrella: format!("{app}-v{version}") }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    /// Version-qualified prefix shared by every partition of this version.
    pub fn umbrella(&self) -> &str {
        &self.umbrella
    }

    pub fn qualify(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.umbrella)
    }

    pub fn static_partition(&self) -> String {
        self.qualify("static")
    }

    pub fn api_partition(&self) -> String {
        self.qualify("api")
    }

    pub fn dynamic_partition(&self) -> String {
        self.qualify("dynamic")
    }

    /// Whether `name` is this version's umbrella or one of its partitions.
    pub fn is_current(&self, name: &str) -> bool {
        name.strip_prefix(self.umbrella.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
    }

    /// Partitions that survive activation of this version.
    pub fn current_set(&self) -> HashSet<String> {
        HashSet::from([self.static_partition(), self.api_partition()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let names = CacheNames::new("portal", "2.1.0");
        assert_eq!(names.umbrella(), "portal-v2.1.0");
        assert_eq!(names.static_partition(), "portal-v2.1.0-static");
        assert_eq!(names.api_partition(), "portal-v2.1.0-api");
        assert_eq!(names.qualify("fonts"), "portal-v2.1.0-fonts");
        assert_eq!(names.current_set().len(), 2);
        assert!(!names.current_set().contains(&names.dynamic_partition()));
    }

    #[test]
    fn test_is_current() {
        let names = CacheNames::new("portal", "2.1.0");
        assert!(names.is_current("portal-v2.1.0-dynamic"));
        assert!(names.is_current("portal-v2.1.0-fonts"));
        assert!(!names.is_current("portal-v2.1.0.1-static"));
        assert!(!names.is_current("portal-v2.0.0-static"));
    }
}
