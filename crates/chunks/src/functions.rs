use std::collections::HashSet;
use std::sync::Arc;

/// Insertion-ordered set of shared GLSL helper functions.
///
/// Membership is exact text identity: two helpers that differ by a single
/// whitespace character are distinct entries. Entries are never removed, so a
/// plugin kind that disappears and comes back finds its helper still present.
#[derive(Debug, Clone, Default)]
pub struct SharedFunctionSet {
    order: Vec<Arc<str>>,
    members: HashSet<Arc<str>>,
}

impl SharedFunctionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `source` unless an identical text is already present.
    ///
    /// Returns `true` when the text was new. Empty text is ignored.
    pub fn register_if_absent(&mut self, source: &str) -> bool {
        if source.is_empty() || self.members.contains(source) {
            return false;
        }
        let entry: Arc<str> = Arc::from(source);
        self.members.insert(entry.clone());
        self.order.push(entry);
        true
    }

    pub fn contains(&self, source: &str) -> bool {
        self.members.contains(source)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Functions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|entry| entry.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_registration_keeps_one_copy() {
        let mut set = SharedFunctionSet::new();
        for attempt in 0..5 {
            let inserted = set.register_if_absent("float foo(){return 1.0;}");
            assert_eq!(inserted, attempt == 0);
        }
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn near_identical_text_is_distinct() {
        let mut set = SharedFunctionSet::new();
        set.register_if_absent("float foo(){return 1.0;}");
        set.register_if_absent("float foo() {return 1.0;}");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut set = SharedFunctionSet::new();
        set.register_if_absent("float b(){return 2.0;}");
        set.register_if_absent("float a(){return 1.0;}");
        set.register_if_absent("float b(){return 2.0;}");
        let collected: Vec<&str> = set.iter().collect();
        assert_eq!(
            collected,
            vec!["float b(){return 2.0;}", "float a(){return 1.0;}"]
        );
        assert!(!set.register_if_absent(""));
    }
}
