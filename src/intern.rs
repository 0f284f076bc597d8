use std::collections::HashMap;

/// A lock class: an equivalence class of lock instances sharing a
/// canonical dotted label. Identified by a dense ID assigned at first
/// intern and stable for the lifetime of the analysis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

/// Bijection between lock-class labels and dense IDs, with a parallel
/// vector for reverse lookup. Not thread-safe; the walker is sequential.
#[derive(Debug, Default)]
pub struct InternTable {
    ids: HashMap<String, ClassId>,
    labels: Vec<String>,
    unique: Vec<bool>,
}

impl InternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing ID for `label` or assigns the next free one.
    /// The uniqueness flag is fixed at first intern.
    pub fn intern(&mut self, label: &str, is_unique: bool) -> ClassId {
        if let Some(id) = self.ids.get(label) {
            return *id;
        }

        let id = ClassId(self.labels.len() as u32);
        self.ids.insert(label.to_string(), id);
        self.labels.push(label.to_string());
        self.unique.push(is_unique);

        id
    }

    pub fn lookup(&self, label: &str) -> Option<ClassId> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: ClassId) -> &str {
        &self.labels[id.0 as usize]
    }

    pub fn is_unique(&self, id: ClassId) -> bool {
        self.unique[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeed_when_interning_distinct_labels() {
        // arrange
        let mut table = InternTable::new();

        // act
        let a = table.intern("runtime.sched", true);
        let b = table.intern("runtime.allglock", true);

        // assert
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.label(a), "runtime.sched");
        assert_eq!(table.label(b), "runtime.allglock");
    }

    #[test]
    fn succeed_when_interning_same_label_twice() {
        // arrange
        let mut table = InternTable::new();

        // act
        let first = table.intern("sync.Mutex.mu", false);
        let second = table.intern("sync.Mutex.mu", true);

        // assert
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        // uniqueness is fixed at first intern
        assert!(!table.is_unique(first));
    }

    #[test]
    fn succeed_when_looking_up_missing_label() {
        // arrange
        let table = InternTable::new();

        // act
        let id = table.lookup("runtime.sched");

        // assert
        assert_eq!(id, None);
    }
}
