//! Disambiguation of logical document names within one session

use std::collections::HashMap;

/// `documentName -> usage count`
///
/// The first registration of a name gets the name itself, later ones get
/// `name_1`, `name_2`, ...
#[derive(Debug, Default)]
pub struct DocumentNameTable {
    used: HashMap<String, usize>,
}

impl DocumentNameTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str) -> String {
        let count = self.used.entry(name.to_string()).or_insert(0);
        let fixed = if *count > 0 {
            format!("{name}_{count}")
        } else {
            name.to_string()
        };
        *count += 1;
        fixed
    }

    /// How many documents registered `name` so far
    #[must_use]
    pub fn usage(&self, name: &str) -> usize {
        self.used.get(name).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_index_documents() {
        let mut table = DocumentNameTable::new();
        assert_eq!(table.register("index"), "index");
        assert_eq!(table.register("index"), "index_1");
        assert_eq!(table.register("index"), "index_2");
        assert_eq!(table.register("other"), "other");
        assert_eq!(table.usage("index"), 3);
    }
}
