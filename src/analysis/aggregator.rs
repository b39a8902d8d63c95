//! Module load counting and ranking.
//!
//! This module provides the counter that accumulates module loads from many
//! script records and ranks the most used modules.

use crate::models::{CountBy, RankEntry, ScriptRecord};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Cumulative load count per module identifier.
///
/// Counts only ever grow; any string is a valid key.
#[derive(Debug, Clone, Default)]
pub struct ModuleCounter {
    counts: HashMap<String, u64>,
}

impl ModuleCounter {
    /// Count one more load of `module`, creating the entry if needed.
    pub fn increment(&mut self, module: &str) {
        match self.counts.get_mut(module) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(module.to_string(), 1);
            }
        }
    }

    /// Count every module a script ended up with.
    pub fn record(&mut self, record: &ScriptRecord, count_by: CountBy) {
        for key in record.count_keys(count_by) {
            self.increment(&key);
        }
    }

    #[allow(dead_code)] // Lookup for callers holding a finished counter
    pub fn get(&self, module: &str) -> u64 {
        self.counts.get(module).copied().unwrap_or(0)
    }

    /// Number of distinct modules seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// The `n` most loaded modules, most loaded first.
    ///
    /// Equal counts are ordered by module identifier so the result does not
    /// depend on hash order.
    pub fn top_n(&self, n: usize) -> Vec<RankEntry> {
        let mut entries: Vec<(&String, u64)> =
            self.counts.iter().map(|(m, c)| (m, *c)).collect();

        entries.sort_by_key(|&(module, count)| (Reverse(count), module));
        entries.truncate(n);

        entries
            .into_iter()
            .map(|(module, count)| RankEntry::new(module.clone(), count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{Extractor, ExtractorConfig};

    fn entries(ranking: &[RankEntry]) -> Vec<(&str, u64)> {
        ranking.iter().map(|e| (e.module.as_str(), e.count)).collect()
    }

    #[test]
    fn test_increment_new_and_existing() {
        let mut counter = ModuleCounter::default();
        assert!(counter.is_empty());
        assert_eq!(counter.get("A/1.0"), 0);

        counter.increment("A/1.0");
        counter.increment("A/1.0");
        counter.increment("never-seen-before");

        assert_eq!(counter.get("A/1.0"), 2);
        assert_eq!(counter.get("never-seen-before"), 1);
        assert_eq!(counter.len(), 2);
        assert_eq!(counter.total(), 3);
    }

    #[test]
    fn test_top_n_orders_by_count_then_name() {
        let mut counter = ModuleCounter::default();
        for module in ["b", "a", "c", "c", "d", "d", "d"] {
            counter.increment(module);
        }

        assert_eq!(
            entries(&counter.top_n(10)),
            vec![("d", 3), ("c", 2), ("a", 1), ("b", 1)]
        );
        assert_eq!(entries(&counter.top_n(3)), vec![("d", 3), ("c", 2), ("a", 1)]);
        assert!(counter.top_n(0).is_empty());
    }

    #[test]
    fn test_top_n_is_deterministic() {
        let mut counter = ModuleCounter::default();
        for i in 0..100 {
            counter.increment(&format!("mod{:03}", i % 37));
        }
        let first = counter.top_n(20);
        for _ in 0..5 {
            assert_eq!(counter.top_n(20), first);
        }
    }

    #[test]
    fn test_end_to_end_three_scripts() {
        let extractor = Extractor::new(&ExtractorConfig::default()).unwrap();
        let scripts = [
            "module load A/1.0\n",
            "module load A/1.0\nmodule load B/2.0\n",
            "module load A/1.0\nmodule purge\n",
        ];

        let mut counter = ModuleCounter::default();
        for (i, text) in scripts.iter().enumerate() {
            let record = ScriptRecord::from_text(format!("{}.SC", i), text, &extractor);
            counter.record(&record, CountBy::Module);
        }

        assert_eq!(entries(&counter.top_n(3)), vec![("A/1.0", 2), ("B/2.0", 1)]);
    }
}
