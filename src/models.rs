//! Data models for module statistics.
//!
//! This module contains the core value types used throughout the
//! application: module references, toolchain years, per-script records,
//! ranking entries and batch statistics.

use crate::error::ScriptError;
use crate::extract::Extractor;
use crate::jobxml::JobMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// A module reference exactly as written in a script, e.g. `Python/3.6.4-foss-2018a`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleRef(String);

impl ModuleRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Software name: everything before the first `/`.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(name, _)| name)
    }

    /// Version or variant suffix, if the reference has one.
    #[allow(dead_code)] // Counterpart of `name`
    pub fn version(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, version)| version)
    }

    /// Whether the reference names a software without pinning a version.
    pub fn is_bare(&self) -> bool {
        !self.0.contains('/')
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Yearly toolchain generation, e.g. 2016 for `foss/2016a`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ToolchainYear(pub u16);

impl ToolchainYear {
    /// Assumed when a script never selects a toolchain.
    pub const DEFAULT: ToolchainYear = ToolchainYear(2014);
}

impl Default for ToolchainYear {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ToolchainYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which key a loaded module contributes to the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountBy {
    /// Full reference as written (`Python/3.6.4-foss-2018a`)
    #[default]
    Module,
    /// Software name only (`Python`)
    Name,
    /// Reference prefixed with the toolchain year (`2018/Python/3.6.4-foss-2018a`)
    Toolchain,
}

/// Extraction result for one job script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    path: PathBuf,
    toolchain_year: ToolchainYear,
    loaded: BTreeSet<ModuleRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job: Option<JobMetadata>,
}

impl ScriptRecord {
    /// Build a record from script text already in memory.
    pub fn from_text(path: impl Into<PathBuf>, text: &str, extractor: &Extractor) -> Self {
        let extraction = extractor.extract(text);
        Self {
            path: path.into(),
            toolchain_year: extraction.toolchain_year,
            loaded: extraction.loaded,
            job: None,
        }
    }

    /// Read a script from disk and build its record.
    ///
    /// Non UTF-8 bytes are replaced rather than rejected; only I/O failures
    /// are reported.
    pub fn read(path: &Path, extractor: &Extractor) -> Result<Self, ScriptError> {
        let bytes = std::fs::read(path).map_err(|source| ScriptError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(Self::from_text(path, &text, extractor))
    }

    /// Attach scheduler metadata parsed from the companion job record.
    pub fn with_job(self, job: JobMetadata) -> Self {
        Self {
            job: Some(job),
            ..self
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn toolchain_year(&self) -> ToolchainYear {
        self.toolchain_year
    }

    pub fn loaded(&self) -> &BTreeSet<ModuleRef> {
        &self.loaded
    }

    pub fn job(&self) -> Option<&JobMetadata> {
        self.job.as_ref()
    }

    pub fn has_modules(&self) -> bool {
        !self.loaded.is_empty()
    }

    /// Counter keys contributed by this record. Keys are unique per record.
    pub fn count_keys(&self, count_by: CountBy) -> BTreeSet<String> {
        self.loaded
            .iter()
            .map(|module| match count_by {
                CountBy::Module => module.to_string(),
                CountBy::Name => module.name().to_string(),
                CountBy::Toolchain => format!("{}/{}", self.toolchain_year, module),
            })
            .collect()
    }
}

/// One row of a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub module: String,
    pub count: u64,
}

impl RankEntry {
    pub fn new(module: impl Into<String>, count: u64) -> Self {
        Self {
            module: module.into(),
            count,
        }
    }
}

/// Counts gathered while processing a batch of scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Scripts attempted.
    pub total: usize,
    /// Scripts that ended with at least one loaded module.
    pub with_modules: usize,
    /// Scripts read successfully but with no loaded module.
    pub without_modules: usize,
    /// Scripts that could not be read.
    pub unreadable: usize,
    /// Scripts that carried a companion job record.
    pub with_job_record: usize,
    /// Resolved toolchain year per readable script.
    pub toolchains: BTreeMap<ToolchainYear, usize>,
    /// Scheduler queue per script with a job record.
    pub queues: BTreeMap<String, usize>,
}

impl BatchStats {
    /// Account for one successfully built record.
    pub fn observe(&mut self, record: &ScriptRecord) {
        self.total += 1;
        if record.has_modules() {
            self.with_modules += 1;
        } else {
            self.without_modules += 1;
        }
        *self.toolchains.entry(record.toolchain_year()).or_default() += 1;

        if let Some(job) = record.job() {
            self.with_job_record += 1;
            if let Some(ref queue) = job.queue {
                *self.queues.entry(queue.clone()).or_default() += 1;
            }
        }
    }

    /// Account for a script that could not be read.
    pub fn observe_unreadable(&mut self) {
        self.total += 1;
        self.unreadable += 1;
    }

    /// Readable scripts.
    pub fn readable(&self) -> usize {
        self.with_modules + self.without_modules
    }

    /// Percentage of all scripts that loaded at least one module.
    pub fn percent_with_modules(&self) -> f64 {
        percent(self.with_modules, self.total)
    }

    /// Percentage of all scripts that could not be read.
    pub fn percent_unreadable(&self) -> f64 {
        percent(self.unreadable, self.total)
    }
}

/// Metadata about a ranking report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Date and time the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Key the counts were gathered under.
    pub count_by: CountBy,
    /// Requested ranking length.
    pub top_n: usize,
    /// Number of distinct counter keys.
    pub distinct_modules: usize,
    /// Sum of all counts.
    pub total_loads: u64,
    /// Duration of the batch in seconds.
    pub duration_seconds: f64,
}

/// The complete module usage report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub stats: BatchStats,
    pub ranking: Vec<RankEntry>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorConfig;

    fn extractor() -> Extractor {
        Extractor::new(&ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn test_module_ref_parts() {
        let m = ModuleRef::from("Python/3.6.4-foss-2018a");
        assert_eq!(m.name(), "Python");
        assert_eq!(m.version(), Some("3.6.4-foss-2018a"));
        assert!(!m.is_bare());

        let bare = ModuleRef::from("matlab");
        assert_eq!(bare.name(), "matlab");
        assert_eq!(bare.version(), None);
        assert!(bare.is_bare());
    }

    #[test]
    fn test_record_from_text() {
        let text = "#!/bin/bash\n#PBS -l walltime=1:00:00\nmodule load A/1.0\nmodule load B/2.0\n";
        let record = ScriptRecord::from_text("job.SC", text, &extractor());

        assert_eq!(record.path(), Path::new("job.SC"));
        assert_eq!(record.toolchain_year(), ToolchainYear::DEFAULT);
        assert!(record.has_modules());
        let loaded: Vec<_> = record.loaded().iter().map(|m| m.as_str()).collect();
        assert_eq!(loaded, vec!["A/1.0", "B/2.0"]);
        assert!(record.job().is_none());
    }

    #[test]
    fn test_record_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.SC");

        let err = ScriptRecord::read(&missing, &extractor()).unwrap_err();
        assert!(matches!(err, ScriptError::Unreadable { ref path, .. } if path == &missing));
    }

    #[test]
    fn test_record_read_lossy_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.SC");
        std::fs::write(&path, b"\xff\xfe\nmodule load A/1.0\n").unwrap();

        let record = ScriptRecord::read(&path, &extractor()).unwrap();
        assert!(record.loaded().contains(&ModuleRef::from("A/1.0")));
    }

    #[test]
    fn test_count_keys() {
        let text = "module load foss/2016a\nmodule load Python/2.7.11\nmodule load GSL/2.1\n";
        let record = ScriptRecord::from_text("job.SC", text, &extractor());

        let by_module: Vec<_> = record.count_keys(CountBy::Module).into_iter().collect();
        assert_eq!(by_module, vec!["GSL/2.1", "Python/2.7.11"]);

        let by_name: Vec<_> = record.count_keys(CountBy::Name).into_iter().collect();
        assert_eq!(by_name, vec!["GSL", "Python"]);

        let by_toolchain: Vec<_> = record.count_keys(CountBy::Toolchain).into_iter().collect();
        assert_eq!(by_toolchain, vec!["2016/GSL/2.1", "2016/Python/2.7.11"]);
    }

    #[test]
    fn test_name_keys_deduplicate() {
        let text = "module load Python/2.7\nmodule load Python/3.6\n";
        let record = ScriptRecord::from_text("job.SC", text, &extractor());
        assert_eq!(record.loaded().len(), 2);
        assert_eq!(record.count_keys(CountBy::Name).len(), 1);
    }

    #[test]
    fn test_batch_stats_observe() {
        let ex = extractor();
        let mut stats = BatchStats::default();
        stats.observe(&ScriptRecord::from_text("a.SC", "module load A/1.0", &ex));
        stats.observe(&ScriptRecord::from_text("b.SC", "echo hello", &ex));
        stats.observe_unreadable();
        stats.observe_unreadable();

        assert_eq!(stats.total, 4);
        assert_eq!(stats.with_modules, 1);
        assert_eq!(stats.without_modules, 1);
        assert_eq!(stats.unreadable, 2);
        assert_eq!(stats.readable(), 2);
        assert_eq!(stats.toolchains.get(&ToolchainYear::DEFAULT), Some(&2));
        assert_eq!(stats.percent_with_modules(), 25.0);
        assert_eq!(stats.percent_unreadable(), 50.0);
    }

    #[test]
    fn test_percent_of_empty_batch() {
        let stats = BatchStats::default();
        assert_eq!(stats.percent_with_modules(), 0.0);
    }
}
