//! Replays the module commands of one script.
//!
//! The extractor walks the script once, top to bottom, and simulates what
//! the module system would have done: loads add to the active set, purges
//! clear it, swaps and unloads remove, and toolchain markers move the
//! active toolchain year. Whatever is active at the end of the text is the
//! script's loaded set.

use super::commands::{CommandTable, ExtractorConfig, ModuleOp};
use crate::error::ExtractorError;
use crate::models::{ModuleRef, ToolchainYear};
use std::collections::BTreeSet;
use tracing::trace;

/// Final state of a script after all commands were replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub toolchain_year: ToolchainYear,
    pub loaded: BTreeSet<ModuleRef>,
}

/// Module/toolchain extractor.
#[derive(Debug, Clone)]
pub struct Extractor {
    table: CommandTable,
    default_year: ToolchainYear,
}

impl Extractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractorError> {
        Ok(Self {
            table: CommandTable::new(config)?,
            default_year: ToolchainYear(config.default_toolchain_year),
        })
    }

    pub fn default_year(&self) -> ToolchainYear {
        self.default_year
    }

    /// Extract the toolchain year and loaded modules from script text.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut state = ModuleState::new(self.default_year);

        for line in logical_lines(text) {
            for op in self.table.classify(&line) {
                state.apply(op, &self.table);
            }
        }

        Extraction {
            toolchain_year: state.year,
            loaded: state.loaded,
        }
    }
}

struct ModuleState {
    year: ToolchainYear,
    loaded: BTreeSet<ModuleRef>,
}

impl ModuleState {
    fn new(year: ToolchainYear) -> Self {
        Self {
            year,
            loaded: BTreeSet::new(),
        }
    }

    fn apply(&mut self, op: ModuleOp, table: &CommandTable) {
        match op {
            ModuleOp::Load(module) => self.load(module, table),
            ModuleOp::Unload(module) => self.remove(&module),
            ModuleOp::Purge => self.loaded.clear(),
            ModuleOp::Swap { old, new } => {
                self.remove(&old);
                self.load(new, table);
            }
            ModuleOp::UseToolchain(year) => self.switch_toolchain(year),
        }
    }

    fn load(&mut self, module: ModuleRef, table: &CommandTable) {
        match table.toolchain_of(&module) {
            Some(year) => self.switch_toolchain(year),
            None => {
                self.loaded.insert(module);
            }
        }
    }

    fn switch_toolchain(&mut self, year: ToolchainYear) {
        if year != self.year {
            trace!("toolchain {} -> {}", self.year, year);
        }
        self.year = year;
    }

    /// A bare name drops every loaded version of that software.
    fn remove(&mut self, module: &ModuleRef) {
        if module.is_bare() {
            self.loaded.retain(|m| m.name() != module.name());
        } else {
            self.loaded.remove(module);
        }
    }
}

/// Lines of a script with `\`-continuations joined.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();

    for raw in text.split('\n') {
        let line = raw.trim_end_matches('\r');
        match line.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head);
                pending.push(' ');
            }
            None => {
                pending.push_str(line);
                lines.push(std::mem::take(&mut pending));
            }
        }
    }
    if !pending.is_empty() {
        lines.push(pending);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Extraction {
        Extractor::new(&ExtractorConfig::default())
            .unwrap()
            .extract(text)
    }

    fn loaded(e: &Extraction) -> Vec<&str> {
        e.loaded.iter().map(|m| m.as_str()).collect()
    }

    #[test]
    fn test_no_loads_yields_default() {
        let e = extract("#!/bin/bash\n#PBS -N test\ncd $PBS_O_WORKDIR\n./a.out\n");
        assert_eq!(e.toolchain_year, ToolchainYear::DEFAULT);
        assert!(e.loaded.is_empty());

        let empty = extract("");
        assert_eq!(empty.toolchain_year, ToolchainYear(2014));
        assert!(empty.loaded.is_empty());
    }

    #[test]
    fn test_purge_at_end_clears() {
        let e = extract("module load A/1.0\nmodule load B/2.0\nmodule purge\n");
        assert!(e.loaded.is_empty());
    }

    #[test]
    fn test_load_purge_load() {
        let e = extract("module load A/1.0\nmodule purge\nmodule load B/2.0\n");
        assert_eq!(loaded(&e), vec!["B/2.0"]);
    }

    #[test]
    fn test_purge_keeps_toolchain() {
        let e = extract("module load foss/2016a\nmodule purge\nmodule load A/1.0\n");
        assert_eq!(e.toolchain_year, ToolchainYear(2016));
        assert_eq!(loaded(&e), vec!["A/1.0"]);
    }

    #[test]
    fn test_load_then_swap() {
        let e = extract("module load A/1.0\nmodule swap A/1.0 B/2.0\n");
        assert_eq!(loaded(&e), vec!["B/2.0"]);
        assert_eq!(e.toolchain_year, ToolchainYear::DEFAULT);
    }

    #[test]
    fn test_swap_to_toolchain_updates_year() {
        let e = extract("module load intel/2015a\nmodule swap intel/2015a foss/2018a\n");
        assert_eq!(e.toolchain_year, ToolchainYear(2018));
        assert!(e.loaded.is_empty());
    }

    #[test]
    fn test_unload_never_loaded_is_noop() {
        let e = extract("module load A/1.0\nmodule unload X/9.9\nmodule unload X\n");
        assert_eq!(loaded(&e), vec!["A/1.0"]);
    }

    #[test]
    fn test_unload_exact_and_by_name() {
        let e = extract("module load A/1.0 A/2.0 B/1.0\nmodule unload A/1.0\n");
        assert_eq!(loaded(&e), vec!["A/2.0", "B/1.0"]);

        let e = extract("module load A/1.0 A/2.0 B/1.0\nmodule unload A\n");
        assert_eq!(loaded(&e), vec!["B/1.0"]);
    }

    #[test]
    fn test_repeated_loads_deduplicate() {
        let e = extract("module load A/1.0\nmodule load A/1.0\nml A/1.0\n");
        assert_eq!(loaded(&e), vec!["A/1.0"]);
    }

    #[test]
    fn test_last_toolchain_switch_wins() {
        let text = "\
source switch_to_2015a
module load A/1.0
module load foss/2016a
module load B/1.0
module use /apps/leuven/thinking/2018a/modules/all
";
        let e = extract(text);
        assert_eq!(e.toolchain_year, ToolchainYear(2018));
        assert_eq!(loaded(&e), vec!["A/1.0", "B/1.0"]);
    }

    #[test]
    fn test_toolchain_module_not_counted() {
        let e = extract("module load leuven/2018a Python/3.6.4-foss-2018a\n");
        assert_eq!(e.toolchain_year, ToolchainYear(2018));
        assert_eq!(loaded(&e), vec!["Python/3.6.4-foss-2018a"]);
    }

    #[test]
    fn test_configured_default_year() {
        let config = ExtractorConfig {
            default_toolchain_year: 2016,
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(&config).unwrap();
        assert_eq!(extractor.default_year(), ToolchainYear(2016));
        assert_eq!(extractor.extract("echo hi").toolchain_year, ToolchainYear(2016));
    }

    #[test]
    fn test_crlf_and_continuations() {
        let e = extract("module load A/1.0 \\\r\n    B/2.0\r\nmodule unload A/1.0\r\n");
        assert_eq!(loaded(&e), vec!["B/2.0"]);
    }

    #[test]
    fn test_realistic_script() {
        let text = r#"#!/bin/bash -l
#PBS -l nodes=2:ppn=20:haswell
#PBS -l walltime=24:00:00
#PBS -A lp_project

cd $PBS_O_WORKDIR
module purge
source switch_to_2015a
module load intel/2015a
module load GROMACS/5.0.4-intel-2015a-hybrid # md engine
module load Python/2.7.9-intel-2015a
module unload Python
mpirun gmx_mpi mdrun -s topol.tpr
"#;
        let e = extract(text);
        assert_eq!(e.toolchain_year, ToolchainYear(2015));
        assert_eq!(loaded(&e), vec!["GROMACS/5.0.4-intel-2015a-hybrid"]);
    }

    #[test]
    fn test_shell_noise_is_not_loaded() {
        let e = extract("ml list\nml av\nml spider GROMACS\nml save mine\n");
        assert!(e.loaded.is_empty());

        let e = extract("module load A/1.0 > /dev/null 2>&1\nmodule load B/2.0 &\n");
        assert_eq!(loaded(&e), vec!["A/1.0", "B/2.0"]);
    }

    #[test]
    fn test_conditional_toolchain_switch() {
        let text = "\
if [ \"$CLUSTER\" = thinking ]; then
    source switch_to_2016a
    module load A/1.0 >/dev/null
fi
";
        let e = extract(text);
        assert_eq!(e.toolchain_year, ToolchainYear(2016));
        assert_eq!(loaded(&e), vec!["A/1.0"]);
    }

    #[test]
    fn test_logical_lines() {
        assert_eq!(logical_lines("a\nb"), vec!["a", "b"]);
        assert_eq!(logical_lines("a \\\nb\nc"), vec!["a  b", "c"]);
        assert_eq!(logical_lines("a \\"), vec!["a  "]);
    }
}
