//! Recognition of environment-module commands in script lines.
//!
//! The set of verbs, command prefixes and toolchain naming rules is a
//! configuration table ([`ExtractorConfig`]) compiled once into a
//! [`CommandTable`]. Classification never fails: anything the table does
//! not recognize yields no operations.

use crate::error::ExtractorError;
use crate::models::{ModuleRef, ToolchainYear};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Extractor settings (the `[extractor]` table of `.modstat.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Year assumed until the script selects a toolchain.
    #[serde(default = "default_toolchain_year")]
    pub default_toolchain_year: u16,

    /// Words that start a full module command (`module load ...`).
    #[serde(default = "default_command_prefixes")]
    pub command_prefixes: Vec<String>,

    /// Lmod shorthand commands (`ml A B`, `ml -A`).
    #[serde(default = "default_shorthand_prefixes")]
    pub shorthand_prefixes: Vec<String>,

    /// Subcommands that turn a shorthand line into a query
    /// (`ml list`, `ml spider X`); such lines change nothing.
    #[serde(default = "default_shorthand_ignore")]
    pub shorthand_ignore: Vec<String>,

    /// Verbs that add modules.
    #[serde(default = "default_load_verbs")]
    pub load_verbs: Vec<String>,

    /// Verbs that remove modules.
    #[serde(default = "default_unload_verbs")]
    pub unload_verbs: Vec<String>,

    /// Verbs that remove every loaded module.
    #[serde(default = "default_purge_verbs")]
    pub purge_verbs: Vec<String>,

    /// Verbs that replace one module with another.
    #[serde(default = "default_swap_verbs")]
    pub swap_verbs: Vec<String>,

    /// Patterns (with a named `year` group) for modules that select a
    /// toolchain instead of adding software. Matched against the whole
    /// module reference.
    #[serde(default = "default_toolchain_modules")]
    pub toolchain_modules: Vec<String>,

    /// Patterns (with a named `year` group) for non-module lines that
    /// switch toolchains, matched against a whole command.
    #[serde(default = "default_toolchain_directives")]
    pub toolchain_directives: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            default_toolchain_year: default_toolchain_year(),
            command_prefixes: default_command_prefixes(),
            shorthand_prefixes: default_shorthand_prefixes(),
            shorthand_ignore: default_shorthand_ignore(),
            load_verbs: default_load_verbs(),
            unload_verbs: default_unload_verbs(),
            purge_verbs: default_purge_verbs(),
            swap_verbs: default_swap_verbs(),
            toolchain_modules: default_toolchain_modules(),
            toolchain_directives: default_toolchain_directives(),
        }
    }
}

fn default_toolchain_year() -> u16 {
    ToolchainYear::DEFAULT.0
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_command_prefixes() -> Vec<String> {
    strings(&["module"])
}

fn default_shorthand_prefixes() -> Vec<String> {
    strings(&["ml"])
}

fn default_shorthand_ignore() -> Vec<String> {
    strings(&[
        "list", "av", "avail", "spider", "show", "display", "help", "save", "restore",
        "savelist", "describe", "whatis", "keyword", "key", "use", "unuse", "reset",
        "refresh", "update", "is-loaded", "is-avail", "table", "overview",
    ])
}

fn default_load_verbs() -> Vec<String> {
    strings(&["load", "add"])
}

fn default_unload_verbs() -> Vec<String> {
    strings(&["unload", "rm", "del"])
}

fn default_purge_verbs() -> Vec<String> {
    strings(&["purge"])
}

fn default_swap_verbs() -> Vec<String> {
    strings(&["swap", "switch"])
}

fn default_toolchain_modules() -> Vec<String> {
    strings(&[r"(?:foss|intel|iomkl|leuven|foss_env|intel_env)/(?P<year>\d{4})[a-z]?"])
}

fn default_toolchain_directives() -> Vec<String> {
    strings(&[
        // source switch_to_2015a
        r"^(?:source|\.)\s+\S*switch_to_(?P<year>\d{4})[a-z]?\b",
        // module use /apps/leuven/thinking/2016a/modules/all
        r"^module\s+use\s+\S*/(?P<year>\d{4})[a-z]?/modules\b",
    ])
}

/// One state change requested by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOp {
    Load(ModuleRef),
    Unload(ModuleRef),
    Swap { old: ModuleRef, new: ModuleRef },
    Purge,
    /// A non-module directive that switches the toolchain.
    UseToolchain(ToolchainYear),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Load,
    Unload,
    Purge,
    Swap,
}

/// Compiled form of [`ExtractorConfig`].
#[derive(Debug, Clone)]
pub struct CommandTable {
    prefixes: HashSet<String>,
    shorthand: HashSet<String>,
    shorthand_ignore: HashSet<String>,
    verbs: HashMap<String, Verb>,
    toolchain_modules: Vec<Regex>,
    toolchain_directives: Vec<Regex>,
}

impl CommandTable {
    pub fn new(config: &ExtractorConfig) -> Result<Self, ExtractorError> {
        let mut verbs = HashMap::new();
        let groups = [
            (&config.load_verbs, Verb::Load),
            (&config.unload_verbs, Verb::Unload),
            (&config.purge_verbs, Verb::Purge),
            (&config.swap_verbs, Verb::Swap),
        ];
        for (words, verb) in groups {
            for word in words {
                if verbs.insert(word.clone(), verb).is_some() {
                    return Err(ExtractorError::DuplicateVerb(word.clone()));
                }
            }
        }

        let toolchain_modules = config
            .toolchain_modules
            .iter()
            .map(|p| compile_year_pattern(p, &format!("^(?:{})$", p)))
            .collect::<Result<Vec<_>, _>>()?;
        let toolchain_directives = config
            .toolchain_directives
            .iter()
            .map(|p| compile_year_pattern(p, p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            prefixes: config.command_prefixes.iter().cloned().collect(),
            shorthand: config.shorthand_prefixes.iter().cloned().collect(),
            shorthand_ignore: config.shorthand_ignore.iter().cloned().collect(),
            verbs,
            toolchain_modules,
            toolchain_directives,
        })
    }

    /// Operations requested on one logical line, in textual order.
    pub fn classify(&self, line: &str) -> Vec<ModuleOp> {
        let mut ops = Vec::new();
        let line = strip_comment(line.trim());
        if line.is_empty() {
            return ops;
        }

        for segment in split_commands(line) {
            self.classify_command(segment.trim(), &mut ops);
        }

        ops
    }

    /// Toolchain year selected by a module, if it is a toolchain marker.
    pub fn toolchain_of(&self, module: &ModuleRef) -> Option<ToolchainYear> {
        self.toolchain_modules
            .iter()
            .find_map(|re| capture_year(re, module.as_str()))
    }

    fn classify_command(&self, command: &str, ops: &mut Vec<ModuleOp>) {
        let command = strip_keywords(command);
        if let Some(year) = self
            .toolchain_directives
            .iter()
            .find_map(|re| capture_year(re, command))
        {
            ops.push(ModuleOp::UseToolchain(year));
            return;
        }

        let mut words = command.split_whitespace();
        let Some(head) = words.next() else {
            return;
        };
        // Redirections and backgrounding end the argument list
        let words = words.take_while(|w| !w.contains(['>', '<', '|', '&']));

        if self.prefixes.contains(head) {
            let mut args = words.filter(|w| !w.starts_with('-'));
            let Some(verb) = args.next().and_then(|w| self.verbs.get(w)) else {
                return;
            };
            push_verb(*verb, args, ops);
        } else if self.shorthand.contains(head) {
            let args: Vec<&str> = words.collect();
            if args.first().is_some_and(|w| self.shorthand_ignore.contains(*w)) {
                return;
            }
            if let Some(verb) = args.first().and_then(|w| self.verbs.get(*w)) {
                push_verb(*verb, args[1..].iter().copied().filter(|w| !w.starts_with('-')), ops);
                return;
            }
            for arg in args {
                if arg.starts_with("--") {
                    continue;
                }
                match arg.strip_prefix('-') {
                    Some(name) => ops.extend(module_arg(name).map(ModuleOp::Unload)),
                    None => ops.extend(module_arg(arg).map(ModuleOp::Load)),
                }
            }
        }
    }
}

fn push_verb<'a>(verb: Verb, args: impl Iterator<Item = &'a str>, ops: &mut Vec<ModuleOp>) {
    match verb {
        Verb::Load => ops.extend(args.filter_map(module_arg).map(ModuleOp::Load)),
        Verb::Unload => ops.extend(args.filter_map(module_arg).map(ModuleOp::Unload)),
        Verb::Purge => ops.push(ModuleOp::Purge),
        Verb::Swap => {
            let mut refs = args.filter_map(module_arg);
            if let (Some(old), Some(new)) = (refs.next(), refs.next()) {
                ops.push(ModuleOp::Swap { old, new });
            }
        }
    }
}

/// A module argument, or `None` when it cannot be resolved statically.
fn module_arg(word: &str) -> Option<ModuleRef> {
    let word = word.trim_matches(|c| c == '"' || c == '\'');
    if word.is_empty() || word.contains(['$', '`']) {
        return None;
    }
    Some(ModuleRef::new(word))
}

fn compile_year_pattern(source: &str, pattern: &str) -> Result<Regex, ExtractorError> {
    let re = Regex::new(pattern).map_err(|e| ExtractorError::InvalidPattern {
        pattern: source.to_string(),
        source: e,
    })?;
    if !re.capture_names().any(|name| name == Some("year")) {
        return Err(ExtractorError::MissingYearGroup(source.to_string()));
    }
    Ok(re)
}

fn capture_year(re: &Regex, text: &str) -> Option<ToolchainYear> {
    let caps = re.captures(text)?;
    caps.name("year")?.as_str().parse().ok().map(ToolchainYear)
}

/// Drop a `#` comment: the whole line, or from a `#` preceded by whitespace.
fn strip_comment(line: &str) -> &str {
    let mut prev_blank = true;
    for (i, c) in line.char_indices() {
        if c == '#' && prev_blank {
            return line[..i].trim_end();
        }
        prev_blank = c.is_whitespace();
    }
    line
}

/// Split a shell line at `;`, `&&`, `||` and pipes.
fn split_commands(line: &str) -> impl Iterator<Item = &str> {
    line.split(';')
        .flat_map(|s| s.split("&&"))
        .flat_map(|s| s.split('|'))
}

/// Shell words that may precede a command inside `if`, `for` and `while`.
const SHELL_KEYWORDS: &[&str] = &["then", "do", "else", "{", "!"];

/// Drop leading shell keywords so `then module load A` reads as a command.
fn strip_keywords(mut command: &str) -> &str {
    loop {
        command = command.trim_start();
        match command.split_once(char::is_whitespace) {
            Some((word, rest)) if SHELL_KEYWORDS.contains(&word) => command = rest,
            _ => return command,
        }
    }
}
