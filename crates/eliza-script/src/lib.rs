//! ELIZA rule scripts: the textual script format, JSON snapshots, and
//! load-time validation.
//!
//! A textual script is read line by line. The first line is a free-form
//! header. Sections follow in a fixed order, each ended by a marker line:
//!
//! ```text
//! <header>
//! welcome messages...
//! ;Final
//! final messages...
//! ;Pre
//! find<TAB>replace          (pre-substitutions)
//! ;Post
//! find<TAB>replace          (post-substitutions)
//! ;Keywords
//! k:word [word...] priority
//! d:pattern[/pattern...]
//! r:template
//! ;Other
//! fallback responses...
//! ;Quit
//! quit phrases...
//! ```
//!
//! Blank lines are skipped everywhere. A `_` replacement deletes the phrase.
//! Every error carries the offending line number.

use std::fs;
use std::path::Path;

use eliza_subst::SubstitutionRule;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Priority range accepted on `k:` lines.
const PRIORITY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Errors raised while loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A specific line violates the script syntax.
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// The script as a whole is incomplete (missing section, empty pool).
    #[error("invalid script: {0}")]
    Invalid(String),

    #[error("cannot read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot decode script snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

fn malformed(line: usize, reason: impl Into<String>) -> ScriptError {
    ScriptError::Malformed {
        line,
        reason: reason.into(),
    }
}

/// One or more decomposition patterns sharing a set of reassembly templates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Decomposition {
    pub patterns: Vec<String>,
    pub templates: Vec<String>,
}

/// Keywords declared on one `k:` line, sharing priority and decompositions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub keywords: Vec<String>,
    pub priority: u8,
    pub decompositions: Vec<Decomposition>,
}

/// A loaded rule script, not yet compiled into matchers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Script {
    pub welcome: Vec<String>,
    pub farewell: Vec<String>,
    pub pre_substitutions: Vec<SubstitutionRule>,
    pub post_substitutions: Vec<SubstitutionRule>,
    pub keywords: Vec<KeywordGroup>,
    pub fallback: Vec<String>,
    pub quit: Vec<String>,
}

impl Script {
    /// Decode a JSON snapshot and validate it.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Script = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    /// Encode as a pretty-printed JSON snapshot.
    pub fn to_json(&self) -> Result<String, ScriptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the structural invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ScriptError> {
        let pools = [
            ("welcome messages", &self.welcome),
            ("final messages", &self.farewell),
            ("fallback responses", &self.fallback),
        ];
        for (name, pool) in pools {
            if pool.is_empty() {
                return Err(ScriptError::Invalid(format!("no {name}")));
            }
        }

        for group in &self.keywords {
            let first = group.keywords.first().map(String::as_str).unwrap_or("");
            if group.keywords.is_empty() {
                return Err(ScriptError::Invalid("keyword group without keywords".into()));
            }
            if !PRIORITY_RANGE.contains(&group.priority) {
                return Err(ScriptError::Invalid(format!(
                    "keyword `{first}` has priority {}, expected 1..=10",
                    group.priority
                )));
            }
            for decomposition in &group.decompositions {
                if decomposition.patterns.is_empty() {
                    return Err(ScriptError::Invalid(format!(
                        "keyword `{first}` has a decomposition without patterns"
                    )));
                }
                if decomposition.templates.is_empty() {
                    return Err(ScriptError::Invalid(format!(
                        "decomposition `{}` of keyword `{first}` has no reassembly templates",
                        decomposition.patterns.join("/")
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Load a script file. Files with a `.json` extension are read as snapshots,
/// anything else as a textual script.
pub fn load_script(path: &Path) -> Result<Script, ScriptError> {
    let content = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Script::from_json(&content)
    } else {
        parse_script(&content)
    }
}

/// Script sections, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Welcome,
    Final,
    Pre,
    Post,
    Keywords,
    Other,
    Quit,
}

impl Section {
    fn from_marker(line: &str) -> Option<Section> {
        match line {
            ";Final" => Some(Section::Final),
            ";Pre" => Some(Section::Pre),
            ";Post" => Some(Section::Post),
            ";Keywords" => Some(Section::Keywords),
            ";Other" => Some(Section::Other),
            ";Quit" => Some(Section::Quit),
            _ => None,
        }
    }

    fn next(self) -> Option<Section> {
        match self {
            Section::Header => Some(Section::Welcome),
            Section::Welcome => Some(Section::Final),
            Section::Final => Some(Section::Pre),
            Section::Pre => Some(Section::Post),
            Section::Post => Some(Section::Keywords),
            Section::Keywords => Some(Section::Other),
            Section::Other => Some(Section::Quit),
            Section::Quit => None,
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Section::Header | Section::Welcome => "",
            Section::Final => ";Final",
            Section::Pre => ";Pre",
            Section::Post => ";Post",
            Section::Keywords => ";Keywords",
            Section::Other => ";Other",
            Section::Quit => ";Quit",
        }
    }
}

/// Accumulates the keyword section.
#[derive(Default)]
struct KeywordBuilder {
    groups: Vec<KeywordGroup>,
    group: Option<KeywordGroup>,
    /// Open decomposition and the line it started on.
    decomposition: Option<(usize, Decomposition)>,
}

impl KeywordBuilder {
    fn line(&mut self, number: usize, line: &str) -> Result<(), ScriptError> {
        if let Some(rest) = line.strip_prefix("k:") {
            self.finish_group()?;
            self.group = Some(parse_keyword_line(number, rest)?);
        } else if let Some(rest) = line.strip_prefix("d:") {
            if self.group.is_none() {
                return Err(malformed(number, "decomposition outside a keyword group"));
            }
            self.finish_decomposition()?;
            let patterns: Vec<String> = rest
                .split('/')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if patterns.is_empty() {
                return Err(malformed(number, "decomposition without patterns"));
            }
            self.decomposition = Some((
                number,
                Decomposition {
                    patterns,
                    templates: Vec::new(),
                },
            ));
        } else if let Some(rest) = line.strip_prefix("r:") {
            let Some((_, decomposition)) = self.decomposition.as_mut() else {
                return Err(malformed(number, "reassembly before any decomposition"));
            };
            let template = rest.trim();
            if template.is_empty() {
                return Err(malformed(number, "empty reassembly template"));
            }
            decomposition.templates.push(template.to_string());
        } else {
            warn!(line = number, text = line, "ignoring unrecognised line in keyword section");
        }
        Ok(())
    }

    fn finish_decomposition(&mut self) -> Result<(), ScriptError> {
        let Some((number, decomposition)) = self.decomposition.take() else {
            return Ok(());
        };
        if decomposition.templates.is_empty() {
            return Err(malformed(number, "decomposition has no reassembly templates"));
        }
        if let Some(group) = self.group.as_mut() {
            group.decompositions.push(decomposition);
        }
        Ok(())
    }

    fn finish_group(&mut self) -> Result<(), ScriptError> {
        self.finish_decomposition()?;
        if let Some(group) = self.group.take() {
            if group.decompositions.is_empty() {
                warn!(
                    keywords = ?group.keywords,
                    "keyword group has no decompositions and can never match"
                );
            }
            self.groups.push(group);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<KeywordGroup>, ScriptError> {
        self.finish_group()?;
        Ok(self.groups)
    }
}

fn parse_keyword_line(number: usize, rest: &str) -> Result<KeywordGroup, ScriptError> {
    let mut words: Vec<&str> = rest.split_whitespace().collect();
    let Some(priority_text) = words.pop() else {
        return Err(malformed(number, "keyword line without keywords"));
    };
    if words.is_empty() {
        return Err(malformed(number, "keyword line needs at least one keyword and a priority"));
    }
    let priority: u8 = priority_text.parse().map_err(|_| {
        malformed(
            number,
            format!("priority `{priority_text}` of keyword `{}` is not a number", words[0]),
        )
    })?;
    if !PRIORITY_RANGE.contains(&priority) {
        return Err(malformed(
            number,
            format!("priority {priority} of keyword `{}` is outside 1..=10", words[0]),
        ));
    }
    Ok(KeywordGroup {
        keywords: words.into_iter().map(str::to_string).collect(),
        priority,
        decompositions: Vec::new(),
    })
}

fn parse_substitution(number: usize, line: &str) -> Result<SubstitutionRule, ScriptError> {
    let fields: Vec<&str> = line.split('\t').collect();
    match fields.as_slice() {
        [find, replace] if !find.trim().is_empty() && !replace.trim().is_empty() => {
            Ok(SubstitutionRule::new(find.trim(), replace.trim()))
        }
        _ => Err(malformed(
            number,
            format!("expected `find<TAB>replace`, got {line:?}"),
        )),
    }
}

/// Parse a textual script and validate it.
pub fn parse_script(text: &str) -> Result<Script, ScriptError> {
    let mut script = Script::default();
    let mut keywords = KeywordBuilder::default();
    let mut section = Section::Header;

    for (index, raw) in text.lines().enumerate() {
        let number = index + 1;
        let line = raw.trim_end_matches('\r');

        if section == Section::Header {
            section = Section::Welcome;
            continue;
        }

        if let Some(marker) = Section::from_marker(line) {
            if Some(marker) != section.next() {
                return Err(malformed(number, format!("unexpected section marker `{line}`")));
            }
            if section == Section::Keywords {
                script.keywords = std::mem::take(&mut keywords).finish()?;
            }
            section = marker;
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        match section {
            Section::Header => {}
            Section::Welcome => script.welcome.push(line.to_string()),
            Section::Final => script.farewell.push(line.to_string()),
            Section::Pre => script.pre_substitutions.push(parse_substitution(number, line)?),
            Section::Post => script.post_substitutions.push(parse_substitution(number, line)?),
            Section::Keywords => keywords.line(number, line)?,
            Section::Other => script.fallback.push(line.to_string()),
            Section::Quit => script.quit.push(line.trim().to_string()),
        }
    }

    if section != Section::Quit {
        let missing = section.next().map(Section::marker).unwrap_or("");
        return Err(ScriptError::Invalid(format!("missing section marker `{missing}`")));
    }

    script.validate()?;
    debug!(
        welcome = script.welcome.len(),
        farewell = script.farewell.len(),
        pre = script.pre_substitutions.len(),
        post = script.post_substitutions.len(),
        keyword_groups = script.keywords.len(),
        fallback = script.fallback.len(),
        quit = script.quit.len(),
        "script parsed"
    );
    Ok(script)
}
