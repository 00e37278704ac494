//! Ordered phrase substitution with whole-word matching.
//!
//! ELIZA runs two independent substitution passes: a pre-substitution over the
//! whole normalized input (e.g. `i'm` -> `i am`) and a post-substitution over
//! captured fragments before they are spliced into a reply (e.g. `my` ->
//! `your`). Both use [`SubstitutionTable::apply`].
//!
//! Rules are applied in declaration order, and a rule sees the output of every
//! earlier rule. Text inserted by a rule is sealed, though: no later rule in the
//! same pass can match inside it. With the rules `i'm -> i am` and
//! `am -> happen to be`, the input `i'm here` becomes `i am here`, not
//! `i happen to be here`.

use eliza_text::{collapse_spaces, word_matcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Replacement value meaning "delete the matched phrase".
pub const DELETE_SENTINEL: &str = "_";

/// A single `find -> replace` rule as declared in a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionRule {
    pub find: String,
    pub replace: String,
}

impl SubstitutionRule {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        SubstitutionRule {
            find: find.into(),
            replace: replace.into(),
        }
    }

    /// True if this rule deletes its phrase instead of replacing it.
    pub fn is_deletion(&self) -> bool {
        self.replace == DELETE_SENTINEL
    }
}

/// A rule with its matcher compiled once.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: SubstitutionRule,
    find_lower: String,
    matcher: Regex,
    /// `None` for deletions.
    replacement: Option<String>,
}

/// A run of text during a substitution pass.
///
/// `Sealed` pieces were produced by a rule and are invisible to later rules.
#[derive(Debug)]
enum Piece {
    Open(String),
    Sealed(String),
}

impl Piece {
    fn as_str(&self) -> &str {
        match self {
            Piece::Open(s) | Piece::Sealed(s) => s,
        }
    }
}

/// An ordered list of substitution rules.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionTable {
    rules: Vec<CompiledRule>,
}

impl SubstitutionTable {
    /// Compile `rules` into a table, preserving their order.
    pub fn new(rules: Vec<SubstitutionRule>) -> Result<Self, regex::Error> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let find_lower = rule.find.to_lowercase();
                let matcher = word_matcher(&find_lower, true)?;
                let replacement = (!rule.is_deletion()).then(|| rule.replace.clone());
                Ok(CompiledRule {
                    rule,
                    find_lower,
                    matcher,
                    replacement,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(SubstitutionTable { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules in application order.
    pub fn rules(&self) -> impl Iterator<Item = &SubstitutionRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Apply every rule in order to `text`.
    ///
    /// Matching is case-insensitive and whole-word. Runs of spaces left behind
    /// by deletions are collapsed to a single space.
    pub fn apply(&self, text: &str) -> String {
        let mut pieces = vec![Piece::Open(text.to_string())];

        for rule in &self.rules {
            let present = pieces.iter().any(|p| match p {
                Piece::Open(s) => s.to_lowercase().contains(&rule.find_lower),
                Piece::Sealed(_) => false,
            });
            if !present {
                continue;
            }
            pieces = rule.substitute(pieces);
        }

        let joined: String = pieces.iter().map(Piece::as_str).collect();
        collapse_spaces(&joined)
    }
}

impl CompiledRule {
    fn substitute(&self, pieces: Vec<Piece>) -> Vec<Piece> {
        let mut out = Vec::with_capacity(pieces.len() + 2);
        for piece in pieces {
            let text = match piece {
                Piece::Open(text) => text,
                sealed => {
                    out.push(sealed);
                    continue;
                }
            };

            let mut last = 0;
            for m in self.matcher.find_iter(&text) {
                push_open(&mut out, &text[last..m.start()]);
                if let Some(replacement) = &self.replacement {
                    out.push(Piece::Sealed(replacement.clone()));
                }
                last = m.end();
            }
            push_open(&mut out, &text[last..]);
        }
        out
    }
}

/// Append open text, merging with a preceding open piece so that deletions
/// leave one contiguous matchable run.
fn push_open(out: &mut Vec<Piece>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Piece::Open(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Piece::Open(text.to_string()));
    }
}
