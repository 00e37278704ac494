//! ELIZA keyword rules: decomposition patterns, keyword entries and the
//! priority-sorted keyword index.
//!
//! A reply is produced in three steps:
//!
//! 1. **Select**: [`KeywordIndex::select`] scans every input sentence for the
//!    most urgent keyword whose trigger word appears in the sentence and whose
//!    decomposition patterns accept the whole sentence.
//! 2. **Decompose**: the first matching [`PatternRule`] of that keyword splits
//!    the sentence into wildcard fragments.
//! 3. **Reassemble**: one of the rule's templates is drawn without repeats, and
//!    its placeholders are filled with the keyword and the fragments (after the
//!    post-substitution pass).
//!
//! # Pattern syntax
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `$`   | the keyword itself |
//! | `*`   | any text, captured (may be empty, together with one adjacent space) |
//! | space | one whitespace character |
//! | other | literal text, case-insensitive |
//!
//! Patterns are anchored: they must account for the entire sentence.
//!
//! # Template syntax
//!
//! `$` is replaced by the keyword, `1` and `2` by the first and second captured
//! fragments. Only two fragments are addressable.

use std::collections::BTreeMap;

use draw_pool::DrawPool;
use eliza_subst::SubstitutionTable;
use eliza_text::{collapse_spaces, word_matcher};
use rand::Rng;
use rand::seq::IndexedRandom;
use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::debug;

/// Most urgent keyword priority.
pub const PRIORITY_MIN: u8 = 1;
/// Least urgent keyword priority.
pub const PRIORITY_MAX: u8 = 10;
/// Running-best value before any keyword has matched.
const NO_MATCH_PRIORITY: u8 = PRIORITY_MAX + 1;

/// Stands for the keyword in patterns and templates.
pub const KEYWORD_TOKEN: char = '$';
/// Matches any text in patterns.
pub const WILDCARD_TOKEN: char = '*';
/// Template placeholders for the first and second captured fragments.
pub const FRAGMENT_SLOTS: [&str; 2] = ["1", "2"];

/// Errors raised while building rules. All of them are load-time errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("decomposition `{pattern}` has no reassembly templates")]
    NoTemplates { pattern: String },

    #[error("keyword `{keyword}` has priority {priority}, expected 1..=10")]
    PriorityOutOfRange { keyword: String, priority: u8 },

    #[error("keyword is empty")]
    EmptyKeyword,

    #[error("cannot compile `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ---------------------------------------------------------------------------
// PatternRule
// ---------------------------------------------------------------------------

/// A parsed decomposition pattern token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Keyword,
    Wildcard,
    Space,
}

/// Split a pattern into tokens. Leading/trailing spaces are dropped and inner
/// runs of spaces count as one.
fn tokenize_pattern(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal = String::new();

    for c in pattern.trim().chars() {
        let token = match c {
            KEYWORD_TOKEN => Token::Keyword,
            WILDCARD_TOKEN => Token::Wildcard,
            c if c.is_whitespace() => Token::Space,
            c => {
                literal.extend(c.to_lowercase());
                continue;
            }
        };
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        if token == Token::Space && tokens.last() == Some(&Token::Space) {
            continue;
        }
        tokens.push(token);
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    tokens
}

/// Lower a token list into an anchored regular expression.
///
/// A wildcard swallows one neighbouring space (the one before it, or the one
/// after it when it opens the pattern) into an optional group, so `* i am *`
/// accepts `i am` with both wildcards absent.
fn lower_to_regex(tokens: &[Token], keyword: &str) -> String {
    let mut re = String::from("^");
    let mut i = 0;
    while i < tokens.len() {
        let next = tokens.get(i + 1);
        match &tokens[i] {
            Token::Literal(text) => re.push_str(&regex::escape(text)),
            Token::Keyword => re.push_str(&regex::escape(keyword)),
            Token::Space if next == Some(&Token::Wildcard) => {
                re.push_str(r"(?:\s(.*))?");
                i += 1;
            }
            Token::Space => re.push_str(r"\s"),
            Token::Wildcard if next == Some(&Token::Space) => {
                re.push_str(r"(?:(.*)\s)?");
                i += 1;
            }
            Token::Wildcard => re.push_str("(.*)"),
        }
        i += 1;
    }
    re.push('$');
    re
}

/// A decomposition pattern bound to one keyword, with its reassembly templates.
///
/// Slots are numbered over the wildcards that captured text, not over every
/// wildcard in the pattern. With `* i am *`, slot `1` is the text after
/// `i am` for `i am sad`, but the text before it for `today i am sad`. A
/// script that needs the trailing text in both cases declares `i am *` first
/// and `* i am *` (with slot `2`) after it.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: String,
    matcher: Regex,
    templates: DrawPool<String>,
}

impl PatternRule {
    /// Compile `pattern` for `keyword`. Fails if `templates` is empty.
    pub fn new(pattern: &str, keyword: &str, templates: Vec<String>) -> Result<Self, RuleError> {
        let templates = DrawPool::new(templates).map_err(|_| RuleError::NoTemplates {
            pattern: pattern.to_string(),
        })?;
        let expr = lower_to_regex(&tokenize_pattern(pattern), &keyword.to_lowercase());
        let matcher = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(PatternRule {
            pattern: pattern.to_string(),
            matcher,
            templates,
        })
    }

    /// The pattern as written in the script.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }

    /// True if the pattern accepts the entire sentence.
    pub fn matches(&self, sentence: &str) -> bool {
        self.matcher.is_match(sentence)
    }

    /// The wildcard captures that matched non-empty text, in pattern order.
    ///
    /// `None` if the pattern does not match.
    pub fn fragments<'s>(&self, sentence: &'s str) -> Option<Vec<&'s str>> {
        let caps = self.matcher.captures(sentence)?;
        Some(
            caps.iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Build a reply from the next template.
    ///
    /// Each fragment is run through `post` before being spliced in. A slot
    /// with no fragment to fill it becomes empty, as long as the pattern has
    /// that many wildcards. Returns `None` (and draws nothing) if the pattern
    /// does not match.
    pub fn reassemble<R: Rng + ?Sized>(
        &mut self,
        sentence: &str,
        keyword: &str,
        post: &SubstitutionTable,
        rng: &mut R,
    ) -> Option<String> {
        let fragments = self.fragments(sentence)?;
        let mut reply = self
            .templates
            .draw(rng)
            .replace(KEYWORD_TOKEN, keyword);

        for (i, slot) in FRAGMENT_SLOTS.iter().enumerate().take(self.wildcards()) {
            if !reply.contains(slot) {
                continue;
            }
            let text = fragments.get(i).map(|f| post.apply(f)).unwrap_or_default();
            reply = reply.replace(slot, &text);
        }
        Some(collapse_spaces(reply.trim()))
    }

    /// Number of `*` wildcards in the pattern.
    fn wildcards(&self) -> usize {
        self.matcher.captures_len() - 1
    }
}

// ---------------------------------------------------------------------------
// KeywordEntry
// ---------------------------------------------------------------------------

/// A trigger word, its priority and its decomposition rules.
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    keyword: String,
    priority: u8,
    trigger: Regex,
    rules: Vec<PatternRule>,
}

impl KeywordEntry {
    /// Create an entry with no decompositions. The keyword is lowercased.
    pub fn new(keyword: &str, priority: u8) -> Result<Self, RuleError> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(RuleError::EmptyKeyword);
        }
        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&priority) {
            return Err(RuleError::PriorityOutOfRange { keyword, priority });
        }
        let trigger = word_matcher(&keyword, false).map_err(|source| RuleError::InvalidPattern {
            pattern: keyword.clone(),
            source,
        })?;
        Ok(KeywordEntry {
            keyword,
            priority,
            trigger,
            rules: Vec::new(),
        })
    }

    /// Append a decomposition pattern with its own template pool.
    pub fn add_decomposition(
        &mut self,
        pattern: &str,
        templates: Vec<String>,
    ) -> Result<(), RuleError> {
        let rule = PatternRule::new(pattern, &self.keyword, templates)?;
        self.rules.push(rule);
        Ok(())
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// True if the keyword appears as a whole word in `sentence` and at least
    /// one decomposition accepts it.
    pub fn matches(&self, sentence: &str) -> bool {
        self.trigger.is_match(sentence) && self.rules.iter().any(|r| r.matches(sentence))
    }

    /// Reassemble a reply with the first decomposition that accepts `sentence`.
    pub fn respond<R: Rng + ?Sized>(
        &mut self,
        sentence: &str,
        post: &SubstitutionTable,
        rng: &mut R,
    ) -> Option<String> {
        let keyword = &self.keyword;
        let rule = self.rules.iter_mut().find(|r| r.matches(sentence))?;
        rule.reassemble(sentence, keyword, post, rng)
    }
}

// ---------------------------------------------------------------------------
// KeywordIndex
// ---------------------------------------------------------------------------

/// The keyword chosen for a reply, as indices into the index and the sentence
/// list passed to [`KeywordIndex::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub entry: usize,
    pub sentence: usize,
}

/// Keyword entries sorted by ascending priority value (most urgent first).
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    entries: Vec<KeywordEntry>,
}

impl KeywordIndex {
    /// Build the index. Entries are sorted once here; equal priorities keep
    /// their input order.
    pub fn new(mut entries: Vec<KeywordEntry>) -> Self {
        entries.sort_by_key(KeywordEntry::priority);
        KeywordIndex { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeywordEntry> {
        self.entries.iter()
    }

    pub fn entry(&self, index: usize) -> Option<&KeywordEntry> {
        self.entries.get(index)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut KeywordEntry> {
        self.entries.get_mut(index)
    }

    /// Find the most urgent keyword matching any of `sentences`.
    ///
    /// Each sentence is scanned in priority order, stopping as soon as entries
    /// become less urgent than the best match so far (across all sentences).
    /// Ties at the best priority are broken uniformly at random. When one entry
    /// matches several sentences, the last of them is used.
    pub fn select<S, R>(&self, sentences: &[S], rng: &mut R) -> Option<Selection>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let mut best = NO_MATCH_PRIORITY;
        // entry index -> sentence index
        let mut matched: BTreeMap<usize, usize> = BTreeMap::new();

        for (s, sentence) in sentences.iter().enumerate() {
            for (e, entry) in self.entries.iter().enumerate() {
                if entry.priority > best {
                    break;
                }
                if entry.matches(sentence.as_ref()) {
                    matched.insert(e, s);
                    best = entry.priority;
                }
            }
        }

        let candidates: Vec<Selection> = matched
            .into_iter()
            .filter(|&(e, _)| self.entries[e].priority == best)
            .map(|(entry, sentence)| Selection { entry, sentence })
            .collect();
        let chosen = *candidates.choose(rng)?;

        debug!(
            keyword = self.entries[chosen.entry].keyword(),
            priority = best,
            tied = candidates.len(),
            sentence = chosen.sentence,
            "keyword selected"
        );
        Some(chosen)
    }

    /// Reassemble a reply for a selection made by [`select`](Self::select).
    pub fn respond<S, R>(
        &mut self,
        selection: Selection,
        sentences: &[S],
        post: &SubstitutionTable,
        rng: &mut R,
    ) -> Option<String>
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let sentence = sentences.get(selection.sentence)?.as_ref();
        self.entries
            .get_mut(selection.entry)?
            .respond(sentence, post, rng)
    }
}
