//! ELIZA conversational engine: a rule-driven text transformer.
//!
//! This is the facade crate that wires together the lower-level components:
//! - [`draw_pool`]: non-repeating random choice
//! - [`eliza_subst`]: ordered whole-word substitution tables
//! - [`eliza_text`]: normalization, sentence splitting, typo injection
//! - [`eliza_rules`]: decomposition patterns and the keyword index
//! - [`eliza_script`]: script loading and validation
//!
//! # Quick Start
//!
//! ```
//! use eliza::{Eliza, parse_script};
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//!
//! let script = parse_script(
//!     "demo\nHello.\n;Final\nBye.\n;Pre\n;Post\nsad\tunhappy\n;Keywords\n\
//!      k:sad 3\nd:* i am *\nr:Why are you 1 ?\n;Other\nGo on.\n;Quit\nbye\n",
//! )
//! .unwrap();
//! let mut eliza = Eliza::new(&script, SmallRng::seed_from_u64(42)).unwrap();
//! eliza.set_typo_odds(None);
//!
//! assert_eq!(eliza.respond("I am sad"), "Why are you unhappy ?");
//! ```

use std::path::Path;

use draw_pool::DrawPool;
use eliza_text::{
    collapse_spaces, filter_chars, normalize, split_sentences, transpose_adjacent, word_matcher,
};
use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

// Re-export types that consumers (like the CLI) need.
pub use eliza_rules::{KeywordEntry, KeywordIndex, PatternRule, RuleError, Selection};
pub use eliza_script::{Decomposition, KeywordGroup, Script, ScriptError, load_script, parse_script};
pub use eliza_subst::{SubstitutionRule, SubstitutionTable};

/// Default odds of a typo: one keyword reply in this many.
pub const DEFAULT_TYPO_ODDS: u32 = 50;

/// Errors raised while building an engine.
#[derive(Debug, Error)]
pub enum ElizaError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("no {0}")]
    EmptyPool(&'static str),

    #[error("cannot compile phrase `{phrase}`: {source}")]
    Phrase {
        phrase: String,
        #[source]
        source: regex::Error,
    },
}

/// Whether the conversation is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Active,
    /// A quit phrase was recognized. Absorbing.
    Terminated,
}

/// The ELIZA engine.
///
/// Generic over the PRNG type `R` for testability. The rule tables are fixed
/// at construction; only the template pools' cursors and the conversation
/// state change between calls. Concurrent conversations each need their own
/// engine.
pub struct Eliza<R: Rng> {
    welcome: Vec<String>,
    farewell: Vec<String>,
    pre: SubstitutionTable,
    post: SubstitutionTable,
    keywords: KeywordIndex,
    fallback: DrawPool<String>,
    /// Lowercased quit phrases with their whole-word matchers.
    quit: Vec<(String, Regex)>,
    state: ConversationState,
    typo_odds: Option<u32>,
    rng: R,
}

impl<R: Rng> Eliza<R> {
    /// Compile a validated script into an engine.
    pub fn new(script: &Script, rng: R) -> Result<Self, ElizaError> {
        if script.welcome.is_empty() {
            return Err(ElizaError::EmptyPool("welcome messages"));
        }
        if script.farewell.is_empty() {
            return Err(ElizaError::EmptyPool("final messages"));
        }
        let fallback = DrawPool::new(script.fallback.clone())
            .map_err(|_| ElizaError::EmptyPool("fallback responses"))?;

        let pre = substitution_table(&script.pre_substitutions)?;
        let post = substitution_table(&script.post_substitutions)?;

        let mut entries = Vec::new();
        for group in &script.keywords {
            for keyword in &group.keywords {
                let mut entry = KeywordEntry::new(keyword, group.priority)?;
                for decomposition in &group.decompositions {
                    for pattern in &decomposition.patterns {
                        entry.add_decomposition(pattern, decomposition.templates.clone())?;
                    }
                }
                entries.push(entry);
            }
        }
        let keywords = KeywordIndex::new(entries);

        let quit = script
            .quit
            .iter()
            .map(|phrase| {
                let phrase = phrase.to_lowercase();
                word_matcher(&phrase, false)
                    .map(|re| (phrase.clone(), re))
                    .map_err(|source| ElizaError::Phrase { phrase, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            keywords = keywords.len(),
            pre = pre.len(),
            post = post.len(),
            quit = quit.len(),
            "engine ready"
        );

        Ok(Eliza {
            welcome: script.welcome.clone(),
            farewell: script.farewell.clone(),
            pre,
            post,
            keywords,
            fallback,
            quit,
            state: ConversationState::Active,
            typo_odds: Some(DEFAULT_TYPO_ODDS),
            rng,
        })
    }

    /// Load a script file and compile it.
    pub fn from_file(path: &Path, rng: R) -> Result<Self, ElizaError> {
        let script = load_script(path)?;
        Eliza::new(&script, rng)
    }

    /// Set the typo odds: `Some(n)` for a 1-in-n chance per keyword reply,
    /// `None` (or `Some(0)`) to disable.
    pub fn set_typo_odds(&mut self, odds: Option<u32>) {
        self.typo_odds = odds.filter(|&n| n > 0);
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// False once a quit phrase has been recognized.
    pub fn is_active(&self) -> bool {
        self.state == ConversationState::Active
    }

    /// The compiled keyword index (for inspection/testing).
    pub fn keywords(&self) -> &KeywordIndex {
        &self.keywords
    }

    /// A random welcome message. Independent of the conversation state.
    pub fn welcome(&mut self) -> String {
        self.welcome.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    /// Generate a reply to one line of input.
    ///
    /// After a quit phrase has been seen, every call returns a final message
    /// without looking at the input.
    pub fn respond(&mut self, input: &str) -> String {
        if self.state == ConversationState::Terminated {
            return self.farewell();
        }

        let text = self.pre.apply(&normalize(input)).to_lowercase();
        let text = collapse_spaces(&filter_chars(&text));
        let sentences = split_sentences(&text);

        if let Some(phrase) = self.quit_phrase(&sentences) {
            debug!(phrase, "quit phrase recognized");
            self.state = ConversationState::Terminated;
            return self.farewell();
        }

        let Some(selection) = self.keywords.select(&sentences, &mut self.rng) else {
            debug!(sentences = sentences.len(), "no keyword matched, using fallback");
            return self.fallback.draw(&mut self.rng).clone();
        };

        match self
            .keywords
            .respond(selection, &sentences, &self.post, &mut self.rng)
        {
            Some(reply) => self.maybe_typo(reply),
            None => self.fallback.draw(&mut self.rng).clone(),
        }
    }

    fn quit_phrase(&self, sentences: &[String]) -> Option<&str> {
        sentences.iter().find_map(|sentence| {
            self.quit
                .iter()
                .find(|(_, re)| re.is_match(sentence))
                .map(|(phrase, _)| phrase.as_str())
        })
    }

    fn farewell(&mut self) -> String {
        self.farewell.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    fn maybe_typo(&mut self, reply: String) -> String {
        match self.typo_odds {
            Some(odds) if self.rng.random_ratio(1, odds) => {
                let typo = transpose_adjacent(&reply, &mut self.rng);
                debug!(%reply, %typo, "typo injected");
                typo
            }
            _ => reply,
        }
    }
}

fn substitution_table(rules: &[SubstitutionRule]) -> Result<SubstitutionTable, ElizaError> {
    SubstitutionTable::new(rules.to_vec()).map_err(|source| ElizaError::Phrase {
        phrase: rules.iter().map(|r| r.find.as_str()).collect::<Vec<_>>().join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::collections::HashSet;

    const SCRIPT: &str = "\
unit test script
Hello.
Good day.
;Final
Goodbye.
Farewell.
;Pre
i'm\ti am
;Post
sad\tunhappy
my\tyour
;Keywords
k:sad 3
d:* i am *
r:Why are you 1 ?
k:dream 5
d:*
r:Do you dream often ?
k:hello 9
d:*
r:Hi there.
;Other
Please go on.
Tell me more.
I see.
;Quit
bye
good bye
";

    fn eliza(seed: u64) -> Eliza<SmallRng> {
        let script = parse_script(SCRIPT).unwrap();
        let mut eliza = Eliza::new(&script, SmallRng::seed_from_u64(seed)).unwrap();
        eliza.set_typo_odds(None);
        eliza
    }

    // --- construction ---

    #[test]
    fn one_entry_per_keyword() {
        let e = eliza(1);
        assert_eq!(e.keywords().len(), 3);
        assert!(e.is_active());
        assert_eq!(e.state(), ConversationState::Active);
    }

    #[test]
    fn empty_fallback_rejected() {
        let mut script = parse_script(SCRIPT).unwrap();
        script.fallback.clear();
        assert!(matches!(
            Eliza::new(&script, SmallRng::seed_from_u64(1)),
            Err(ElizaError::EmptyPool("fallback responses"))
        ));
    }

    #[test]
    fn bad_priority_rejected() {
        let mut script = parse_script(SCRIPT).unwrap();
        script.keywords[0].priority = 12;
        assert!(matches!(
            Eliza::new(&script, SmallRng::seed_from_u64(1)),
            Err(ElizaError::Rule(RuleError::PriorityOutOfRange { .. }))
        ));
    }

    // --- respond ---

    #[test]
    fn capture_post_substituted_into_template() {
        assert_eq!(eliza(1).respond("I am sad"), "Why are you unhappy ?");
    }

    #[test]
    fn pre_substitution_runs_before_matching() {
        assert_eq!(eliza(1).respond("I'm sad!"), "Why are you unhappy ?");
    }

    #[test]
    fn most_urgent_keyword_across_sentences() {
        assert_eq!(eliza(1).respond("Hello. I am sad."), "Why are you unhappy ?");
    }

    #[test]
    fn fallback_when_no_keyword() {
        let mut e = eliza(2);
        let replies: HashSet<String> = (0..3).map(|_| e.respond("the weather is nice")).collect();
        let expected: HashSet<String> = ["Please go on.", "Tell me more.", "I see."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(replies, expected);
    }

    #[test]
    fn keyword_inside_word_is_ignored() {
        let mut e = eliza(3);
        let reply = e.respond("what a dreamy evening");
        assert_ne!(reply, "Do you dream often ?");
    }

    #[test]
    fn empty_input_uses_fallback() {
        let mut e = eliza(4);
        let reply = e.respond("   ");
        assert!(["Please go on.", "Tell me more.", "I see."].contains(&reply.as_str()));
    }

    // --- quit handling ---

    #[test]
    fn quit_phrase_terminates_conversation() {
        let mut e = eliza(5);
        let reply = e.respond("ok, bye then");
        assert!(["Goodbye.", "Farewell."].contains(&reply.as_str()));
        assert!(!e.is_active());
        assert_eq!(e.state(), ConversationState::Terminated);

        // Absorbing: keywords are no longer evaluated.
        for _ in 0..5 {
            let reply = e.respond("I am sad");
            assert!(["Goodbye.", "Farewell."].contains(&reply.as_str()));
            assert!(!e.is_active());
        }
    }

    #[test]
    fn multi_word_quit_phrase() {
        let mut e = eliza(6);
        e.respond("Good bye!");
        assert!(!e.is_active());
    }

    #[test]
    fn quit_phrase_inside_word_ignored() {
        let mut e = eliza(7);
        e.respond("byebye and goodbye");
        assert!(e.is_active());
    }

    #[test]
    fn quit_checked_in_every_sentence() {
        let mut e = eliza(8);
        e.respond("I am sad. Bye.");
        assert!(!e.is_active());
    }

    #[test]
    fn welcome_independent_of_state() {
        let mut e = eliza(9);
        assert!(["Hello.", "Good day."].contains(&e.welcome().as_str()));
        e.respond("bye");
        assert!(["Hello.", "Good day."].contains(&e.welcome().as_str()));
    }

    // --- typos ---

    #[test]
    fn forced_typo_swaps_one_adjacent_pair() {
        let clean = "Do you dream often ?";
        for seed in 0..20 {
            let mut e = eliza(seed);
            e.set_typo_odds(Some(1));
            let reply = e.respond("I had a dream");
            assert_ne!(reply, clean);
            let diff: Vec<usize> = clean
                .chars()
                .zip(reply.chars())
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(diff.len(), 2, "{reply}");
            assert_eq!(diff[1], diff[0] + 1);
        }
    }

    #[test]
    fn typos_never_touch_fallback() {
        let mut e = eliza(10);
        e.set_typo_odds(Some(1));
        for _ in 0..6 {
            let reply = e.respond("nothing to see");
            assert!(["Please go on.", "Tell me more.", "I see."].contains(&reply.as_str()));
        }
    }

    #[test]
    fn zero_odds_disable_typos() {
        let mut e = eliza(11);
        e.set_typo_odds(Some(0));
        for _ in 0..50 {
            assert_eq!(e.respond("I had a dream"), "Do you dream often ?");
        }
    }

    #[test]
    fn same_seed_same_conversation() {
        let run = || {
            let mut e = eliza(123);
            e.set_typo_odds(Some(DEFAULT_TYPO_ODDS));
            let inputs = ["hello", "i am sad", "weather", "dreams", "i dream", "nothing"];
            inputs.iter().map(|i| e.respond(i)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn from_file_loads_script() {
        let path = std::env::temp_dir().join("eliza_facade_from_file.txt");
        std::fs::write(&path, SCRIPT).unwrap();
        let mut e = Eliza::from_file(&path, SmallRng::seed_from_u64(1)).unwrap();
        e.set_typo_odds(None);
        assert_eq!(e.respond("i am sad"), "Why are you unhappy ?");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = Eliza::from_file(
            Path::new("/nonexistent/eliza.txt"),
            SmallRng::seed_from_u64(1),
        );
        assert!(matches!(result, Err(ElizaError::Script(ScriptError::Io(_)))));
    }
}
