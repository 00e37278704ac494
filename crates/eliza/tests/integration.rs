//! Integration tests for ELIZA: full conversation flow with the bundled script.
//!
//! These tests load `data/script.txt` and drive the engine through keyword
//! selection, both substitution passes, fallback responses and termination.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use eliza::{Eliza, Script, load_script};
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Path to the data directory (bundled in the repo).
fn data_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR = crates/eliza
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data")
}

fn script() -> Script {
    load_script(&data_dir().join("script.txt")).expect("failed to load script.txt")
}

/// An engine over the bundled script with typos disabled.
fn eliza(seed: u64) -> Eliza<SmallRng> {
    let mut eliza = Eliza::new(&script(), SmallRng::seed_from_u64(seed)).unwrap();
    eliza.set_typo_odds(None);
    eliza
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const FALLBACK: &[&str] = &[
    "Please go on.",
    "I am not sure I understand you fully.",
    "What does that suggest to you?",
    "Do you feel strongly about discussing such things?",
];

const FAREWELL: &[&str] = &[
    "Goodbye. It was nice talking to you.",
    "Goodbye. Take care of yourself.",
];

// ---------------------------------------------------------------------------
// Script loading
// ---------------------------------------------------------------------------

#[test]
fn bundled_script_loads() {
    let script = script();
    assert_eq!(script.welcome.len(), 3);
    assert_eq!(script.farewell.len(), 2);
    assert_eq!(script.fallback.len(), 4);
    assert_eq!(script.quit, vec!["bye", "goodbye", "quit"]);
    assert!(script.pre_substitutions.iter().any(|r| r.is_deletion()));
}

#[test]
fn one_entry_per_keyword_word() {
    let e = eliza(1);
    let words: usize = script().keywords.iter().map(|g| g.keywords.len()).sum();
    assert_eq!(e.keywords().len(), words);

    let priorities: Vec<u8> = e.keywords().iter().map(|k| k.priority()).collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);
}

#[test]
fn json_snapshot_behaves_like_text_script() {
    let json = script().to_json().unwrap();
    let restored = Script::from_json(&json).unwrap();
    assert_eq!(restored, script());

    let mut a = eliza(9);
    let mut b = Eliza::new(&restored, SmallRng::seed_from_u64(9)).unwrap();
    b.set_typo_odds(None);
    for input in ["hello", "i am sad", "my mother", "nothing at all"] {
        assert_eq!(a.respond(input), b.respond(input));
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[test]
fn welcome_comes_from_script() {
    let mut e = eliza(2);
    let welcome = set(&[
        "How do you do. Please tell me your problem.",
        "Hello. What would you like to talk about today?",
        "Hi. I am Eliza. How are you feeling?",
    ]);
    for _ in 0..10 {
        assert!(welcome.contains(&e.welcome()));
    }
}

#[test]
fn sad_capture_is_post_substituted() {
    assert_eq!(eliza(3).respond("I am sad"), "Why are you unhappy ?");
}

#[test]
fn contraction_expanded_before_matching() {
    assert_eq!(eliza(4).respond("I'm sad."), "Why are you unhappy ?");
}

#[test]
fn keyword_spliced_into_template() {
    let mut e = eliza(5);
    let replies: HashSet<String> = (0..2).map(|_| e.respond("depressed, honestly")).collect();
    assert_eq!(
        replies,
        set(&[
            "I am sorry to hear that you are depressed.",
            "Can you explain what made you depressed ?",
        ])
    );
}

#[test]
fn family_keyword() {
    let mut e = eliza(6);
    let replies: HashSet<String> = (0..3).map(|_| e.respond("My mother hates me")).collect();
    assert_eq!(
        replies,
        set(&[
            "Tell me more about your family.",
            "Does anyone else in your family worry you?",
            "Your mother ?",
        ])
    );
}

#[test]
fn filler_deleted_and_fragment_swapped() {
    let mut e = eliza(7);
    let replies: HashSet<String> = (0..3).map(|_| e.respond("Well, I remember my dog")).collect();
    assert_eq!(
        replies,
        set(&[
            "Do you often think of your dog ?",
            "Does thinking of your dog bring anything else to mind?",
            "Why do you remember your dog just now?",
        ])
    );
}

#[test]
fn leading_text_does_not_shift_reply() {
    let mut e = eliza(14);
    assert_eq!(e.respond("Today I am sad"), "Why are you unhappy ?");
    assert_eq!(e.respond("i am sad"), "Why are you unhappy ?");
}

#[test]
fn leading_text_before_remember() {
    let mut e = eliza(15);
    let replies: HashSet<String> =
        (0..3).map(|_| e.respond("Yesterday I remember my dog")).collect();
    assert_eq!(
        replies,
        set(&[
            "Do you often think of your dog ?",
            "Does thinking of your dog bring anything else to mind?",
            "Why do you remember your dog just now?",
        ])
    );
}

#[test]
fn empty_capture_leaves_no_placeholder() {
    let mut e = eliza(16);
    let replies: HashSet<String> = (0..3).map(|_| e.respond("I remember.")).collect();
    assert_eq!(
        replies,
        set(&[
            "Do you often think of ?",
            "Does thinking of bring anything else to mind?",
            "Why do you remember just now?",
        ])
    );
}

#[test]
fn most_urgent_sentence_wins() {
    // "hello" has priority 9, "sorry" priority 2.
    let mut e = eliza(8);
    let apologies = set(&[
        "Please do not apologise.",
        "Apologies are not necessary.",
        "What feelings do you have when you apologise?",
    ]);
    for _ in 0..6 {
        assert!(apologies.contains(&e.respond("Hello there. I am sorry.")));
    }
}

#[test]
fn fallback_cycles_without_repeats() {
    let mut e = eliza(10);
    for _ in 0..3 {
        let cycle: HashSet<String> = (0..4).map(|_| e.respond("the weather is fine")).collect();
        assert_eq!(cycle, set(FALLBACK));
    }
}

#[test]
fn digits_and_symbols_are_ignored() {
    let mut e = eliza(11);
    assert_eq!(e.respond("I am 42 & sad"), "Why are you unhappy ?");
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[test]
fn quit_is_permanent() {
    let mut e = eliza(12);
    assert!(e.is_active());
    let reply = e.respond("OK, goodbye!");
    assert!(FAREWELL.contains(&reply.as_str()));
    assert!(!e.is_active());

    for input in ["hello", "i am sad", ""] {
        assert!(FAREWELL.contains(&e.respond(input).as_str()));
    }
}

#[test]
fn quit_word_must_stand_alone() {
    let mut e = eliza(13);
    let reply = e.respond("byebye quitter");
    assert!(FALLBACK.contains(&reply.as_str()));
    assert!(e.is_active());
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_transcript() {
    let transcript = |seed| {
        let mut e = Eliza::new(&script(), SmallRng::seed_from_u64(seed)).unwrap();
        let mut out = vec![e.welcome()];
        for input in ["hello", "i dream of computers", "no", "yes", "i am sad", "bye"] {
            out.push(e.respond(input));
        }
        out
    };
    assert_eq!(transcript(77), transcript(77));
}
