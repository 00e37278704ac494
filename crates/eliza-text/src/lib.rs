//! ELIZA text utilities: input normalization, character filtering, sentence
//! splitting, whole-word phrase matching and typo injection.
//!
//! The response pipeline runs these in a fixed order:
//!
//! 1. [`normalize`]: trim and lowercase the raw input.
//! 2. (pre-substitution happens here, in `eliza-subst`)
//! 3. [`filter_chars`] then [`collapse_spaces`]: drop everything except
//!    letters, spaces, sentence terminators, apostrophes and hyphens.
//! 4. [`split_sentences`]: cut the input at sentence terminators.
//!
//! This crate has no dependencies on other eliza crates.

use rand::Rng;
use regex::{Regex, RegexBuilder};

/// Punctuation that ends a sentence (or clause) for splitting purposes.
pub const TERMINATORS: [char; 6] = ['.', ',', ':', ';', '!', '?'];

/// Trim surrounding whitespace and lowercase.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Remove every character that is not a letter, a space, a sentence
/// terminator, an apostrophe or a hyphen.
///
/// ```
/// use eliza_text::filter_chars;
///
/// assert_eq!(filter_chars("hi (there) #42, you!"), "hi there , you!");
/// ```
pub fn filter_chars(text: &str) -> String {
    text.chars().filter(|&c| is_kept(c)).collect()
}

fn is_kept(c: char) -> bool {
    c.is_alphabetic() || c == ' ' || c == '\'' || c == '-' || TERMINATORS.contains(&c)
}

/// Replace every run of two or more spaces with a single space.
pub fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for c in text.chars() {
        if c == ' ' {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        out.push(c);
    }
    out
}

/// Split filtered input into sentences.
///
/// A sentence ends at any terminator; spaces following the terminator are
/// dropped. Sentences are trimmed and empty ones discarded.
///
/// ```
/// use eliza_text::split_sentences;
///
/// assert_eq!(
///     split_sentences("hello there. i am sad, really!"),
///     vec!["hello there", "i am sad", "really"]
/// );
/// ```
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(|c: char| TERMINATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build a matcher that finds `phrase` only as a whole word (or words).
///
/// The phrase is taken literally. `cat` matches in "the cat sat" but never
/// inside "category".
pub fn word_matcher(phrase: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(phrase)))
        .case_insensitive(case_insensitive)
        .build()
}

/// Introduce a single "typo" by swapping one pair of adjacent characters.
///
/// A random position is chosen; the first position swaps with its right
/// neighbor, the last with its left neighbor, anything else with a randomly
/// chosen neighbor. Strings shorter than two characters are returned as-is.
pub fn transpose_adjacent<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len < 2 {
        return text.to_string();
    }
    if len == 2 {
        chars.swap(0, 1);
        return chars.into_iter().collect();
    }

    let at = rng.random_range(0..len);
    let other = if at == 0 {
        1
    } else if at == len - 1 {
        len - 2
    } else if rng.random_bool(0.5) {
        at - 1
    } else {
        at + 1
    };
    chars.swap(at, other);
    chars.into_iter().collect()
}
