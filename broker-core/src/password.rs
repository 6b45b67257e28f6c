//! Cryptographically-strong password strings with class-alternation.
use std::sync::Mutex;

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Default generated password length.
pub const DEFAULT_LENGTH: usize = 32;

const CLASSES: &[&[u8]] = &[
    b"abcdefghijklmnopqrstuvwxyz",
    b"0123456789",
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    b"!-_.",
];

static RNG: Lazy<Mutex<StdRng>> = Lazy::new(|| Mutex::new(StdRng::from_entropy()));
static ALPHABET: Lazy<Vec<u8>> = Lazy::new(|| CLASSES.iter().flat_map(|class| class.iter().copied()).collect());

/// Generate a password of [`DEFAULT_LENGTH`] characters, drawn from four
/// character classes (lowercase, digits, uppercase, `!-_.`), such that no two
/// consecutive characters come from the same class.
#[must_use]
pub fn generate() -> String {
    generate_len(DEFAULT_LENGTH)
}

/// Generate a password of `len` characters with the same class-alternation
/// rule as [`generate`].
///
/// Each character is drawn uniformly from the full alphabet (not from a
/// uniformly-chosen class first), and re-drawn whenever it lands in the same
/// class as the previous character — so class frequency in the output
/// follows class size, not a per-class coin flip.
#[must_use]
pub fn generate_len(len: usize) -> String {
    let mut rng = RNG.lock().unwrap();
    let mut out = String::with_capacity(len);
    let mut prev_class = usize::MAX;

    for _ in 0..len {
        let ch = loop {
            let candidate = ALPHABET[rng.gen_range(0..ALPHABET.len())];
            let class = class_of(candidate as char).expect("every alphabet byte belongs to a class");
            if class != prev_class {
                prev_class = class;
                break candidate;
            }
        };

        out.push(ch as char);
    }

    out
}

fn class_of(c: char) -> Option<usize> {
    CLASSES
        .iter()
        .position(|class| class.contains(&(c as u8)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_length() {
        assert_eq!(generate().len(), DEFAULT_LENGTH);
    }

    #[test]
    fn never_repeats_a_class_consecutively() {
        for _ in 0..200 {
            let pw = generate_len(64);
            let classes: Vec<usize> = pw.chars().map(|c| class_of(c).unwrap()).collect();
            for window in classes.windows(2) {
                assert_ne!(window[0], window[1], "consecutive same-class chars in {pw:?}");
            }
        }
    }

    #[test]
    fn every_char_belongs_to_a_known_class() {
        let pw = generate_len(128);
        for c in pw.chars() {
            assert!(class_of(c).is_some(), "unexpected char {c:?}");
        }
    }

    #[test]
    fn symbol_class_is_underrepresented_relative_to_letters() {
        // The symbol class has 4 members against 26 for letters, so drawing
        // from the full alphabet (rather than a uniformly-chosen class first)
        // should make symbols much rarer than either letter class.
        let pw = generate_len(4096);
        let symbols = pw.chars().filter(|c| CLASSES[3].contains(&(*c as u8))).count();
        let lowercase = pw.chars().filter(|c| CLASSES[0].contains(&(*c as u8))).count();
        assert!(symbols * 2 < lowercase, "symbols {symbols} too close to lowercase {lowercase}");
    }
}
