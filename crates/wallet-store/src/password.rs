//! Random password generation for new wallets.

use rand::rngs::OsRng;
use rand::Rng;
use zeroize::Zeroizing;

use crate::eraser::Password;
use crate::error::{Result, StoreError};

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 100;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
pub const SPECIALS: &[u8] = b"!@#$%^&*()";
/// Characters that are easy to misread for one another.
pub const AMBIGUOUS: &[u8] = b"IlO01";

/// Which character classes a generated password draws from. Every enabled
/// class appears at least once in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub specials: bool,
    pub exclude_ambiguous: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            lowercase: true,
            uppercase: true,
            digits: true,
            specials: true,
            exclude_ambiguous: true,
        }
    }
}

impl PasswordPolicy {
    fn classes(&self) -> Vec<Vec<u8>> {
        [
            (self.lowercase, LOWERCASE),
            (self.uppercase, UPPERCASE),
            (self.digits, DIGITS),
            (self.specials, SPECIALS),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, chars)| {
            chars
                .iter()
                .copied()
                .filter(|c| !(self.exclude_ambiguous && AMBIGUOUS.contains(c)))
                .collect()
        })
        .collect()
    }
}

/// Generate a `length`-character password from OS randomness.
pub fn generate_password(length: usize, policy: &PasswordPolicy) -> Result<Password> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&length) {
        return Err(StoreError::InvalidPasswordPolicy(format!(
            "length must be between {MIN_LENGTH} and {MAX_LENGTH}"
        )));
    }
    let classes = policy.classes();
    if classes.is_empty() {
        return Err(StoreError::InvalidPasswordPolicy(
            "no character types chosen".to_string(),
        ));
    }
    let alphabet: Vec<u8> = classes.concat();

    let mut rng = OsRng;
    loop {
        let candidate: Zeroizing<Vec<u8>> = Zeroizing::new(
            (0..length)
                .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                .collect(),
        );
        let covers_all = classes
            .iter()
            .all(|class| candidate.iter().any(|c| class.contains(c)));
        if covers_all {
            return Ok(Password::new(candidate.to_vec()));
        }
    }
}
