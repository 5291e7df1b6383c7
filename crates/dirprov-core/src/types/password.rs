//! Password complexity policy

use serde::{Deserialize, Serialize};

/// Character classes a generated password can be required to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Upper,
    Symbol,
    Lower,
    Digit,
}

/// Where the class-satisfying token is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadPosition {
    Prefix,
    Suffix,
}

impl CharacterClass {
    /// Fixed check order. Changing it changes the shape of generated passwords.
    pub const CHECK_ORDER: [CharacterClass; 4] = [
        CharacterClass::Upper,
        CharacterClass::Symbol,
        CharacterClass::Lower,
        CharacterClass::Digit,
    ];

    pub fn matches(&self, c: char) -> bool {
        match self {
            CharacterClass::Upper => c.is_ascii_uppercase(),
            CharacterClass::Symbol => c.is_ascii_punctuation(),
            CharacterClass::Lower => c.is_ascii_lowercase(),
            CharacterClass::Digit => c.is_ascii_digit(),
        }
    }

    pub fn is_present(&self, s: &str) -> bool {
        s.chars().any(|c| self.matches(c))
    }

    /// Literal token added when the class is missing
    pub fn pad(&self) -> (&'static str, PadPosition) {
        match self {
            CharacterClass::Upper => ("BCA", PadPosition::Prefix),
            CharacterClass::Symbol => ("!?@", PadPosition::Suffix),
            CharacterClass::Lower => ("c", PadPosition::Suffix),
            CharacterClass::Digit => ("73781", PadPosition::Suffix),
        }
    }
}

/// Printable encoding applied to the raw random bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordEncoding {
    /// Standard base64 of the random bytes
    #[default]
    Base64,
    /// Upper-case hex of SHA-256 over the random bytes
    Sha256Hex,
}

/// Required character classes for a generated password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_true")]
    pub require_upper: bool,
    #[serde(default = "default_true")]
    pub require_lower: bool,
    #[serde(default = "default_true")]
    pub require_digit: bool,
    #[serde(default = "default_true")]
    pub require_symbol: bool,
    #[serde(default)]
    pub encoding: PasswordEncoding,
}

fn default_true() -> bool {
    true
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_symbol: true,
            encoding: PasswordEncoding::default(),
        }
    }
}

impl PasswordPolicy {
    /// Policy with no class requirements
    pub fn none() -> Self {
        Self {
            require_upper: false,
            require_lower: false,
            require_digit: false,
            require_symbol: false,
            encoding: PasswordEncoding::default(),
        }
    }

    pub fn requires(&self, class: CharacterClass) -> bool {
        match class {
            CharacterClass::Upper => self.require_upper,
            CharacterClass::Symbol => self.require_symbol,
            CharacterClass::Lower => self.require_lower,
            CharacterClass::Digit => self.require_digit,
        }
    }

    /// Required classes in check order
    pub fn required_classes(&self) -> impl Iterator<Item = CharacterClass> + '_ {
        CharacterClass::CHECK_ORDER
            .into_iter()
            .filter(move |class| self.requires(*class))
    }

    /// Whether `password` contains every required class
    pub fn is_satisfied_by(&self, password: &str) -> bool {
        self.required_classes().all(|class| class.is_present(password))
    }
}
