//! Complexity-compliant password generation
//!
//! Random bytes come from the operating system's CSPRNG and are encoded to a
//! printable string. The encoded string is then padded with fixed literal
//! tokens for every required character class it lacks, checked in the order
//! upper, symbol, lower, digit. Padding never removes entropy, so the result
//! always satisfies the policy without regenerating.

use crate::hash::sha256_hex_upper;
use base64::{engine::general_purpose::STANDARD, Engine};
use dirprov_core::types::{PadPosition, PasswordEncoding, PasswordPolicy};
use dirprov_core::{Error, Result};
use rand::rngs::OsRng;
use rand::TryRngCore;
use tracing::debug;

/// Generates passwords for a fixed policy
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordGenerator {
    policy: PasswordPolicy,
}

impl PasswordGenerator {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Generate a password from `byte_length` bytes of OS entropy
    pub fn generate(&self, byte_length: usize) -> Result<String> {
        let mut rng = OsRng;
        self.generate_with(&mut rng, byte_length)
    }

    /// Generate a password from an explicit random source
    pub fn generate_with<R>(&self, rng: &mut R, byte_length: usize) -> Result<String>
    where
        R: TryRngCore + ?Sized,
    {
        let mut bytes = vec![0u8; byte_length];
        rng.try_fill_bytes(&mut bytes)
            .map_err(|e| Error::Entropy(e.to_string()))?;

        let encoded = match self.policy.encoding {
            PasswordEncoding::Base64 => STANDARD.encode(&bytes),
            PasswordEncoding::Sha256Hex => sha256_hex_upper(&bytes),
        };
        bytes.fill(0);

        let password = apply_policy(encoded, &self.policy);
        debug!(
            byte_length,
            length = password.len(),
            "Generated password"
        );
        Ok(password)
    }
}

/// Generate a password with `byte_length` bytes of entropy satisfying `policy`
pub fn generate_password(byte_length: usize, policy: &PasswordPolicy) -> Result<String> {
    PasswordGenerator::new(*policy).generate(byte_length)
}

/// Pad `encoded` so it contains every character class `policy` requires
pub fn apply_policy(encoded: String, policy: &PasswordPolicy) -> String {
    let mut password = encoded;
    for class in policy.required_classes() {
        if class.is_present(&password) {
            continue;
        }
        let (token, position) = class.pad();
        match position {
            PadPosition::Prefix => password.insert_str(0, token),
            PadPosition::Suffix => password.push_str(token),
        }
    }
    password
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirprov_core::types::CharacterClass;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// Random source that yields the same byte forever
    struct RepeatByte(u8);

    impl RngCore for RepeatByte {
        fn next_u32(&mut self) -> u32 {
            u32::from_le_bytes([self.0; 4])
        }

        fn next_u64(&mut self) -> u64 {
            u64::from_le_bytes([self.0; 8])
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(self.0);
        }
    }

    fn generate_fixed(byte: u8, len: usize, policy: PasswordPolicy) -> String {
        PasswordGenerator::new(policy)
            .generate_with(&mut RepeatByte(byte), len)
            .unwrap()
    }

    #[test]
    fn test_golden_base64_pads_symbol_lower_digit() {
        // "AAAA"
        assert_eq!(
            generate_fixed(0x00, 3, PasswordPolicy::default()),
            "AAAA!?@c73781"
        );
    }

    #[test]
    fn test_golden_base64_prefixes_upper() {
        // "////"
        assert_eq!(
            generate_fixed(0xff, 3, PasswordPolicy::default()),
            "BCA////c73781"
        );
    }

    #[test]
    fn test_golden_sha256_hex() {
        let policy = PasswordPolicy {
            encoding: PasswordEncoding::Sha256Hex,
            ..Default::default()
        };
        assert_eq!(
            generate_fixed(0x00, 3, policy),
            "709E80C88487A2411E1EE4DFB9F22A861492D20C4765150C0C794ABD70F8147C!?@c"
        );
    }

    #[test]
    fn test_no_requirements_leaves_encoding_untouched() {
        assert_eq!(generate_fixed(0x41, 3, PasswordPolicy::none()), "QUFB");
    }

    #[test]
    fn test_apply_policy_order() {
        // Upper is prepended before the suffixes are appended in order
        assert_eq!(
            apply_policy(String::new(), &PasswordPolicy::default()),
            "BCA!?@c73781"
        );
        let policy = PasswordPolicy {
            require_lower: false,
            ..Default::default()
        };
        assert_eq!(apply_policy("x".to_string(), &policy), "BCAx!?@73781");
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let generator = PasswordGenerator::default();
        let a = generator
            .generate_with(&mut StdRng::seed_from_u64(7), 60)
            .unwrap();
        let b = generator
            .generate_with(&mut StdRng::seed_from_u64(7), 60)
            .unwrap();
        assert_eq!(a, b);
        assert!(a.len() >= 80);
    }

    #[test]
    fn test_os_entropy() {
        let a = generate_password(60, &PasswordPolicy::default()).unwrap();
        let b = generate_password(60, &PasswordPolicy::default()).unwrap();
        assert_ne!(a, b);
        assert!(PasswordPolicy::default().is_satisfied_by(&a));
    }

    proptest! {
        #[test]
        fn generated_passwords_satisfy_all_classes(seed in any::<u64>(), len in 0usize..96) {
            let password = PasswordGenerator::default()
                .generate_with(&mut StdRng::seed_from_u64(seed), len)
                .unwrap();
            for class in CharacterClass::CHECK_ORDER {
                prop_assert!(class.is_present(&password), "missing {:?} in {}", class, password);
            }
        }

        #[test]
        fn hex_passwords_satisfy_all_classes(seed in any::<u64>(), len in 1usize..64) {
            let policy = PasswordPolicy {
                encoding: PasswordEncoding::Sha256Hex,
                ..Default::default()
            };
            let password = PasswordGenerator::new(policy)
                .generate_with(&mut StdRng::seed_from_u64(seed), len)
                .unwrap();
            prop_assert!(policy.is_satisfied_by(&password));
        }

        #[test]
        fn padding_preserves_encoded_text(seed in any::<u64>()) {
            let mut bytes = [0u8; 24];
            StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
            let encoded = STANDARD.encode(bytes);
            let password = apply_policy(encoded.clone(), &PasswordPolicy::default());
            prop_assert!(password.contains(&encoded));
        }
    }
}
