//! Unit tests for credential generation

use rstest::rstest;
use std::collections::HashSet;
use tsguard::credentials::{CredentialGenerator, SECRET_LENGTH};

fn is_valid_secret(secret: &str) -> bool {
    secret.len() == SECRET_LENGTH && secret.chars().all(|c| c.is_ascii_alphanumeric())
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(0xdead_beef)]
#[case(u64::MAX)]
fn test_secrets_are_eight_alphanumerics(#[case] seed: u64) {
    let mut generator = CredentialGenerator::from_seed(seed);
    for _ in 0..200 {
        let credential = generator.generate();
        assert!(is_valid_secret(&credential.auth_token), "{}", credential.auth_token);
        assert!(is_valid_secret(&credential.password), "{}", credential.password);
    }
}

#[test]
fn test_os_seeded_generator() {
    let credential = CredentialGenerator::new().generate();
    assert!(is_valid_secret(&credential.auth_token));
    assert!(is_valid_secret(&credential.password));
}

#[test]
fn test_same_seed_same_sequence() {
    let mut a = CredentialGenerator::from_seed(99);
    let mut b = CredentialGenerator::from_seed(99);
    for _ in 0..10 {
        assert_eq!(a.generate(), b.generate());
    }
}

#[test]
fn test_alphabet_is_covered() {
    let mut generator = CredentialGenerator::from_seed(5);
    let mut seen = HashSet::new();
    for _ in 0..2000 {
        seen.extend(generator.generate().auth_token.chars());
    }
    // 16000 draws over 62 symbols
    assert_eq!(seen.len(), 62);
}

#[test]
fn test_debug_output_is_redacted() {
    let credential = CredentialGenerator::from_seed(1).generate();
    let rendered = format!("{:?}", credential);
    assert!(!rendered.contains(&credential.auth_token));
    assert!(!rendered.contains(&credential.password));
}
