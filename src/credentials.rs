//! Bootstrap credential generation
//!
//! A [`CredentialGenerator`] owns a single RNG that is seeded once when the
//! generator is built. Production generators seed from the OS entropy source
//! and use `StdRng`, which is a cryptographically secure generator, so the
//! auth token is suitable for long-lived use. Tests inject a fixed seed.

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// Length of each generated secret
pub const SECRET_LENGTH: usize = 8;

/// Auth token and initial admin password handed to bootstrap
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub auth_token: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("auth_token", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct CredentialGenerator {
    rng: StdRng,
}

impl CredentialGenerator {
    /// Seed from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic generator for tests
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce a fresh token/password pair
    pub fn generate(&mut self) -> Credential {
        Credential {
            auth_token: self.secret(),
            password: self.secret(),
        }
    }

    fn secret(&mut self) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect()
    }
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self::new()
    }
}
