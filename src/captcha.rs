//! Captcha Module
//!
//! Issues short-lived, single-use codes stored on their own [`TtlCache`].
//! Rendering a code as an image is left to the caller.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{Compute, TtlCache, DEFAULT_TTL, SWEEP_INTERVAL};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

/// Characters codes are drawn from; visually ambiguous ones are left out.
const CODE_ALPHABET: &[u8] = b"abcde2345678gfynmnpwx";

/// Default number of characters in a code
pub const DEFAULT_CODE_LENGTH: usize = 4;

// == Settings ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptchaSettings {
    /// How long a code stays valid
    pub ttl: Duration,
    /// Number of characters per code
    pub code_length: usize,
}

impl Default for CaptchaSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            code_length: DEFAULT_CODE_LENGTH,
        }
    }
}

/// A code waiting to be answered.
#[derive(Debug, Clone)]
struct IssuedCode {
    code: String,
    issued_at_ms: u64,
}

// == Challenge ==
/// What the caller hands to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CaptchaChallenge {
    pub captcha_key: String,
    pub code: String,
    /// Seconds until the code expires
    pub expires_in: u64,
}

// == Captcha Service ==
pub struct CaptchaService {
    codes: TtlCache<String, IssuedCode>,
    settings: CaptchaSettings,
    clock: Arc<dyn Clock>,
}

impl CaptchaService {
    /// Creates the service on the system clock.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(settings: CaptchaSettings) -> Self {
        Self::with_settings(settings, Arc::new(SystemClock), SWEEP_INTERVAL)
    }

    pub fn with_settings(
        settings: CaptchaSettings,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
    ) -> Self {
        let codes = TtlCache::with_settings("captcha", clock.clone(), sweep_interval);
        info!(ttl_secs = settings.ttl.as_secs(), "Captcha service initialized");

        Self {
            codes,
            settings,
            clock,
        }
    }

    // == Issue ==
    /// Generates and stores a new code.
    pub fn issue(&self) -> Result<CaptchaChallenge> {
        let now_ms = self.clock.now_millis();
        let code = generate_code(self.settings.code_length);
        let captcha_key = format!("{}{}", Uuid::new_v4().simple(), now_ms);

        self.codes.put(
            captcha_key.clone(),
            IssuedCode {
                code: code.clone(),
                issued_at_ms: now_ms,
            },
            self.settings.ttl,
        )?;
        info!(captcha_key = %captcha_key, "Captcha issued");

        Ok(CaptchaChallenge {
            captcha_key,
            code,
            expires_in: self.settings.ttl.as_secs(),
        })
    }

    // == Validate ==
    /// Checks an answer. A correct answer consumes the code; a wrong one
    /// leaves it in place until it expires.
    ///
    /// Comparison ignores case and surrounding whitespace.
    pub fn validate(&self, captcha_key: &str, answer: &str) -> bool {
        let answer = answer.trim();
        if captcha_key.is_empty() || answer.is_empty() {
            return false;
        }

        let now_ms = self.clock.now_millis();
        let ttl_ms = u64::try_from(self.settings.ttl.as_millis()).unwrap_or(u64::MAX);
        let mut outcome = Outcome::Missing;

        // Lookup, age check and consumption happen under one lock so a code
        // can only ever be accepted once.
        let result = self.codes.compute(captcha_key.to_string(), |current| {
            let Some(issued) = current else {
                return Compute::Keep;
            };
            if now_ms.saturating_sub(issued.issued_at_ms) >= ttl_ms {
                outcome = Outcome::Expired;
                Compute::Remove
            } else if issued.code.eq_ignore_ascii_case(answer) {
                outcome = Outcome::Accepted;
                Compute::Remove
            } else {
                outcome = Outcome::Rejected;
                Compute::Keep
            }
        });

        if let Err(e) = result {
            warn!(captcha_key, error = %e, "Failed to check captcha");
            return false;
        }

        match outcome {
            Outcome::Accepted => {
                info!(captcha_key, "Captcha accepted and consumed");
                true
            }
            Outcome::Missing => {
                warn!(captcha_key, "Captcha missing or expired");
                false
            }
            Outcome::Expired => {
                warn!(captcha_key, "Captcha expired");
                false
            }
            Outcome::Rejected => {
                warn!(captcha_key, "Captcha answer rejected");
                false
            }
        }
    }

    /// Human-readable statistics of the code cache.
    pub fn cache_stats(&self) -> String {
        self.codes.stats().to_string()
    }

    /// Drops every outstanding code.
    pub fn clear_all(&self) {
        self.codes.invalidate_all();
        info!("Cleared all captcha codes");
    }

    /// Stops the code cache's background sweep.
    pub async fn shutdown(&self) {
        self.codes.shutdown().await;
        info!("Captcha service shut down");
    }
}

/// What a validation attempt found.
enum Outcome {
    Missing,
    Expired,
    Accepted,
    Rejected,
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
