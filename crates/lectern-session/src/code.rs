//! Join code allocation.

use rand::Rng;
use tracing::{trace, warn};

use crate::error::{Result, SessionError};

/// Longest code we hand out; keeps the code space within `u64`.
const MAX_CODE_LENGTH: usize = 18;

/// Issues fixed-length numeric join codes.
///
/// The allocator holds no state besides its settings, so one instance can
/// serve concurrent callers. It only avoids codes that `exists` reports as
/// taken at the moment of the check; the registry re-checks when it commits.
#[derive(Debug, Clone, Copy)]
pub struct CodeAllocator {
    length: usize,
    max_attempts: usize,
}

impl CodeAllocator {
    /// Allocator for codes of `length` digits (clamped to 1..=18),
    /// trying at most `max_attempts` candidates (at least one).
    pub fn new(length: usize, max_attempts: usize) -> Self {
        Self {
            length: length.clamp(1, MAX_CODE_LENGTH),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Digits per code.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Candidates tried per allocation.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Number of distinct codes.
    pub fn code_space(&self) -> u64 {
        10u64.pow(self.length as u32)
    }

    /// Draw random codes until one is not taken.
    pub fn allocate(&self, exists: impl Fn(&str) -> bool) -> Result<String> {
        let mut rng = rand::rng();
        for attempt in 1..=self.max_attempts {
            let code: String = (0..self.length)
                .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
                .collect();
            if !exists(&code) {
                trace!(attempt, "Allocated session code");
                return Ok(code);
            }
        }

        warn!(
            attempts = self.max_attempts,
            length = self.length,
            "Session code space exhausted"
        );
        Err(SessionError::CodeExhausted {
            attempts: self.max_attempts,
        })
    }
}
