//! Lifeline Shamir Module
//!
//! Split a signing seed into N shares where any T can reconstruct it.
//!
//! The arithmetic lives in GF(256) with the AES reduction polynomial, so a
//! share is one x-coordinate plus one y-byte per secret byte. Fewer than T
//! shares carry no information about the secret, and, importantly, the
//! combiner cannot tell an undersized share set from a complete one. Callers
//! that know the threshold must enforce it themselves (the recovery session
//! flow does).
//!
//! # Example: split a 32-byte seed 3-of-5
//!
//! ```
//! use lifeline_shamir::{combine, split};
//!
//! let seed = [0x42u8; 32];
//! let shares = split(&seed, 5, 3).unwrap();
//!
//! // Any 3 shares recover the seed.
//! let recovered = combine(&shares[1..4]).unwrap();
//! assert_eq!(recovered, seed);
//! ```

pub mod combine;
pub mod gf256;
pub mod split;

// Re-exports
pub use combine::combine;
pub use split::{audit_shares, split, Share};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShamirError {
    #[error("Invalid threshold: need at least 2")]
    InvalidThreshold,
    #[error("Threshold exceeds share count")]
    ThresholdExceedsShares,
    #[error("Secret is empty")]
    EmptySecret,
    #[error("No shares supplied")]
    NoShares,
    #[error("Shares have mismatched lengths")]
    LengthMismatch,
    #[error("Duplicate share index {0}")]
    DuplicateIndex(u8),
    #[error("Share index 0 is reserved for the secret")]
    ReservedIndex,
    #[error("Division by zero in GF(256)")]
    DivisionByZero,
    #[error("Need at least {needed} shares, have {have}")]
    InsufficientShares { needed: usize, have: usize },
    #[error("Share set reconstructs inconsistently")]
    InconsistentShares,
}

/// Parameters for a split: T-of-N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitParams {
    /// Minimum shares needed to reconstruct (T)
    pub threshold: u8,
    /// Total shares to generate (N)
    pub share_count: u8,
}

impl SplitParams {
    /// Common 2-of-3 setup
    pub fn two_of_three() -> Self {
        Self {
            threshold: 2,
            share_count: 3,
        }
    }

    /// Common 3-of-5 setup
    pub fn three_of_five() -> Self {
        Self {
            threshold: 3,
            share_count: 5,
        }
    }

    /// Validate the T-of-N relation. N <= 255 holds by the `u8` type.
    pub fn validate(&self) -> Result<(), ShamirError> {
        if self.threshold < 2 {
            return Err(ShamirError::InvalidThreshold);
        }
        if self.threshold > self.share_count {
            return Err(ShamirError::ThresholdExceedsShares);
        }
        Ok(())
    }
}
