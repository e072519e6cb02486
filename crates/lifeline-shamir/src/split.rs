//! Secret splitting
//!
//! One random polynomial per secret byte, constant term = the byte itself,
//! evaluated at x = 1..=N. Coefficients come from the OS CSPRNG; biased or
//! reused coefficients would void the information-theoretic guarantee.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::combine::combine;
use crate::gf256;
use crate::{ShamirError, SplitParams};

/// A single share of a split secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// x-coordinate (1..=N; x = 0 is the secret itself and never issued)
    pub index: u8,
    /// y-bytes, one per secret byte
    pub data: Vec<u8>,
}

/// Split a secret into `share_count` shares, any `threshold` of which
/// reconstruct it.
///
/// Fails without producing shares if `threshold < 2`, `threshold >
/// share_count`, or the secret is empty. Shares are only meaningful within
/// the set produced by one call; mixing shares across splits reconstructs
/// garbage with no error.
pub fn split(secret: &[u8], share_count: u8, threshold: u8) -> Result<Vec<Share>, ShamirError> {
    SplitParams {
        threshold,
        share_count,
    }
    .validate()?;
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }

    let mut shares: Vec<Share> = (1..=share_count)
        .map(|index| Share {
            index,
            data: Vec::with_capacity(secret.len()),
        })
        .collect();

    // p(x) = secret_byte + c1*x + ... + c_{t-1}*x^{t-1}, fresh coefficients
    // per byte position.
    let mut coefficients = Zeroizing::new(vec![0u8; threshold as usize]);
    for &secret_byte in secret {
        coefficients[0] = secret_byte;
        OsRng.fill_bytes(&mut coefficients[1..]);

        for share in &mut shares {
            share.data.push(gf256::eval_poly(&coefficients, share.index));
        }
    }

    Ok(shares)
}

/// Consistency check for a freshly split share set: two different
/// threshold-sized subsets must reconstruct the same value. Catches a
/// corrupted share before it gets distributed, not after.
pub fn audit_shares(shares: &[Share], threshold: usize) -> Result<(), ShamirError> {
    if shares.len() < threshold {
        return Err(ShamirError::InsufficientShares {
            needed: threshold,
            have: shares.len(),
        });
    }

    let head = Zeroizing::new(combine(&shares[..threshold])?);
    if shares.len() > threshold {
        let tail = Zeroizing::new(combine(&shares[shares.len() - threshold..])?);
        if *head != *tail {
            return Err(ShamirError::InconsistentShares);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_share_shape() {
        let secret = [7u8; 32];
        let shares = split(&secret, 5, 3).unwrap();

        assert_eq!(shares.len(), 5);
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.index, (i + 1) as u8);
            assert_eq!(share.data.len(), secret.len());
        }
    }

    #[test]
    fn test_split_indices_unique_and_nonzero() {
        let shares = split(b"some secret", 255, 2).unwrap();
        let mut seen = [false; 256];
        for share in &shares {
            assert_ne!(share.index, 0);
            assert!(!seen[share.index as usize], "index {} repeated", share.index);
            seen[share.index as usize] = true;
        }
    }

    #[test]
    fn test_split_rejects_bad_parameters() {
        let secret = b"test";
        assert_eq!(split(secret, 3, 1), Err(ShamirError::InvalidThreshold));
        assert_eq!(split(secret, 3, 0), Err(ShamirError::InvalidThreshold));
        assert_eq!(split(secret, 3, 5), Err(ShamirError::ThresholdExceedsShares));
        assert_eq!(split(&[], 3, 2), Err(ShamirError::EmptySecret));
    }

    #[test]
    fn test_split_uses_fresh_randomness() {
        // Two splits of the same secret must not produce the same share
        // bytes (probability ~2^-96 for a 12-byte secret).
        let secret = b"same secret!";
        let a = split(secret, 3, 2).unwrap();
        let b = split(secret, 3, 2).unwrap();
        assert_ne!(a[0].data, b[0].data);
    }

    #[test]
    fn test_single_share_does_not_leak() {
        // A share's y-bytes must differ from the secret bytes: the random
        // polynomial masks every position (equality chance 2^-256).
        let secret = [0xABu8; 32];
        let shares = split(&secret, 5, 3).unwrap();
        for share in &shares {
            assert_ne!(share.data, secret.to_vec());
        }
    }

    #[test]
    fn test_audit_accepts_good_set() {
        let shares = split(&[1u8; 16], 5, 3).unwrap();
        audit_shares(&shares, 3).unwrap();
    }

    #[test]
    fn test_audit_rejects_corrupted_set() {
        let mut shares = split(&[1u8; 16], 5, 3).unwrap();
        // Flip one byte in the last share; the head and tail subsets now
        // reconstruct different values.
        shares[4].data[0] ^= 0xFF;
        assert_eq!(audit_shares(&shares, 3), Err(ShamirError::InconsistentShares));
    }

    #[test]
    fn test_audit_needs_threshold_shares() {
        let shares = split(&[1u8; 16], 5, 3).unwrap();
        assert_eq!(
            audit_shares(&shares[..2], 3),
            Err(ShamirError::InsufficientShares { needed: 3, have: 2 })
        );
    }

    #[test]
    fn test_share_serde_roundtrip() {
        let shares = split(b"serialize me", 3, 2).unwrap();
        let json = serde_json::to_string(&shares[0]).unwrap();
        let restored: Share = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, shares[0]);
    }
}
