//! Secret reconstruction
//!
//! Lagrange interpolation at x = 0, independently per byte position.
//!
//! There is no way to tell from the shares alone whether enough of them were
//! supplied: any >= 1 well-formed shares interpolate to *some* value, and an
//! undersized set yields a wrong secret with no error. The caller that knows
//! the threshold owns that check.

use crate::gf256;
use crate::split::Share;
use crate::ShamirError;

/// Reconstruct a secret from shares.
///
/// All shares must have the same byte length and pairwise-distinct non-zero
/// x-coordinates; anything else is a malformed set and fails before any
/// interpolation happens.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, ShamirError> {
    let first = shares.first().ok_or(ShamirError::NoShares)?;

    let secret_len = first.data.len();
    if shares.iter().any(|s| s.data.len() != secret_len) {
        return Err(ShamirError::LengthMismatch);
    }

    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 {
            return Err(ShamirError::ReservedIndex);
        }
        if seen[share.index as usize] {
            return Err(ShamirError::DuplicateIndex(share.index));
        }
        seen[share.index as usize] = true;
    }

    let mut secret = Vec::with_capacity(secret_len);
    for position in 0..secret_len {
        let points: Vec<(u8, u8)> = shares
            .iter()
            .map(|s| (s.index, s.data[position]))
            .collect();
        secret.push(gf256::lagrange_at_zero(&points)?);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::split;

    #[test]
    fn test_roundtrip_2_of_3() {
        let secret = b"Hello, threshold!";
        let shares = split(secret, 3, 2).unwrap();

        assert_eq!(combine(&shares[0..2]).unwrap(), secret);
        assert_eq!(combine(&shares[1..3]).unwrap(), secret);
        assert_eq!(
            combine(&[shares[0].clone(), shares[2].clone()]).unwrap(),
            secret
        );
    }

    #[test]
    fn test_roundtrip_3_of_5_all_subsets() {
        let secret: Vec<u8> = (0..32).collect();
        let shares = split(&secret, 5, 3).unwrap();

        // Every 3-subset of 5 shares must reconstruct the same secret.
        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = [shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    assert_eq!(combine(&subset).unwrap(), secret, "subset {a},{b},{c}");
                }
            }
        }
    }

    #[test]
    fn test_roundtrip_full_share_set() {
        // More than threshold shares still reconstruct exactly.
        let secret = [0xC3u8; 32];
        let shares = split(&secret, 7, 4).unwrap();
        assert_eq!(combine(&shares).unwrap(), secret);
    }

    #[test]
    fn test_under_threshold_returns_wrong_value_not_error() {
        // The structural hazard: t-1 shares interpolate fine and produce a
        // value that is (overwhelmingly) not the secret.
        let secret = b"under-threshold sets lie";
        let shares = split(secret, 5, 3).unwrap();

        let result = combine(&shares[0..2]).unwrap();
        assert_ne!(result, secret.to_vec());
    }

    #[test]
    fn test_rejects_empty_input() {
        assert_eq!(combine(&[]), Err(ShamirError::NoShares));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let mut shares = split(b"mismatch", 3, 2).unwrap();
        shares[1].data.push(0);
        assert_eq!(combine(&shares[0..2]), Err(ShamirError::LengthMismatch));
    }

    #[test]
    fn test_rejects_duplicate_index() {
        let shares = split(b"duplicate", 3, 2).unwrap();
        let duped = [shares[0].clone(), shares[0].clone()];
        assert_eq!(combine(&duped), Err(ShamirError::DuplicateIndex(1)));
    }

    #[test]
    fn test_rejects_reserved_index() {
        let mut shares = split(b"reserved", 3, 2).unwrap();
        shares[0].index = 0;
        assert_eq!(combine(&shares[0..2]), Err(ShamirError::ReservedIndex));
    }

    #[test]
    fn test_mixed_splits_reconstruct_garbage() {
        // Shares from different splits are silently meaningless together.
        let secret = b"one split at a time";
        let first = split(secret, 3, 2).unwrap();
        let second = split(secret, 3, 2).unwrap();

        let mixed = [first[0].clone(), second[1].clone()];
        let result = combine(&mixed).unwrap();
        assert_ne!(result, secret.to_vec());
    }
}
