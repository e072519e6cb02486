//! Galois Field GF(256) arithmetic for secret sharing
//!
//! Uses the irreducible polynomial x^8 + x^4 + x^3 + x + 1 (0x11B), the same
//! field AES operates in. Multiplication and division go through exp/log
//! tables built once on first use; readers after that point see immutable
//! state, so no synchronization is needed.

use std::sync::OnceLock;

use crate::ShamirError;

/// Exp table doubled to 510 entries so `exp[log_a + log_b]` needs no
/// explicit `mod 255`, plus the matching log table (log[0] is undefined
/// and never read; both operations special-case zero first).
struct Tables {
    exp: [u8; 510],
    log: [u8; 256],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Carry-less multiply with on-the-fly reduction by 0x11B.
/// Only used to build the tables; everything else goes through them.
fn mul_reduce(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    product
}

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        let mut exp = [0u8; 510];
        let mut log = [0u8; 256];

        // 0x03 generates the multiplicative group of this field (0x02 does not).
        let mut x: u8 = 1;
        for i in 0..255 {
            exp[i] = x;
            exp[i + 255] = x;
            log[x as usize] = i as u8;
            x = mul_reduce(x, 0x03);
        }

        Tables { exp, log }
    })
}

/// Add two elements in GF(256) (XOR)
#[inline]
pub fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Subtract two elements in GF(256) (same as add in characteristic 2)
#[inline]
pub fn sub(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Multiply two elements in GF(256)
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Divide two elements in GF(256)
#[inline]
pub fn div(a: u8, b: u8) -> Result<u8, ShamirError> {
    if b == 0 {
        return Err(ShamirError::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    let t = tables();
    // Offset by 255 so the exponent difference stays non-negative.
    Ok(t.exp[t.log[a as usize] as usize + 255 - t.log[b as usize] as usize])
}

/// Evaluate a polynomial at a given x value using Horner's method.
/// coefficients[0] is the constant term, coefficients[n-1] the highest degree.
pub fn eval_poly(coefficients: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    for &coefficient in coefficients.iter().rev() {
        result = add(mul(result, x), coefficient);
    }
    result
}

/// Lagrange interpolation evaluated at x = 0.
/// points: (x, y) pairs with pairwise-distinct non-zero x values.
pub fn lagrange_at_zero(points: &[(u8, u8)]) -> Result<u8, ShamirError> {
    let mut secret = 0u8;

    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut numerator = 1u8;
        let mut denominator = 1u8;

        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                // (0 - xj) = xj, since negation is the identity here
                numerator = mul(numerator, xj);
                denominator = mul(denominator, sub(xi, xj));
            }
        }

        let basis = div(numerator, denominator)?;
        secret = add(secret, mul(yi, basis));
    }

    Ok(secret)
}
