/*
 * ethernity: durable paper backups of arbitrary files
 * Copyright (C) 2026 Ethernity contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::ops::{Add, Div, Mul, Sub};
use std::sync::OnceLock;

use rand::{CryptoRng, RngCore};

/// A field element of `GF(2^8)`, with characteristic polynomial
/// `x^8 + x^4 + x^3 + x + 1` (the AES polynomial, `0x11b`).
///
/// Unlike `paperback`'s `GF(2^32)` field (which operates on the secret as a
/// stream of 32-bit words), shares here are built one byte at a time: every
/// byte of the (zero-padded) secret gets its own degree-`t-1` polynomial.
// NOTE: PartialEq is not timing-safe.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct GfElem(u8);

type Tables = ([u8; 256], [u8; 256]);

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        // Generator 0x03 is primitive for this polynomial; the classic
        // choice used by AES-GF(2^8)-based secret sharing schemes.
        let mut exp = [0u8; 256];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255usize {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= 0x11b;
            }
        }
        // exp[255] aliases exp[0], which keeps exp[a+b mod 255] lookups
        // simple when a+b lands exactly on 255.
        exp[255] = exp[0];
        (exp, log)
    })
}

impl GfElem {
    pub const ZERO: GfElem = GfElem(0);
    pub const ONE: GfElem = GfElem(1);

    pub fn from_u8(v: u8) -> Self {
        Self(v)
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }

    pub fn new_rand<R: CryptoRng + RngCore + ?Sized>(r: &mut R) -> Self {
        Self(r.next_u32() as u8)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Multiplicative inverse. Panics on zero; callers must never invert a
    /// zero share index.
    pub fn inverse(self) -> Self {
        assert!(!self.is_zero(), "cannot invert zero in GF(2^8)");
        let (exp, log) = tables();
        let l = log[self.0 as usize] as usize;
        Self(exp[(255 - l) % 255])
    }
}

impl Add for GfElem {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

// Subtraction is identical to addition in characteristic 2.
impl Sub for GfElem {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + rhs
    }
}

impl Mul for GfElem {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        let (exp, log) = tables();
        let sum = log[self.0 as usize] as usize + log[rhs.0 as usize] as usize;
        Self(exp[sum % 255])
    }
}

impl Div for GfElem {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        self * rhs.inverse()
    }
}

/// Evaluates a polynomial (lowest-degree coefficient first) at `x`.
pub fn eval_poly(coeffs: &[GfElem], x: GfElem) -> GfElem {
    // Horner's method, highest-degree coefficient first.
    let mut result = GfElem::ZERO;
    for &c in coeffs.iter().rev() {
        result = result * x + c;
    }
    result
}

/// Lagrange-interpolates `f(0)` given `(x, f(x))` sample points. All `x`
/// values must be distinct and non-zero; the caller is responsible for that
/// (duplicate or zero indices are a sharding-layer integrity violation, not a
/// field-arithmetic one).
pub fn interpolate_zero(points: &[(GfElem, GfElem)]) -> GfElem {
    let mut result = GfElem::ZERO;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut num = GfElem::ONE;
        let mut den = GfElem::ONE;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i == j {
                continue;
            }
            num = num * xj;
            den = den * (xi + xj);
        }
        result = result + yi * (num / den);
    }
    result
}

#[cfg(test)]
impl quickcheck::Arbitrary for GfElem {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self(u8::arbitrary(g))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_is_self_inverse() {
        let a = GfElem::from_u8(200);
        let b = GfElem::from_u8(37);
        assert_eq!((a + b) + b, a);
    }

    #[test]
    fn mul_inverse_roundtrip() {
        for v in 1..=255u8 {
            let a = GfElem::from_u8(v);
            assert_eq!(a * a.inverse(), GfElem::ONE);
        }
    }

    #[quickcheck]
    fn mul_div_roundtrip(a: GfElem, b: GfElem) -> bool {
        if b.is_zero() {
            return true;
        }
        (a * b) / b == a
    }

    #[test]
    fn eval_poly_constant_term() {
        let coeffs = [GfElem::from_u8(42), GfElem::from_u8(7)];
        assert_eq!(eval_poly(&coeffs, GfElem::ZERO), GfElem::from_u8(42));
    }

    #[test]
    fn interpolate_recovers_constant() {
        let secret = GfElem::from_u8(99);
        let coeffs = [secret, GfElem::from_u8(11), GfElem::from_u8(201)];
        let points: Vec<_> = (1..=3u8)
            .map(|x| {
                let x = GfElem::from_u8(x);
                (x, eval_poly(&coeffs, x))
            })
            .collect();
        assert_eq!(interpolate_zero(&points), secret);
    }
}
