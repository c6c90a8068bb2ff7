//! Fixed-width unsigned accumulator for mixed-radix packing
//!
//! Twenty symbols hold up to `88 · 89^19 ≈ 9.6e38` values, more than `u128`
//! reaches, and the largest broadcast group needs about `6.5e38`. Packing only
//! ever multiplies or divides by small radices, so a 160-bit integer with
//! schoolbook single-limb arithmetic is all that is required.

use std::cmp::Ordering;

const LIMBS: usize = 5;

/// 160-bit unsigned integer, little-endian 32-bit limbs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WideUint {
    limbs: [u32; LIMBS],
}

impl WideUint {
    pub const ZERO: Self = Self { limbs: [0; LIMBS] };

    pub fn from_u64(v: u64) -> Self {
        let mut limbs = [0; LIMBS];
        limbs[0] = v as u32;
        limbs[1] = (v >> 32) as u32;
        Self { limbs }
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    /// `self · m + a`, or `None` if the result does not fit
    pub fn checked_mul_add(self, m: u32, a: u32) -> Option<Self> {
        let mut limbs = [0; LIMBS];
        let mut carry = u64::from(a);
        for (out, &limb) in limbs.iter_mut().zip(self.limbs.iter()) {
            let v = u64::from(limb) * u64::from(m) + carry;
            *out = v as u32;
            carry = v >> 32;
        }
        (carry == 0).then_some(Self { limbs })
    }

    /// Quotient and remainder of division by a small non-zero divisor
    pub fn div_rem(self, d: u32) -> (Self, u32) {
        debug_assert!(d != 0);
        let mut limbs = [0; LIMBS];
        let mut rem = 0u64;
        for i in (0..LIMBS).rev() {
            let cur = (rem << 32) | u64::from(self.limbs[i]);
            limbs[i] = (cur / u64::from(d)) as u32;
            rem = cur % u64::from(d);
        }
        (Self { limbs }, rem as u32)
    }
}

impl Ord for WideUint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.limbs.iter().rev().cmp(other.limbs.iter().rev())
    }
}

impl PartialOrd for WideUint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
