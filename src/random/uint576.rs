//! Arithmetic modulo the RANLUX++ modulus $m = 2^{576} - 2^{240} + 1$ on nine 64-bit limbs.

/// A residue modulo [`MODULUS`], least significant limb first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Uint576(pub(crate) [u64; 9]);

/// The modulus $m = 2^{576} - 2^{240} + 1$.
pub(crate) const MODULUS: Uint576 = Uint576([
    1,
    0,
    0,
    0xffff_0000_0000_0000,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
]);

/// The RANLUX multiplier $a = m - (m - 1) / 2^{24}$, equivalent to subtract-with-borrow with
/// base $2^{24}$ and lags 10 and 24.
pub(crate) const MULTIPLIER: Uint576 = Uint576([
    1,
    0,
    0,
    0xffff_0000_0100_0000,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    0xffff_feff_ffff_ffff,
]);

type Wide = [u64; 18];

#[inline]
fn add_with_carry(a: u64, b: u64, carry: bool) -> (u64, bool) {
    let (sum, c1) = a.overflowing_add(b);
    let (sum, c2) = sum.overflowing_add(u64::from(carry));
    (sum, c1 || c2)
}

#[inline]
fn sub_with_borrow(a: u64, b: u64, borrow: bool) -> (u64, bool) {
    let (diff, b1) = a.overflowing_sub(b);
    let (diff, b2) = diff.overflowing_sub(u64::from(borrow));
    (diff, b1 || b2)
}

fn add_wide(lhs: &Wide, rhs: &Wide) -> Wide {
    let mut out = [0; 18];
    let mut carry = false;
    for (o, (&a, &b)) in out.iter_mut().zip(lhs.iter().zip(rhs)) {
        (*o, carry) = add_with_carry(a, b, carry);
    }
    debug_assert!(!carry);
    out
}

fn sub_wide(lhs: &Wide, rhs: &Wide) -> Wide {
    let mut out = [0; 18];
    let mut borrow = false;
    for (o, (&a, &b)) in out.iter_mut().zip(lhs.iter().zip(rhs)) {
        (*o, borrow) = sub_with_borrow(a, b, borrow);
    }
    debug_assert!(!borrow);
    out
}

impl Uint576 {
    pub(crate) const ONE: Self = Self([1, 0, 0, 0, 0, 0, 0, 0, 0]);

    fn mul_wide(&self, other: &Self) -> Wide {
        let mut w = [0; 18];
        for (i, &a) in self.0.iter().enumerate() {
            let mut carry = 0_u128;
            for (j, &b) in other.0.iter().enumerate() {
                let t = u128::from(a) * u128::from(b) + u128::from(w[i + j]) + carry;
                w[i + j] = t as u64;
                carry = t >> 64;
            }
            w[i + 9] = carry as u64;
        }
        w
    }

    fn is_reduced(&self) -> bool {
        for (&x, &m) in self.0.iter().zip(MODULUS.0.iter()).rev() {
            if x != m {
                return x < m;
            }
        }
        false
    }

    /// Reduces a 1152-bit product using $2^{576} \equiv 2^{240} - 1 \pmod m$.
    fn reduce(mut w: Wide) -> Self {
        // each pass shrinks the high part by at least 336 bits, so two passes suffice
        while w[9..].iter().any(|&limb| limb != 0) {
            let mut low = [0; 18];
            low[..9].copy_from_slice(&w[..9]);

            let mut high = [0; 18];
            high[..9].copy_from_slice(&w[9..]);

            // high * 2^240
            let mut shifted = [0; 18];
            for (i, &limb) in w[9..].iter().enumerate() {
                shifted[i + 3] |= limb << 48;
                shifted[i + 4] |= limb >> 16;
            }

            w = sub_wide(&add_wide(&low, &shifted), &high);
        }

        let mut result = Self([0; 9]);
        result.0.copy_from_slice(&w[..9]);

        // below 2^576 < 2m, so at most one subtraction is left
        if !result.is_reduced() {
            let mut borrow = false;
            for (x, &m) in result.0.iter_mut().zip(MODULUS.0.iter()) {
                (*x, borrow) = sub_with_borrow(*x, m, borrow);
            }
        }

        result
    }

    /// Returns `self * other mod m`.
    pub(crate) fn mul_mod(&self, other: &Self) -> Self {
        Self::reduce(self.mul_wide(other))
    }

    pub(crate) fn square(&self) -> Self {
        self.mul_mod(self)
    }

    /// Returns `self^exponent mod m` by square-and-multiply.
    pub(crate) fn pow(&self, mut exponent: u64) -> Self {
        let mut result = Self::ONE;
        let mut base = *self;
        while exponent != 0 {
            if exponent & 1 == 1 {
                result = result.mul_mod(&base);
            }
            base = base.square();
            exponent >>= 1;
        }
        result
    }
}
