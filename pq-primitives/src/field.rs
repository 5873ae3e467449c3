use std::fmt::Display;

use rand::distributions::Distribution;
use rand::Rng;

use crate::error::{PqError, Result};

/// The integer modulus q of the ring Z/qZ.
///
/// Residues are plain `u32` values kept in the canonical range [0, q). The
/// modulus travels with every polynomial and scheme instance instead of being
/// baked into the element type, so schemes with different q can coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modulus(u32);

impl Modulus {
    /// Exclusive upper bound on the modulus. Two residues below it sum to
    /// less than 2^32.
    pub const MAX: u32 = 1 << 31;

    pub fn new(q: u32) -> Result<Self> {
        if q < 2 || q >= Self::MAX {
            return Err(PqError::InvalidParameters(
                "modulus must lie in [2, 2^31)",
            ));
        }
        Ok(Modulus(q))
    }

    /// For parameter tables whose moduli are known to be in range.
    pub(crate) const fn new_unchecked(q: u32) -> Self {
        Modulus(q)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    pub const fn reduce(&self, value: u64) -> u32 {
        (value % (self.0 as u64)) as u32
    }

    pub const fn from_signed(&self, value: i64) -> u32 {
        value.rem_euclid(self.0 as i64) as u32
    }

    /// Representative of `a` in (-q/2, q/2].
    pub const fn balanced(&self, a: u32) -> i64 {
        let g = (a > self.0 / 2) as i64;
        a as i64 - (self.0 as i64) * g
    }

    pub const fn add(&self, a: u32, b: u32) -> u32 {
        let (s, _) = a.overflowing_add(b);
        let (d, n) = s.overflowing_sub(self.0);
        let (r, _) = d.overflowing_add(self.0 * (n as u32));
        r
    }

    pub const fn neg(&self, a: u32) -> u32 {
        let is_nonzero = a != 0;
        (self.0 - a) * (is_nonzero as u32)
    }

    pub const fn sub(&self, a: u32, b: u32) -> u32 {
        self.add(a, self.neg(b))
    }

    pub const fn mul(&self, a: u32, b: u32) -> u32 {
        ((a as u64 * b as u64) % (self.0 as u64)) as u32
    }

    /// ⌊q/2⌋, the marker a set message bit is encoded as.
    pub const fn half(&self) -> u32 {
        self.0 / 2
    }

    /// Number of bits needed to write any residue.
    pub const fn bit_width(&self) -> usize {
        (u32::BITS - (self.0 - 1).leading_zeros()) as usize
    }

    /// Decode a noisy residue to the nearer of 0 and ⌊q/2⌋.
    pub const fn decode_bit(&self, a: u32) -> bool {
        let centered = self.balanced(a).unsigned_abs();
        // |a| > q/4, compared without dividing
        4 * centered > self.0 as u64
    }
}

/// Uniform residues by rejection sampling over `bit_width` random bits.
impl Distribution<u32> for Modulus {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let mask = ((1u64 << self.bit_width()) - 1) as u32;
        loop {
            let candidate = rng.next_u32() & mask;
            if candidate < self.0 {
                return candidate;
            }
        }
    }
}

impl Display for Modulus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.0))
    }
}

#[cfg(test)]
mod test {
    use rand::{thread_rng, Rng, RngCore};

    use crate::field::Modulus;

    const Q: u32 = 3329;

    #[test]
    fn test_from_signed() {
        let modulus = Modulus::new(Q).unwrap();
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let value = rng.gen_range(-100_000i64..100_000);
            let residue = modulus.from_signed(value);
            assert!(residue < Q);
            assert_eq!(0, (residue as i64 - value) % (Q as i64), "value: {value}");
        }
    }

    #[test]
    fn test_add() {
        let modulus = Modulus::new(Q).unwrap();
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let a = rng.next_u32() % Q;
            let b = rng.next_u32() % Q;
            assert_eq!(modulus.add(a, b), (a + b) % Q, "a: {a}, b: {b}");
        }
    }

    #[test]
    fn test_specific_neg() {
        let modulus = Modulus::new(Q).unwrap();
        assert_eq!(modulus.neg(0), 0);
        assert_eq!(modulus.neg(1), Q - 1);
        assert_eq!(modulus.sub(5, 7), Q - 2);
    }

    #[test]
    fn test_mul() {
        let modulus = Modulus::new(Q).unwrap();
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let a = rng.next_u32() % Q;
            let b = rng.next_u32() % Q;
            let product = ((a as u64 * b as u64) % Q as u64) as u32;
            assert_eq!(modulus.mul(a, b), product, "{a} * {b}");
        }
    }

    #[test]
    fn test_balanced() {
        let modulus = Modulus::new(97).unwrap();
        assert_eq!(modulus.balanced(0), 0);
        assert_eq!(modulus.balanced(48), 48);
        assert_eq!(modulus.balanced(49), -48);
        assert_eq!(modulus.balanced(96), -1);
    }

    #[test]
    fn test_decode_bit() {
        let modulus = Modulus::new(97).unwrap();
        assert!(!modulus.decode_bit(0));
        assert!(!modulus.decode_bit(24));
        assert!(modulus.decode_bit(25));
        assert!(modulus.decode_bit(modulus.half()));
        assert!(modulus.decode_bit(72));
        assert!(!modulus.decode_bit(73));
        assert!(!modulus.decode_bit(96));
    }

    #[test]
    fn test_bit_width() {
        assert_eq!(Modulus::new(97).unwrap().bit_width(), 7);
        assert_eq!(Modulus::new(3329).unwrap().bit_width(), 12);
        assert_eq!(Modulus::new(4096).unwrap().bit_width(), 12);
        assert_eq!(Modulus::new(2).unwrap().bit_width(), 1);
    }

    #[test]
    fn test_uniform_sample_in_range() {
        let modulus = Modulus::new(97).unwrap();
        let mut rng = thread_rng();
        let mut seen = [false; 97];
        for _ in 0..20_000 {
            let a: u32 = rng.sample(modulus);
            assert!(a < 97);
            seen[a as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_invalid_modulus() {
        assert!(Modulus::new(0).is_err());
        assert!(Modulus::new(1).is_err());
        assert!(Modulus::new(u32::MAX).is_err());
    }

    #[test]
    fn test_largest_modulus() {
        assert!(Modulus::new(Modulus::MAX).is_err());
        let q = Modulus::new(Modulus::MAX - 1).unwrap();
        let top = q.value() - 1;
        assert_eq!(q.add(top, top), top - 1);
        assert_eq!(q.sub(0, top), 1);
        assert_eq!(q.mul(top, top), 1);
    }
}
