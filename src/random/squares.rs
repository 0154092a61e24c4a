//! The middle-square Weyl sequence engines of B. Widynski, "Squares: a fast counter-based RNG"
//! (arXiv:2004.06278).

use super::{impl_rng_core, splitmix64, CounterEngine};
use serde::{Deserialize, Serialize};

#[inline]
const fn round(x: u64, add: u64) -> u64 {
    x.wrapping_mul(x).wrapping_add(add).rotate_right(32)
}

/// Three rounds of squaring, 32-bit output.
#[inline]
const fn squares3(counter: u64, key: u64) -> u32 {
    let y = counter.wrapping_mul(key);
    let z = y.wrapping_add(key);
    let x = round(y, y);
    let x = round(x, z);
    (x.wrapping_mul(x).wrapping_add(y) >> 32) as u32
}

/// Four rounds of squaring, 32-bit output.
#[inline]
const fn squares4(counter: u64, key: u64) -> u32 {
    let y = counter.wrapping_mul(key);
    let z = y.wrapping_add(key);
    let x = round(y, y);
    let x = round(x, z);
    let x = round(x, y);
    (x.wrapping_mul(x).wrapping_add(z) >> 32) as u32
}

/// Keys must be odd; mixing the seed first keeps small seeds apart.
const fn key_from_seed(seed: u64) -> u64 {
    splitmix64(seed) | 1
}

macro_rules! squares_engine {
    ($(#[$meta:meta])* $name:ident, $function:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
        pub struct $name {
            seed: u64,
            key: u64,
            counter: u64,
        }

        impl $name {
            /// Returns the key derived from the seed.
            pub const fn key(&self) -> u64 {
                self.key
            }
        }

        impl CounterEngine for $name {
            type Word = u32;

            const WORD_BITS: u32 = 32;

            fn with_seed(seed: u64) -> Self {
                Self {
                    seed,
                    key: key_from_seed(seed),
                    counter: 0,
                }
            }

            fn seed(&self) -> u64 {
                self.seed
            }

            fn position(&self) -> u64 {
                self.counter
            }

            #[inline]
            fn next_word(&mut self) -> u32 {
                let word = $function(self.counter, self.key);
                self.counter = self.counter.wrapping_add(1);
                word
            }

            fn discard(&mut self, n: u64) {
                self.counter = self.counter.wrapping_add(n);
            }
        }

        impl_rng_core!($name);
    };
}

squares_engine!(
    /// Three-round squares engine. This is the default engine of the phase-space generators.
    Squares3,
    squares3
);

squares_engine!(
    /// Four-round squares engine, slower than [`Squares3`] with more rounds of mixing.
    Squares4,
    squares4
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squares3_reference_words() {
        let mut engine = Squares3::with_seed(0);
        assert_eq!(engine.key(), 0xe220_a839_7b1d_cdaf);
        let words: Vec<_> = (0..4).map(|_| engine.next_word()).collect();
        assert_eq!(words, [548_992_285, 4_009_417_508, 1_404_850_107, 4_124_028_383]);

        let mut engine = Squares3::with_seed(12345);
        assert_eq!(engine.key(), 0x2211_8258_a9d1_11a1);
        let words: Vec<_> = (0..4).map(|_| engine.next_word()).collect();
        assert_eq!(words, [898_517_633, 4_166_743_461, 591_391_803, 4_293_652_518]);
    }

    #[test]
    fn squares4_reference_words() {
        let mut engine = Squares4::with_seed(0);
        let words: Vec<_> = (0..4).map(|_| engine.next_word()).collect();
        assert_eq!(words, [488_650_043, 524_692_666, 723_195_832, 314_190_849]);

        let mut engine = Squares4::with_seed(12345);
        let words: Vec<_> = (0..4).map(|_| engine.next_word()).collect();
        assert_eq!(words, [2_061_236_424, 1_932_202_239, 2_359_165_980, 346_135_409]);
    }

    #[test]
    fn seed_zero_is_not_degenerate() {
        let mut engine = Squares3::with_seed(0);
        let words: Vec<_> = (0..64).map(|_| engine.next_word()).collect();
        assert!(words.iter().any(|&w| w != 0));
        assert!(words.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn different_seeds_differ() {
        let a: Vec<_> = {
            let mut e = Squares3::with_seed(1);
            (0..16).map(|_| e.next_word()).collect()
        };
        let b: Vec<_> = {
            let mut e = Squares3::with_seed(2);
            (0..16).map(|_| e.next_word()).collect()
        };
        assert_ne!(a, b);
    }

    #[test]
    fn serde_checkpoint_resumes_stream() {
        let mut engine = Squares4::with_seed(99);
        engine.discard(1234);

        let json = serde_json::to_string(&engine).unwrap();
        let mut restored: Squares4 = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, engine);

        for _ in 0..10 {
            assert_eq!(restored.next_word(), engine.next_word());
        }
    }
}
