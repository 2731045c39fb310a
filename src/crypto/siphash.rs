//! SipHash-2-4 specialised for a single 256-bit message
//!
//! The message is the four little-endian 64-bit words of a [`Hash256`],
//! so there is no length block beyond the fixed `32 << 56` tail word.

use crate::wire::Hash256;

const TAIL: u64 = 0x2000_0000_0000_0000;

struct SipState {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl SipState {
    fn new(k0: u64, k1: u64) -> Self {
        Self {
            v0: 0x736f_6d65_7073_6575 ^ k0,
            v1: 0x646f_7261_6e64_6f6d ^ k1,
            v2: 0x6c79_6765_6e65_7261 ^ k0,
            v3: 0x7465_6462_7974_6573 ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13) ^ self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16) ^ self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21) ^ self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17) ^ self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    // Two compression rounds per word
    fn compress(&mut self, word: u64) {
        self.v3 ^= word;
        self.round();
        self.round();
        self.v0 ^= word;
    }

    fn finish(mut self) -> u64 {
        self.v2 ^= 0xFF;
        for _ in 0..4 {
            self.round();
        }
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

/// SipHash-2-4 of a 256-bit value under keys `(k0, k1)`
pub fn siphash256(k0: u64, k1: u64, value: &Hash256) -> u64 {
    let mut state = SipState::new(k0, k1);
    for i in 0..4 {
        state.compress(value.word64(i));
    }
    state.compress(TAIL);
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const K0: u64 = 0x0706_0504_0302_0100;
    const K1: u64 = 0x0F0E_0D0C_0B0A_0908;

    #[test]
    fn test_siphash256_vector() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        assert_eq!(siphash256(K0, K1, &Hash256(bytes)), 0x7127_512f_72f2_7cce);
    }

    #[test]
    fn test_siphash256_depends_on_keys() {
        let value = Hash256::new([0xAB; 32]);
        assert_ne!(siphash256(K0, K1, &value), siphash256(K1, K0, &value));
    }
}
