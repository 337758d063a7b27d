//! Bundled byte-string hash functions.
//!
//! Both helpers share the signature `(data, seed0, seed1) -> u64` so either
//! can back a table's hash callback unchanged. [`sip`] is the keyed
//! SipHash-2-4 PRF and is the right default when keys can be influenced by an
//! attacker; [`murmur`] is faster on long inputs but offers no flood
//! resistance.
//!
//! Outputs match the reference implementations bit-for-bit, so digests may be
//! compared against values produced by other conformant implementations.

/// Reads a little-endian `u32` from the first four bytes of `bytes`.
#[inline(always)]
fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Reads a little-endian `u64` from the first eight bytes of `bytes`.
#[inline(always)]
fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

struct SipState {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl SipState {
    #[inline(always)]
    fn new(key0: u64, key1: u64) -> Self {
        SipState {
            v0: key0 ^ 0x736f_6d65_7073_6575,
            v1: key1 ^ 0x646f_7261_6e64_6f6d,
            v2: key0 ^ 0x6c79_6765_6e65_7261,
            v3: key1 ^ 0x7465_6462_7974_6573,
        }
    }

    #[inline(always)]
    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    #[inline(always)]
    fn compress(&mut self, m: u64) {
        self.v3 ^= m;
        self.round();
        self.round();
        self.v0 ^= m;
    }
}

/// Hashes `data` with SipHash-2-4, keyed by `(seed0, seed1)`.
///
/// Two compression rounds per 8-byte block, four finalization rounds. The
/// seeds form the 128-bit key of the underlying PRF, so distinct seeds yield
/// unrelated digest families.
pub fn sip(data: &[u8], seed0: u64, seed1: u64) -> u64 {
    let mut state = SipState::new(seed0, seed1);

    let mut blocks = data.chunks_exact(8);
    for block in &mut blocks {
        state.compress(read_u64(block));
    }

    // Final block: remaining bytes little-endian, length in the top byte.
    let mut b = (data.len() as u64) << 56;
    for (i, &byte) in blocks.remainder().iter().enumerate() {
        b |= u64::from(byte) << (8 * i);
    }
    state.compress(b);

    state.v2 ^= 0xff;
    state.round();
    state.round();
    state.round();
    state.round();

    state.v0 ^ state.v1 ^ state.v2 ^ state.v3
}

const MM_C1: u32 = 0x239b_961b;
const MM_C2: u32 = 0xab0e_9789;
const MM_C3: u32 = 0x38b3_4ae5;
const MM_C4: u32 = 0xa1e3_8b93;

#[inline(always)]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Collects `tail[range]` into a little-endian lane word.
#[inline(always)]
fn tail_lane(tail: &[u8], lo: usize, hi: usize) -> u32 {
    let mut k = 0u32;
    for i in (lo..hi.min(tail.len())).rev() {
        k = (k << 8) | u32::from(tail[i]);
    }
    k
}

/// Hashes `data` with MurmurHash3-x86-128 and returns the low 64 bits of the
/// 128-bit digest.
///
/// Only the low 32 bits of `seed0` seed the algorithm; `seed1` is accepted
/// for signature uniformity with [`sip`] and ignored.
pub fn murmur(data: &[u8], seed0: u64, _seed1: u64) -> u64 {
    let seed = seed0 as u32;
    let len = data.len();

    let mut h1 = seed;
    let mut h2 = seed;
    let mut h3 = seed;
    let mut h4 = seed;

    let mut blocks = data.chunks_exact(16);
    for block in &mut blocks {
        let k1 = read_u32(&block[0..4])
            .wrapping_mul(MM_C1)
            .rotate_left(15)
            .wrapping_mul(MM_C2);
        h1 ^= k1;
        h1 = h1
            .rotate_left(19)
            .wrapping_add(h2)
            .wrapping_mul(5)
            .wrapping_add(0x561c_cd1b);

        let k2 = read_u32(&block[4..8])
            .wrapping_mul(MM_C2)
            .rotate_left(16)
            .wrapping_mul(MM_C3);
        h2 ^= k2;
        h2 = h2
            .rotate_left(17)
            .wrapping_add(h3)
            .wrapping_mul(5)
            .wrapping_add(0x0bca_a747);

        let k3 = read_u32(&block[8..12])
            .wrapping_mul(MM_C3)
            .rotate_left(17)
            .wrapping_mul(MM_C4);
        h3 ^= k3;
        h3 = h3
            .rotate_left(15)
            .wrapping_add(h4)
            .wrapping_mul(5)
            .wrapping_add(0x96cd_1c35);

        let k4 = read_u32(&block[12..16])
            .wrapping_mul(MM_C4)
            .rotate_left(18)
            .wrapping_mul(MM_C1);
        h4 ^= k4;
        h4 = h4
            .rotate_left(13)
            .wrapping_add(h1)
            .wrapping_mul(5)
            .wrapping_add(0x32ac_3b17);
    }

    let tail = blocks.remainder();
    let t = tail.len();
    if t > 12 {
        let k4 = tail_lane(tail, 12, 16)
            .wrapping_mul(MM_C4)
            .rotate_left(18)
            .wrapping_mul(MM_C1);
        h4 ^= k4;
    }
    if t > 8 {
        let k3 = tail_lane(tail, 8, 12)
            .wrapping_mul(MM_C3)
            .rotate_left(17)
            .wrapping_mul(MM_C4);
        h3 ^= k3;
    }
    if t > 4 {
        let k2 = tail_lane(tail, 4, 8)
            .wrapping_mul(MM_C2)
            .rotate_left(16)
            .wrapping_mul(MM_C3);
        h2 ^= k2;
    }
    if t > 0 {
        let k1 = tail_lane(tail, 0, 4)
            .wrapping_mul(MM_C1)
            .rotate_left(15)
            .wrapping_mul(MM_C2);
        h1 ^= k1;
    }

    let len32 = len as u32;
    h1 ^= len32;
    h2 ^= len32;
    h3 ^= len32;
    h4 ^= len32;

    h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
    h2 = h2.wrapping_add(h1);
    h3 = h3.wrapping_add(h1);
    h4 = h4.wrapping_add(h1);

    h1 = fmix32(h1);
    h2 = fmix32(h2);
    h3 = fmix32(h3);
    h4 = fmix32(h4);

    // The reference finalization cross-adds all four lanes again; h3 and h4
    // only feed the high half of the digest, which this variant discards.
    h1 = h1.wrapping_add(h2).wrapping_add(h3).wrapping_add(h4);
    u64::from(h1) | (u64::from(h2.wrapping_add(h1)) << 32)
}
