//! Generation of virtual file contents.
//!
//! Files contain lowercase letters, with a newline every [LINE_LENGTH]
//! bytes and at the very end. Every byte only depends on the path of the
//! file and its position, so reads at arbitrary offsets are consistent with
//! each other.

/// Every 32nd byte is a newline.
pub const LINE_LENGTH: u64 = 32;

/// Distance in the alphabet between two consecutive letters.
pub const STRIDE: u64 = 1723;

const ALPHABET_LEN: u64 = 26;

/// Derives a seed from a path, by folding every byte into an accumulator,
/// weighted with the byte preceding it.
pub fn seed_from_path(path: &str) -> u32 {
    let (seed, _) = path.bytes().fold((0u32, 0u32), |(seed, prev), b| {
        (seed.wrapping_add(u32::from(b).wrapping_mul(prev)), u32::from(b))
    });
    seed
}

/// Produces the bytes of a single virtual file.
#[derive(Clone, Copy, Debug)]
pub struct Generator {
    seed: u32,
    file_size: u64,
}

impl Generator {
    pub fn new(path: &str, file_size: u64) -> Self {
        Self {
            seed: seed_from_path(path),
            file_size,
        }
    }

    /// Returns the byte at the given position in the file.
    pub fn byte_at(&self, pos: u64) -> u8 {
        if pos % LINE_LENGTH == LINE_LENGTH - 1 || Some(pos) == self.file_size.checked_sub(1) {
            return b'\n';
        }

        // (seed + pos * STRIDE) mod 26, without overflowing for large positions.
        let idx = (u64::from(self.seed) % ALPHABET_LEN
            + (pos % ALPHABET_LEN) * (STRIDE % ALPHABET_LEN))
            % ALPHABET_LEN;

        b'a' + idx as u8
    }

    /// Fills buf with the bytes starting at offset.
    /// The caller is responsible for not reading past the end of the file.
    pub fn fill(&self, offset: u64, buf: &mut [u8]) {
        for (pos, b) in (offset..).zip(buf.iter_mut()) {
            *b = self.byte_at(pos);
        }
    }
}
