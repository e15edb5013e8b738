use byteorder::{ByteOrder, LittleEndian};

#[cfg(feature = "serde_support")]
use serde_derive::{Deserialize, Serialize};

/// Number of fingerprint slots per bucket. Fixed at compile time, as in the
/// reference design.
pub const BUCKET_SIZE: usize = 4;

/// Bit-packed storage for up to [`BUCKET_SIZE`] fingerprints of a given
/// width, backed by a flat byte array.
///
/// A `Bucket` has no notion of "empty" on its own: every value of the
/// configured width is a legal fingerprint, including zero. Occupancy is
/// tracked by the enclosing filter's bitmap, not by the bucket.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct Bucket {
    #[cfg_attr(feature = "serde_support", serde(with = "serde_bytes"))]
    data: Box<[u8]>,
}

impl Bucket {
    /// Allocates a bucket sized to hold [`BUCKET_SIZE`] fingerprints of
    /// `width` bits each.
    pub fn new(width: usize) -> Self {
        let nbytes = (BUCKET_SIZE * width + 7) / 8;
        Self {
            data: vec![0u8; nbytes].into_boxed_slice(),
        }
    }

    /// Reads the `width`-bit window for `slot`, zero-extended to 32 bits.
    pub fn read(&self, slot: usize, width: usize) -> u32 {
        debug_assert!(slot < BUCKET_SIZE);
        let bit_offset = slot * width;
        let byte_offset = bit_offset / 8;
        let shift = bit_offset % 8;
        let window = read_window(&self.data, byte_offset);
        ((window >> shift) & mask64(width)) as u32
    }

    /// Writes `value` (masked to `width` bits) into the window for `slot`,
    /// preserving the bits of any neighbouring slot packed into the same
    /// byte(s).
    pub fn write(&mut self, slot: usize, value: u32, width: usize) {
        debug_assert!(slot < BUCKET_SIZE);
        let bit_offset = slot * width;
        let byte_offset = bit_offset / 8;
        let shift = bit_offset % 8;
        let m = mask64(width);

        let mut window = read_window(&self.data, byte_offset);
        window &= !(m << shift);
        window |= (u64::from(value) & m) << shift;
        write_window(&mut self.data, byte_offset, window);
    }
}

fn mask64(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Reads up to 8 bytes starting at `byte_offset` as a little-endian u64,
/// zero-padding past the end of `data`. A width-32 fingerprint straddling a
/// byte boundary never needs more than 5 bytes, but the fixed 8-byte window
/// keeps the read/write paths identical regardless of width or alignment.
fn read_window(data: &[u8], byte_offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    let avail = data.len().saturating_sub(byte_offset);
    let n = avail.min(8);
    if n > 0 {
        buf[..n].copy_from_slice(&data[byte_offset..byte_offset + n]);
    }
    LittleEndian::read_u64(&buf)
}

fn write_window(data: &mut [u8], byte_offset: usize, window: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, window);
    let avail = data.len().saturating_sub(byte_offset);
    let n = avail.min(8);
    if n > 0 {
        data[byte_offset..byte_offset + n].copy_from_slice(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn round_trip_basic() {
        let mut bucket = Bucket::new(4);
        bucket.write(0, 5, 4);
        bucket.write(1, 9, 4);
        bucket.write(2, 0, 4);
        bucket.write(3, 15, 4);
        assert_eq!(bucket.read(0, 4), 5);
        assert_eq!(bucket.read(1, 4), 9);
        assert_eq!(bucket.read(2, 4), 0);
        assert_eq!(bucket.read(3, 4), 15);
    }

    #[test]
    fn write_does_not_perturb_neighbours() {
        let mut bucket = Bucket::new(12);
        bucket.write(0, 0xABC, 12);
        bucket.write(1, 0x123, 12);
        bucket.write(2, 0xFFF, 12);
        bucket.write(3, 0x000, 12);
        bucket.write(1, 0x456, 12);
        assert_eq!(bucket.read(0, 12), 0xABC);
        assert_eq!(bucket.read(1, 12), 0x456);
        assert_eq!(bucket.read(2, 12), 0xFFF);
        assert_eq!(bucket.read(3, 12), 0x000);
    }

    #[test]
    fn round_trip_across_widths() {
        // S3: for a spread of widths, write random values into all four
        // slots, read them back, rewrite, and read back again.
        let widths = [2, 3, 5, 7, 11, 12, 16, 23, 24, 31, 32];
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);

        for &width in &widths {
            let mut bucket = Bucket::new(width);
            let max: u64 = if width >= 32 { u32::MAX as u64 } else { (1u64 << width) - 1 };

            for round in 0..2 {
                let values: Vec<u32> = (0..BUCKET_SIZE)
                    .map(|_| rng.gen_range(0, max + 1) as u32)
                    .collect();
                for (slot, &value) in values.iter().enumerate() {
                    bucket.write(slot, value, width);
                }
                for (slot, &value) in values.iter().enumerate() {
                    assert_eq!(
                        bucket.read(slot, width),
                        value,
                        "width={width} slot={slot} round={round}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_is_an_ordinary_value() {
        let mut bucket = Bucket::new(8);
        bucket.write(0, 0, 8);
        bucket.write(1, 0, 8);
        assert_eq!(bucket.read(0, 8), 0);
        assert_eq!(bucket.read(1, 8), 0);
    }
}
