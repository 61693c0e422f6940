//! Various utilities shared by the Dodo crates

use byteorder::{NativeEndian, WriteBytesExt};
use std::{io::Cursor, mem};

mod pool;
pub use pool::*;

mod result_ext;
pub use result_ext::AnyhowResultExt;

pub type AnyResult<T = (), E = anyhow::Error> = anyhow::Result<T, E>;

/// Shorthand for `Ok(())`, cause it looks ugly
pub const fn ok<E>() -> Result<(), E> {
    Ok(())
}

/// Aligns the value. Alignment doesn't have to be a power of two.
///
/// ```
/// use dodo_utils::align;
/// assert_eq!(16, align(10, 8));
/// ```
pub const fn align(n: u64, a: u64) -> u64 {
    (n + a - 1) / a * a
}

/// Packs a list of floats into native endian bytes, ready to be uploaded into a GPU buffer.
pub fn pack_floats(buffer: &[f32]) -> Vec<u8> {
    let mut result = Vec::with_capacity(buffer.len() * mem::size_of::<f32>());
    let mut cursor = Cursor::new(&mut result);

    for &value in buffer {
        // Writes into a Vec can't fail
        let _ = cursor.write_f32::<NativeEndian>(value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up() {
        assert_eq!(align(0, 4), 0);
        assert_eq!(align(1, 4), 4);
        assert_eq!(align(12, 4), 12);
        assert_eq!(align(13, 3), 15);
    }

    #[test]
    fn pack_floats_native_layout() {
        let packed = pack_floats(&[1.0, -2.5]);
        assert_eq!(packed.len(), 8);
        assert_eq!(&packed[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&packed[4..8], &(-2.5f32).to_ne_bytes());
    }
}
