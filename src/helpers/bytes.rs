//! Little-endian decoding of fixed-width integers and floats from byte slices.
//! Callers guarantee the slice is long enough.

macro_rules! le_decoder {
    ($name:ident, $ty:ty, $size:literal) => {
        #[inline]
        pub(crate) fn $name(bytes: &[u8]) -> $ty {
            let mut buffer = [0u8; $size];
            buffer.copy_from_slice(&bytes[..$size]);
            <$ty>::from_le_bytes(buffer)
        }
    };
}

le_decoder!(to_u16, u16, 2);
le_decoder!(to_u32, u32, 4);
le_decoder!(to_u64, u64, 8);
le_decoder!(to_f64, f64, 8);

/// Decodes the first 4 bytes as an unsigned index.
#[inline]
pub(crate) fn to_usize(bytes: &[u8]) -> usize {
    to_u32(bytes) as usize
}

/// Splits a byte slice into consecutive 4-byte indexes; a trailing partial chunk is dropped.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = usize> + '_ {
    bytes.chunks_exact(4).map(to_usize)
}
