use super::{
    header::{TypeDescriptor, TypeKind},
    FormatError, ReadDataError, ReadableElement,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use std::mem;

/// Byte order used to decode multi-byte elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endianness {
    /// The byte order of the platform doing the decoding.
    ///
    /// Only correct when the data was written in that same order; prefer
    /// [`Endianness::Big`] or [`Endianness::Little`] for anything read from
    /// a file.
    Host,
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
    /// Byte order has no meaning for the element type (single bytes and
    /// strings). Passing this to [`read_uints`] is an error.
    NotApplicable,
}

impl Endianness {
    /// Replaces an explicit order that matches the target platform with
    /// [`Endianness::Host`].
    pub(crate) fn resolve(self) -> Self {
        match self {
            Self::Little if cfg!(target_endian = "little") => Self::Host,
            Self::Big if cfg!(target_endian = "big") => Self::Host,
            other => other,
        }
    }
}

/// A fixed-width unsigned integer wider than one byte.
pub trait MultiByteUint: Copy + Default {
    /// Width of one element in bytes.
    const WIDTH: usize;

    /// Decodes `src` into `dst` under the byte order `B`.
    ///
    /// `src.len()` must equal `dst.len() * Self::WIDTH`.
    fn read_into<B: ByteOrder>(src: &[u8], dst: &mut [Self]);
}

macro_rules! impl_multi_byte_uint {
    ($($uint:ty => $read_into:ident),* $(,)?) => {
        $(
            impl MultiByteUint for $uint {
                const WIDTH: usize = mem::size_of::<$uint>();

                fn read_into<B: ByteOrder>(src: &[u8], dst: &mut [Self]) {
                    B::$read_into(src, dst);
                }
            }
        )*
    };
}

impl_multi_byte_uint!(u16 => read_u16_into, u32 => read_u32_into, u64 => read_u64_into);

/// Checks that `bytes` holds exactly `count` elements of `width` bytes.
fn check_len(bytes: &[u8], count: usize, width: usize) -> Result<(), FormatError> {
    let expected = count.checked_mul(width).ok_or(FormatError::LengthOverflow)?;
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(FormatError::LengthMismatch { expected, actual: bytes.len() })
    }
}

/// Decodes `count` unsigned integers of type `T` from `bytes`.
///
/// Element `i` is taken from `bytes[i * T::WIDTH..(i + 1) * T::WIDTH]`.
///
/// # Errors
///
/// - [`FormatError::ByteOrder`] if `endianness` is
///   [`Endianness::NotApplicable`]
/// - [`FormatError::LengthMismatch`] if `bytes.len() != count * T::WIDTH`
///
/// # Example
///
/// ```
/// use npy_loader::{read_uints, Endianness};
///
/// let bytes = [0x01, 0x00];
/// assert_eq!(read_uints::<u16>(&bytes, 1, Endianness::Little)?, [1]);
/// assert_eq!(read_uints::<u16>(&bytes, 1, Endianness::Big)?, [256]);
/// # Ok::<_, npy_loader::FormatError>(())
/// ```
pub fn read_uints<T: MultiByteUint>(
    bytes: &[u8],
    count: usize,
    endianness: Endianness,
) -> Result<Vec<T>, FormatError> {
    let read_into: fn(&[u8], &mut [T]) = match endianness {
        Endianness::Host => T::read_into::<NativeEndian>,
        Endianness::Big => T::read_into::<BigEndian>,
        Endianness::Little => T::read_into::<LittleEndian>,
        Endianness::NotApplicable => return Err(FormatError::ByteOrder(endianness)),
    };
    check_len(bytes, count, T::WIDTH)?;
    log::trace!("decoding {count} x {}-byte uints ({endianness:?})", T::WIDTH);
    let mut out = vec![T::default(); count];
    read_into(bytes, &mut out);
    Ok(out)
}

/// Copies `count` single-byte elements out of `bytes`.
///
/// Fails with [`FormatError::LengthMismatch`] if `bytes.len() != count`.
pub fn read_bytes(bytes: &[u8], count: usize) -> Result<Vec<u8>, FormatError> {
    check_len(bytes, count, 1)?;
    Ok(bytes.to_vec())
}

/// Decodes `count` zero-padded strings, each occupying `slot_width` bytes.
///
/// Only the zeros after the last non-zero byte of a slot are padding; zeros
/// before it are kept. A slot with no non-zero byte is the empty string.
///
/// Content that is not valid UTF-8 decodes to the empty string instead of
/// failing the whole array. This lenient policy matches how these files are
/// commonly consumed; callers that need to detect corrupt text must inspect
/// the raw bytes themselves.
///
/// # Errors
///
/// - [`FormatError::LengthMismatch`] if `bytes.len() != count * slot_width`
/// - [`FormatError::TooManyElements`] if `slot_width` is zero and `count`
///   empty strings cannot be allocated
///
/// # Example
///
/// ```
/// use npy_loader::read_strings;
///
/// let bytes = b"AB\0\0A\0B\0";
/// assert_eq!(read_strings(bytes, 2, 4)?, ["AB", "A\0B"]);
/// # Ok::<_, npy_loader::FormatError>(())
/// ```
pub fn read_strings(
    bytes: &[u8],
    count: usize,
    slot_width: usize,
) -> Result<Vec<String>, FormatError> {
    check_len(bytes, count, slot_width)?;
    log::trace!("decoding {count} x {slot_width}-byte strings");
    if slot_width == 0 {
        // `count` is not bounded by the input length here.
        let mut out = Vec::new();
        out.try_reserve_exact(count).map_err(|_| FormatError::TooManyElements(count))?;
        out.resize(count, String::new());
        return Ok(out);
    }
    Ok(bytes.chunks_exact(slot_width).map(decode_slot).collect())
}

fn decode_slot(slot: &[u8]) -> String {
    let Some(last) = slot.iter().rposition(|&b| b != 0) else {
        return String::new();
    };
    match std::str::from_utf8(&slot[..=last]) {
        Ok(s) => s.to_owned(),
        Err(err) => {
            log::debug!("substituting empty string for invalid UTF-8 slot: {err}");
            String::new()
        }
    }
}

fn wrong_descriptor(expected: &'static str, found: &TypeDescriptor) -> ReadDataError {
    ReadDataError::WrongDescriptor { expected, found: *found }
}

impl ReadableElement for u8 {
    fn read_vec(
        data: &[u8],
        type_desc: &TypeDescriptor,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        match type_desc {
            TypeDescriptor { kind: TypeKind::UnsignedInt, item_size: 1, .. } => {
                Ok(read_bytes(data, len)?)
            }
            _ => Err(wrong_descriptor("u8", type_desc)),
        }
    }
}

macro_rules! impl_readable_uint {
    ($($uint:ty),*) => {
        $(
            impl ReadableElement for $uint {
                fn read_vec(
                    data: &[u8],
                    type_desc: &TypeDescriptor,
                    len: usize,
                ) -> Result<Vec<Self>, ReadDataError> {
                    match type_desc {
                        TypeDescriptor { kind: TypeKind::UnsignedInt, item_size, endianness }
                            if *item_size == <$uint as MultiByteUint>::WIDTH =>
                        {
                            Ok(read_uints(data, len, endianness.resolve())?)
                        }
                        _ => Err(wrong_descriptor(stringify!($uint), type_desc)),
                    }
                }
            }
        )*
    };
}

impl_readable_uint!(u16, u32, u64);

impl ReadableElement for String {
    fn read_vec(
        data: &[u8],
        type_desc: &TypeDescriptor,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError> {
        match type_desc {
            TypeDescriptor { kind: TypeKind::FixedString, item_size, .. } => {
                Ok(read_strings(data, len, *item_size)?)
            }
            _ => Err(wrong_descriptor("String", type_desc)),
        }
    }
}
