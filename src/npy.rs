mod elements;
pub mod header;

pub use self::elements::{read_bytes, read_strings, read_uints, Endianness, MultiByteUint};
use self::header::{Header, ParseHeaderError, RawNpy, ReadHeaderError, TypeDescriptor};
use std::{fs, io, mem, path::Path};
use thiserror::Error;

/// Read an `.npy` file located at the specified path.
///
/// The whole file is loaded into memory before decoding starts. This is a
/// convenience function for [`fs::read`] followed by
/// [`ReadNpyExt::from_npy_bytes`].
///
/// # Example
///
/// ```no_run
/// use npy_loader::{read_npy, Npy};
/// # use npy_loader::ReadNpyError;
///
/// let arr: Npy<u32> = read_npy("array.npy")?;
/// println!("shape = {:?}", arr.shape());
/// # Ok::<_, ReadNpyError>(())
/// ```
pub fn read_npy<P, T>(path: P) -> Result<T, ReadNpyError>
where
    P: AsRef<Path>,
    T: ReadNpyExt,
{
    T::from_npy_bytes(&fs::read(path)?)
}

/// Decodes a complete `.npy` buffer into an [`Npy`] array of `T`.
///
/// # Example
///
/// ```
/// use npy_loader::decode_npy;
///
/// let header = b"{'descr': '>u2', 'fortran_order': False, 'shape': (2,), }\n";
/// let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
/// bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
/// bytes.extend_from_slice(header);
/// bytes.extend_from_slice(&[0x00, 0x01, 0x01, 0x00]);
///
/// let arr = decode_npy::<u16>(&bytes)?;
/// assert_eq!(arr.shape(), &[2]);
/// assert_eq!(arr.as_slice(), &[1, 256]);
/// # Ok::<_, npy_loader::ReadNpyError>(())
/// ```
pub fn decode_npy<T: ReadableElement>(bytes: &[u8]) -> Result<Npy<T>, ReadNpyError> {
    RawNpy::parse(bytes)?.decode()
}

/// A malformed or unsupported `.npy` container, or element data that does
/// not fit the reader it was handed to.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormatError {
    /// The start of the file does not match the magic string.
    #[error("start does not match magic string")]
    MagicString,
    /// The major version is neither 1 nor 2.
    #[error("unsupported major version: {0}")]
    MajorVersion(u8),
    /// The minor version is not 0.
    #[error("unsupported minor version: {major}.{minor}")]
    MinorVersion {
        /// Major version number.
        major: u8,
        /// Minor version number.
        minor: u8,
    },
    /// Indicates that the `HEADER_LEN` doesn't fit in `usize`.
    #[error("HEADER_LEN {0} does not fit in `usize`")]
    HeaderLengthOverflow(u32),
    /// The input ends inside the fixed prefix or the header text.
    #[error("input has {available} bytes but {needed} are needed")]
    Truncated {
        /// Bytes required to read the next field.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },
    /// A byte order that cannot decode multi-byte integers.
    #[error("byte order {0:?} cannot decode multi-byte integers")]
    ByteOrder(Endianness),
    /// The element data length differs from count times element width.
    #[error("expected {expected} bytes of element data, found {actual}")]
    LengthMismatch {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },
    /// Overflow computing the byte length of the element data.
    #[error("overflow computing length of element data")]
    LengthOverflow,
    /// Memory for the decoded elements could not be allocated.
    #[error("cannot allocate {0} decoded elements")]
    TooManyElements(usize),
}

/// An array element type that can be read from an `.npy` file.
///
/// Implemented for `u8`, `u16`, `u32`, `u64` and [`String`].
pub trait ReadableElement: Sized {
    /// Decodes `len` elements from `data`.
    ///
    /// This method should return `Err(_)` in at least the following cases:
    ///
    /// * if the `type_desc` does not match `Self`
    /// * if `data` is not exactly `len` elements long
    fn read_vec(
        data: &[u8],
        type_desc: &TypeDescriptor,
        len: usize,
    ) -> Result<Vec<Self>, ReadDataError>;
}

/// An error reading array data.
#[derive(Debug, Error)]
pub enum ReadDataError {
    /// The data does not fit the reader.
    #[error("invalid element data: {0}")]
    Format(#[from] FormatError),
    /// The type descriptor does not match the element type.
    #[error("cannot read {found} data as {expected}")]
    WrongDescriptor {
        /// Name of the requested element type.
        expected: &'static str,
        /// Descriptor declared in the header.
        found: TypeDescriptor,
    },
}

/// An error reading a `.npy` file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadNpyError {
    /// An error caused by I/O.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The container or element data is malformed.
    #[error("invalid .npy data: {0}")]
    Format(#[from] FormatError),
    /// An error parsing the file header.
    #[error("error parsing header: {0}")]
    ParseHeader(#[from] ParseHeaderError),
    /// Overflow while computing the length of the array (in units of bytes or
    /// the number of elements) from the shape described in the file header.
    #[error("overflow computing length from shape")]
    LengthOverflow,
    /// The requested element type does not match the header.
    #[error("cannot read {found} data as {expected}")]
    TypeMismatch {
        /// Name of the requested element type.
        expected: &'static str,
        /// Descriptor declared in the header.
        found: TypeDescriptor,
    },
    /// An error caused by incorrect `Dimension` type.
    #[cfg(feature = "ndarray")]
    #[error("ndim {1} of array did not match Dimension type with NDIM = {0:?}")]
    WrongNdim(Option<usize>, usize),
    /// The decoded data could not be arranged into the header's shape.
    #[cfg(feature = "ndarray")]
    #[error("error building array: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl From<ReadHeaderError> for ReadNpyError {
    fn from(err: ReadHeaderError) -> Self {
        match err {
            ReadHeaderError::Format(err) => Self::Format(err),
            ReadHeaderError::Parse(err) => Self::ParseHeader(err),
        }
    }
}

impl From<ReadDataError> for ReadNpyError {
    fn from(err: ReadDataError) -> Self {
        match err {
            ReadDataError::Format(err) => Self::Format(err),
            ReadDataError::WrongDescriptor { expected, found } => {
                Self::TypeMismatch { expected, found }
            }
        }
    }
}

/// Extension trait for reading arrays from `.npy` data.
///
/// # Example
///
/// ```no_run
/// use npy_loader::{Npy, ReadNpyExt};
/// use std::fs::File;
/// # use npy_loader::ReadNpyError;
///
/// let reader = File::open("labels.npy")?;
/// let labels = Npy::<String>::read_npy(reader)?;
/// # Ok::<_, ReadNpyError>(())
/// ```
pub trait ReadNpyExt: Sized {
    /// Decodes the array from a buffer holding a complete `.npy` file.
    fn from_npy_bytes(bytes: &[u8]) -> Result<Self, ReadNpyError>;

    /// Reads `reader` to the end and decodes the array from it.
    fn read_npy<R: io::Read>(mut reader: R) -> Result<Self, ReadNpyError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_npy_bytes(&buf)
    }
}

/// A decoded `.npy` array.
///
/// The elements are kept in the order they were stored in the file; use
/// [`Npy::is_fortran_order`] or [`Npy::get`] to interpret them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Npy<T> {
    shape: Vec<usize>,
    fortran_order: bool,
    data: Vec<T>,
}

impl<T: ReadableElement> Npy<T> {
    /// Decodes a complete `.npy` buffer. Same as [`decode_npy`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReadNpyError> {
        decode_npy(bytes)
    }
}

impl<T> Npy<T> {
    /// Axis lengths.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes. Zero for a scalar.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if the elements are stored in column-major order.
    pub fn is_fortran_order(&self) -> bool {
        self.fortran_order
    }

    /// Elements in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consumes the array, returning the elements in storage order.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Returns the element at a multi-index, or `None` if the index has the
    /// wrong number of axes or is out of bounds.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len()
            || index.iter().zip(&self.shape).any(|(&i, &len)| i >= len)
        {
            return None;
        }
        let axes = index.iter().zip(&self.shape);
        let offset = if self.fortran_order {
            axes.rev().fold(0, |acc, (&i, &len)| acc * len + i)
        } else {
            axes.fold(0, |acc, (&i, &len)| acc * len + i)
        };
        self.data.get(offset)
    }

    #[cfg(feature = "ndarray")]
    pub(crate) fn into_parts(self) -> (Vec<usize>, bool, Vec<T>) {
        (self.shape, self.fortran_order, self.data)
    }
}

impl<T: ReadableElement> ReadNpyExt for Npy<T> {
    fn from_npy_bytes(bytes: &[u8]) -> Result<Self, ReadNpyError> {
        decode_npy(bytes)
    }
}

impl RawNpy<'_> {
    /// Decodes the element data as `T`.
    ///
    /// Fails with [`ReadNpyError::TypeMismatch`] if `T` does not match the
    /// header's type descriptor.
    pub fn decode<T: ReadableElement>(&self) -> Result<Npy<T>, ReadNpyError> {
        let len = shape_length_checked::<T>(&self.header).ok_or(ReadNpyError::LengthOverflow)?;
        let data = T::read_vec(self.data, &self.header.type_descriptor, len)?;
        Ok(Npy {
            shape: self.header.shape.clone(),
            fortran_order: self.header.fortran_order,
            data,
        })
    }
}

/// Computes the number of elements described by `header` when decoded into
/// `A`.
///
/// Returns `None` if the number of elements, or the length in bytes on either
/// side of the decode, would overflow `isize`.
fn shape_length_checked<A>(header: &Header) -> Option<usize> {
    const MAX: usize = isize::MAX as usize;
    let len = header.num_elements()?;
    let elem_size = mem::size_of::<A>().max(header.type_descriptor.item_size);
    (len.checked_mul(elem_size)? < MAX).then_some(len)
}
