use super::{elements::Endianness, FormatError};
use byteorder::{ByteOrder, LittleEndian};
use num_traits::ToPrimitive;
use py_literal::{ParseError as PyValueParseError, Value as PyValue};
use std::{error::Error, fmt};

/// Magic string to indicate npy format.
pub(crate) const MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// An error parsing the header text of a `.npy` file.
#[derive(Debug)]
pub enum ParseHeaderError {
    /// Indicates that the array format string contains non-ASCII characters.
    /// This is an error for .npy format versions 1.0 and 2.0.
    NonAscii,
    /// An unknown key was found in the metadata dictionary.
    UnknownKey(PyValue),
    /// A required key was missing from the metadata dictionary.
    MissingKey(&'static str),
    /// An illegal value was found for a key in the metadata dictionary.
    IllegalValue {
        /// The key for which the value was illegal.
        key: &'static str,
        /// The illegal value.
        value: PyValue,
    },
    /// The `descr` string names an element type this crate cannot decode.
    UnsupportedDescriptor(String),
    /// Error parsing the metadata dictionary.
    DictParse(PyValueParseError),
    /// The metadata is not a dictionary.
    MetaNotDict(PyValue),
    /// The header is missing a newline at the end.
    MissingNewline,
}

impl Error for ParseHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DictParse(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ParseHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NonAscii => write!(f, "non-ascii in array format string; this is not supported in .npy format versions 1.0 and 2.0"),
            Self::UnknownKey(key) => write!(f, "unknown key: {key}"),
            Self::MissingKey(key) => write!(f, "missing key: {key}"),
            Self::IllegalValue { key, value } => write!(f, "illegal value for key {key}: {value}"),
            Self::UnsupportedDescriptor(descr) => {
                write!(f, "unsupported type descriptor: {descr:?}")
            }
            Self::DictParse(err) => write!(f, "error parsing metadata dict: {err}"),
            Self::MetaNotDict(value) => write!(f, "metadata is not a dict: {value}"),
            Self::MissingNewline => write!(f, "newline missing at end of header"),
        }
    }
}

impl From<PyValueParseError> for ParseHeaderError {
    fn from(err: PyValueParseError) -> Self {
        Self::DictParse(err)
    }
}

/// An error splitting a `.npy` buffer into its header and data.
#[derive(Debug)]
pub enum ReadHeaderError {
    /// The container structure (magic, version, lengths) is invalid.
    Format(FormatError),
    /// The header text could not be parsed.
    Parse(ParseHeaderError),
}

impl Error for ReadHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl fmt::Display for ReadHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Format(err) => write!(f, "invalid .npy container: {err}"),
            Self::Parse(err) => write!(f, "error parsing header: {err}"),
        }
    }
}

impl From<FormatError> for ReadHeaderError {
    fn from(err: FormatError) -> Self {
        Self::Format(err)
    }
}

impl From<ParseHeaderError> for ReadHeaderError {
    fn from(err: ParseHeaderError) -> Self {
        Self::Parse(err)
    }
}

/// Format version of a `.npy` file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Version {
    /// Version 1.0, with a 2-byte `HEADER_LEN`.
    V1_0,
    /// Version 2.0, with a 4-byte `HEADER_LEN`.
    V2_0,
}

impl Version {
    /// Number of bytes taken up by version number (1 byte for major version, 1
    /// byte for minor version).
    const VERSION_NUM_BYTES: usize = 2;

    fn from_array([major, minor]: [u8; Self::VERSION_NUM_BYTES]) -> Result<Self, FormatError> {
        let version = match major {
            1 => Version::V1_0,
            2 => Version::V2_0,
            _ => return Err(FormatError::MajorVersion(major)),
        };
        if minor != 0 {
            return Err(FormatError::MinorVersion { major, minor });
        }
        Ok(version)
    }

    /// Major version number.
    pub const fn major_version(self) -> u8 {
        match self {
            Version::V1_0 => 1,
            Version::V2_0 => 2,
        }
    }

    /// Minor version number.
    pub const fn minor_version(self) -> u8 {
        0
    }

    /// Number of bytes in representation of header length.
    const fn header_len_num_bytes(self) -> usize {
        match self {
            Version::V1_0 => 2,
            Version::V2_0 => 4,
        }
    }

    /// Read header length from a field of exactly `header_len_num_bytes()`.
    fn read_header_len(self, field: &[u8]) -> Result<usize, FormatError> {
        match self {
            Version::V1_0 => Ok(usize::from(LittleEndian::read_u16(field))),
            Version::V2_0 => {
                let header_len = LittleEndian::read_u32(field);
                usize::try_from(header_len)
                    .map_err(|_| FormatError::HeaderLengthOverflow(header_len))
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major_version(), self.minor_version())
    }
}

/// Element type family named by the `descr` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Unsigned integer (`u`), 1, 2, 4 or 8 bytes wide.
    UnsignedInt,
    /// Zero-padded fixed-width byte string (`S`, or its alias `a`).
    FixedString,
}

/// The parsed `descr` field of a header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    /// Byte order of each element. Always [`Endianness::NotApplicable`] for
    /// single-byte integers and strings.
    pub endianness: Endianness,
    /// Element type family.
    pub kind: TypeKind,
    /// Element width in bytes (the slot width for strings).
    pub item_size: usize,
}

impl TypeDescriptor {
    /// Parses a numpy type string such as `'<u4'`, `'|u1'` or `'|S16'`.
    pub fn from_descr(descr: &str) -> Result<Self, ParseHeaderError> {
        let unsupported = || ParseHeaderError::UnsupportedDescriptor(descr.to_owned());
        let (endianness, rest) = match descr.as_bytes().first() {
            Some(b'<') => (Endianness::Little, &descr[1..]),
            Some(b'>') => (Endianness::Big, &descr[1..]),
            Some(b'=') => (Endianness::Host, &descr[1..]),
            Some(b'|') => (Endianness::NotApplicable, &descr[1..]),
            Some(_) => (Endianness::Host, descr),
            None => return Err(unsupported()),
        };
        let mut chars = rest.chars();
        let kind = match chars.next() {
            Some('u') => TypeKind::UnsignedInt,
            Some('S' | 'a') => TypeKind::FixedString,
            _ => return Err(unsupported()),
        };
        let size = chars.as_str();
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unsupported());
        }
        let item_size: usize = size.parse().map_err(|_| unsupported())?;
        match (kind, item_size) {
            (TypeKind::UnsignedInt, 1) | (TypeKind::FixedString, _) => Ok(Self {
                endianness: Endianness::NotApplicable,
                kind,
                item_size,
            }),
            (TypeKind::UnsignedInt, 2 | 4 | 8) if endianness == Endianness::NotApplicable => {
                Err(ParseHeaderError::IllegalValue {
                    key: "descr",
                    value: PyValue::String(descr.to_owned()),
                })
            }
            (TypeKind::UnsignedInt, 2 | 4 | 8) => Ok(Self { endianness, kind, item_size }),
            (TypeKind::UnsignedInt, _) => Err(unsupported()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let order = match self.endianness {
            Endianness::Little => '<',
            Endianness::Big => '>',
            Endianness::Host => '=',
            Endianness::NotApplicable => '|',
        };
        let kind = match self.kind {
            TypeKind::UnsignedInt => 'u',
            TypeKind::FixedString => 'S',
        };
        write!(f, "{order}{kind}{}", self.item_size)
    }
}

/// The header dictionary of a `.npy` file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Element type, width and byte order.
    pub type_descriptor: TypeDescriptor,
    /// `true` if the data is stored in column-major (Fortran) order.
    pub fortran_order: bool,
    /// Axis lengths.
    pub shape: Vec<usize>,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        self.to_py_value().fmt(f)
    }
}

impl Header {
    /// Parses the header text (the dictionary literal, padding and trailing
    /// newline) of a version 1.0 or 2.0 file.
    pub fn parse(text: &[u8]) -> Result<Self, ParseHeaderError> {
        let without_newline = match text.split_last() {
            Some((&b'\n', rest)) => rest,
            Some(_) | None => return Err(ParseHeaderError::MissingNewline),
        };
        if !without_newline.is_ascii() {
            return Err(ParseHeaderError::NonAscii);
        }
        // ASCII strings are always valid UTF-8
        let header_str =
            std::str::from_utf8(without_newline).map_err(|_| ParseHeaderError::NonAscii)?;
        let arr_format: PyValue = header_str.parse()?;
        Self::from_py_value(arr_format)
    }

    /// Number of elements described by the shape, `None` on overflow.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))
    }

    fn from_py_value(value: PyValue) -> Result<Self, ParseHeaderError> {
        let PyValue::Dict(dict) = value else {
            return Err(ParseHeaderError::MetaNotDict(value));
        };
        let mut type_descriptor = None;
        let mut fortran_order = None;
        let mut shape = None;
        for (key, value) in dict {
            match &key {
                PyValue::String(k) if k == "descr" => {
                    if let PyValue::String(descr) = &value {
                        type_descriptor = Some(TypeDescriptor::from_descr(descr)?);
                    } else {
                        return Err(ParseHeaderError::IllegalValue { key: "descr", value });
                    }
                }
                PyValue::String(k) if k == "fortran_order" => {
                    if let PyValue::Boolean(b) = value {
                        fortran_order = Some(b);
                    } else {
                        return Err(ParseHeaderError::IllegalValue { key: "fortran_order", value });
                    }
                }
                PyValue::String(k) if k == "shape" => {
                    fn parse_shape(value: &PyValue) -> Option<Vec<usize>> {
                        value
                            .as_tuple()?
                            .iter()
                            .map(|elem| elem.as_integer()?.to_usize())
                            .collect()
                    }
                    if let Some(s) = parse_shape(&value) {
                        shape = Some(s);
                    } else {
                        return Err(ParseHeaderError::IllegalValue { key: "shape", value });
                    }
                }
                _ => return Err(ParseHeaderError::UnknownKey(key)),
            }
        }
        let type_descriptor = type_descriptor.ok_or(ParseHeaderError::MissingKey("descr"))?;
        let fortran_order = fortran_order.ok_or(ParseHeaderError::MissingKey("fortran_order"))?;
        let shape = shape.ok_or(ParseHeaderError::MissingKey("shape"))?;
        Ok(Self { type_descriptor, fortran_order, shape })
    }

    fn to_py_value(&self) -> PyValue {
        PyValue::Dict(vec![
            (
                PyValue::String("descr".to_string()),
                PyValue::String(self.type_descriptor.to_string()),
            ),
            (
                PyValue::String("fortran_order".to_string()),
                PyValue::Boolean(self.fortran_order),
            ),
            (
                PyValue::String("shape".to_string()),
                PyValue::Tuple(
                    self.shape
                        .iter()
                        .map(|&elem| PyValue::Integer(elem.into()))
                        .collect(),
                ),
            ),
        ])
    }
}

/// A `.npy` buffer split into its parsed header and undecoded element bytes.
///
/// Use this to inspect the header of a file before choosing an element type
/// with [`RawNpy::decode`](crate::RawNpy::decode).
#[derive(Clone, Debug)]
pub struct RawNpy<'a> {
    /// Format version of the file.
    pub version: Version,
    /// Parsed header dictionary.
    pub header: Header,
    /// Every byte after the header. Its length is not checked against the
    /// header here.
    pub data: &'a [u8],
}

impl<'a> RawNpy<'a> {
    /// Validates the container structure of `bytes` and splits it.
    ///
    /// Fails before the header text is looked at if the magic string or
    /// version is wrong.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ReadHeaderError> {
        // Check for magic string
        if !bytes.starts_with(MAGIC_STRING) {
            return Err(FormatError::MagicString.into());
        }

        // Get version number
        let prefix_len = MAGIC_STRING.len();
        let buf = take(bytes, prefix_len, Version::VERSION_NUM_BYTES)?;
        let version = Version::from_array([buf[0], buf[1]])?;

        // Get `HEADER_LEN`
        let prefix_len = prefix_len + Version::VERSION_NUM_BYTES;
        let field = take(bytes, prefix_len, version.header_len_num_bytes())?;
        let header_len = version.read_header_len(field)?;

        // Parse the dictionary describing the array's format
        let prefix_len = prefix_len + version.header_len_num_bytes();
        let header = Header::parse(take(bytes, prefix_len, header_len)?)?;
        let data = &bytes[prefix_len + header_len..];
        log::debug!(
            "parsed .npy {version} header {header} with {} data bytes",
            data.len()
        );
        Ok(Self { version, header, data })
    }
}

/// Borrows `len` bytes at `offset`, failing instead of reading past the end.
fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8], FormatError> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(FormatError::Truncated {
            needed: offset.saturating_add(len),
            available: bytes.len(),
        })
}
