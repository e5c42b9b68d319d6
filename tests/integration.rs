use npy_loader::{
    decode_npy, read_npy, read_strings, read_uints, Endianness, FormatError, Npy,
    ParseHeaderError, RawNpy, ReadNpyError, ReadNpyExt, TypeKind, Version,
};
use proptest::prelude::*;
use std::io::{Cursor, Write as _};

/// Builds a `.npy` file the way numpy lays it out, padding the header so the
/// data starts on a 64-byte boundary.
fn npy_file(major: u8, descr: &str, fortran_order: bool, shape: &str, data: &[u8]) -> Vec<u8> {
    let order = if fortran_order { "True" } else { "False" };
    let mut text = format!("{{'descr': '{descr}', 'fortran_order': {order}, 'shape': {shape}, }}");
    let prefix_len = if major == 1 { 10 } else { 12 };
    let padding = 64 - (prefix_len + text.len() + 1) % 64;
    text.extend(std::iter::repeat(' ').take(padding));
    text.push('\n');

    let mut out = b"\x93NUMPY".to_vec();
    out.extend_from_slice(&[major, 0]);
    if major == 1 {
        out.extend_from_slice(&(text.len() as u16).to_le_bytes());
    } else {
        out.extend_from_slice(&(text.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(text.as_bytes());
    assert_eq!(out.len() % 64, 0);
    out.extend_from_slice(data);
    out
}

#[test]
fn u8_array() {
    let bytes = npy_file(1, "|u1", false, "(2, 2)", &[1, 2, 3, 255]);
    let arr = decode_npy::<u8>(&bytes).unwrap();
    assert_eq!(arr.shape(), &[2, 2]);
    assert_eq!(arr.as_slice(), &[1, 2, 3, 255]);
}

#[test]
fn u16_little_and_big() {
    let data = [0x01, 0x00, 0x00, 0x01];
    let arr = decode_npy::<u16>(&npy_file(1, "<u2", false, "(2,)", &data)).unwrap();
    assert_eq!(arr.as_slice(), &[1, 256]);
    let arr = decode_npy::<u16>(&npy_file(1, ">u2", false, "(2,)", &data)).unwrap();
    assert_eq!(arr.as_slice(), &[256, 1]);
}

#[test]
fn u32_and_u64_arrays() {
    let values = [0u32, 1, 0xdead_beef];
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    let arr = decode_npy::<u32>(&npy_file(2, ">u4", false, "(3,)", &data)).unwrap();
    assert_eq!(arr.as_slice(), &values);

    let values = [u64::MAX, 7];
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let arr = decode_npy::<u64>(&npy_file(1, "<u8", true, "(1, 2)", &data)).unwrap();
    assert_eq!(arr.into_vec(), values);
}

#[test]
fn string_array() {
    let data = b"AB\0\0A\0B\0\0\0\0\0";
    let arr = decode_npy::<String>(&npy_file(1, "|S4", false, "(3,)", data)).unwrap();
    assert_eq!(arr.as_slice(), ["AB", "A\0B", ""]);
}

#[test]
fn empty_arrays() {
    let arr = decode_npy::<String>(&npy_file(1, "|S8", false, "(0,)", &[])).unwrap();
    assert!(arr.is_empty());
    let arr = decode_npy::<u32>(&npy_file(1, "<u4", false, "(3, 0)", &[])).unwrap();
    assert_eq!(arr.len(), 0);
    assert_eq!(arr.shape(), &[3, 0]);
}

#[test]
fn huge_zero_width_string_array_is_an_error() {
    let bytes = npy_file(1, "|S0", false, "(100000000000000000,)", &[]);
    assert!(matches!(
        decode_npy::<String>(&bytes),
        Err(ReadNpyError::Format(FormatError::TooManyElements(100_000_000_000_000_000)))
    ));
}

#[test]
fn header_length_field_width_depends_on_version() {
    let v1 = npy_file(1, "<u2", false, "(1,)", &[5, 0]);
    let v2 = npy_file(2, "<u2", false, "(1,)", &[5, 0]);
    let v1_len = u16::from_le_bytes([v1[8], v1[9]]) as usize;
    let v2_len = u32::from_le_bytes([v2[8], v2[9], v2[10], v2[11]]) as usize;
    assert_eq!(v1_len + 10, v1.len() - 2);
    assert_eq!(v2_len + 12, v2.len() - 2);

    let raw = RawNpy::parse(&v1).unwrap();
    assert_eq!(raw.version, Version::V1_0);
    assert_eq!(raw.data, &[5, 0]);
    let raw = RawNpy::parse(&v2).unwrap();
    assert_eq!(raw.version, Version::V2_0);
    assert_eq!(raw.data, &[5, 0]);
    assert_eq!(raw.decode::<u16>().unwrap().as_slice(), &[5]);
}

#[test]
fn raw_header_inspection() {
    let bytes = npy_file(1, ">u8", true, "(4, 5, 6)", &[]);
    let raw = RawNpy::parse(&bytes).unwrap();
    let desc = raw.header.type_descriptor;
    assert_eq!(desc.kind, TypeKind::UnsignedInt);
    assert_eq!(desc.item_size, 8);
    assert_eq!(desc.endianness, Endianness::Big);
    assert!(raw.header.fortran_order);
    assert_eq!(raw.header.num_elements(), Some(120));
}

#[test]
fn container_errors() {
    let mut bytes = npy_file(1, "<u2", false, "(1,)", &[0, 0]);
    bytes[0] = 0x94;
    assert!(matches!(
        decode_npy::<u16>(&bytes),
        Err(ReadNpyError::Format(FormatError::MagicString))
    ));

    let mut bytes = npy_file(1, "<u2", false, "(1,)", &[0, 0]);
    bytes[6] = 3;
    assert!(matches!(
        decode_npy::<u16>(&bytes),
        Err(ReadNpyError::Format(FormatError::MajorVersion(3)))
    ));

    let mut bytes = npy_file(1, "<u2", false, "(1,)", &[0, 0]);
    bytes[7] = 1;
    assert!(matches!(
        decode_npy::<u16>(&bytes),
        Err(ReadNpyError::Format(FormatError::MinorVersion { major: 1, minor: 1 }))
    ));

    assert!(matches!(decode_npy::<u16>(&[]), Err(ReadNpyError::Format(FormatError::MagicString))));
}

#[test]
fn data_length_must_match_shape() {
    let bytes = npy_file(1, "<u4", false, "(2,)", &[0; 7]);
    assert!(matches!(
        decode_npy::<u32>(&bytes),
        Err(ReadNpyError::Format(FormatError::LengthMismatch { expected: 8, actual: 7 }))
    ));
    let bytes = npy_file(1, "|S3", false, "(2,)", &[b'a'; 9]);
    assert!(matches!(
        decode_npy::<String>(&bytes),
        Err(ReadNpyError::Format(FormatError::LengthMismatch { expected: 6, actual: 9 }))
    ));
}

#[test]
fn type_mismatch() {
    let bytes = npy_file(1, "<u4", false, "(1,)", &[0; 4]);
    match decode_npy::<u64>(&bytes) {
        Err(ReadNpyError::TypeMismatch { expected, found }) => {
            assert_eq!(expected, "u64");
            assert_eq!(found.to_string(), "<u4");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    let bytes = npy_file(1, "|S4", false, "(1,)", b"abcd");
    assert!(matches!(
        decode_npy::<u8>(&bytes),
        Err(ReadNpyError::TypeMismatch { expected: "u8", .. })
    ));
}

#[test]
fn unsupported_descriptor() {
    let bytes = npy_file(1, "<f8", false, "(1,)", &[0; 8]);
    assert!(matches!(
        decode_npy::<u64>(&bytes),
        Err(ReadNpyError::ParseHeader(ParseHeaderError::UnsupportedDescriptor(d))) if d == "<f8"
    ));
}

#[test]
fn read_from_reader() {
    let bytes = npy_file(1, "|S2", false, "(2,)", b"hiyo");
    let arr = Npy::<String>::read_npy(Cursor::new(bytes)).unwrap();
    assert_eq!(arr.as_slice(), ["hi", "yo"]);
}

#[test]
fn read_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&npy_file(2, "<u2", false, "(3,)", &[1, 0, 2, 0, 3, 0])).unwrap();
    file.flush().unwrap();
    let arr: Npy<u16> = read_npy(file.path()).unwrap();
    assert_eq!(arr.as_slice(), &[1, 2, 3]);

    let missing = file.path().with_extension("missing");
    assert!(matches!(read_npy::<_, Npy<u16>>(missing), Err(ReadNpyError::Io(_))));
}

proptest! {
    #[test]
    fn decoding_is_deterministic(values in prop::collection::vec(any::<u32>(), 0..64)) {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let shape = format!("({},)", values.len());
        let bytes = npy_file(1, ">u4", false, &shape, &data);
        let first = decode_npy::<u32>(&bytes).unwrap();
        let second = decode_npy::<u32>(&bytes).unwrap();
        prop_assert_eq!(first.as_slice(), values.as_slice());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn big_endian_is_byte_reversed_little(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let count = bytes.len() / 8;
        let bytes = &bytes[..count * 8];
        let little = read_uints::<u64>(bytes, count, Endianness::Little).unwrap();
        let big = read_uints::<u64>(bytes, count, Endianness::Big).unwrap();
        for (l, b) in little.iter().zip(&big) {
            prop_assert_eq!(l.swap_bytes(), *b);
        }
    }

    #[test]
    fn string_slots_round_trip_ascii(words in prop::collection::vec("[a-z]{0,6}", 0..16)) {
        let mut data = Vec::new();
        for word in &words {
            let mut slot = word.as_bytes().to_vec();
            slot.resize(6, 0);
            data.extend_from_slice(&slot);
        }
        prop_assert_eq!(read_strings(&data, words.len(), 6).unwrap(), words);
    }
}
