#![doc = include_str!("../README.md")]
//! ## Decode .npy Data
//!
//! - Typed arrays
//!   - [`decode_npy`] / [`Npy::from_bytes`] for an in-memory buffer
//!   - [`read_npy`] convenience function for a file path
//!   - [`ReadNpyExt`] extension trait for readers, implemented for [`Npy`]
//!     and, with the `ndarray` feature, for `ndarray::ArrayBase`
//! - Header inspection: [`RawNpy::parse`] splits a buffer into its [`Header`]
//!   and element bytes without decoding them
//! - Element readers: [`read_uints`], [`read_bytes`] and [`read_strings`]
//!
//! ## Limitations
//!
//! - Only format versions 1.0 and 2.0 are accepted.
//! - The element types are limited to unsigned integers (`u1`, `u2`, `u4`,
//!   `u8`) and zero-padded byte strings (`S`), decoded to `u8`, `u16`, `u32`,
//!   `u64` and [`String`].
//! - There is no writing support.
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs)]

mod npy;

#[cfg(feature = "ndarray")]
mod impl_ndarray;

pub use crate::npy::{
    decode_npy,
    header::{Header, ParseHeaderError, RawNpy, ReadHeaderError, TypeDescriptor, TypeKind, Version},
    read_bytes, read_npy, read_strings, read_uints, Endianness, FormatError, MultiByteUint, Npy,
    ReadDataError, ReadNpyError, ReadNpyExt, ReadableElement,
};
