//! Error Definitions
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use thiserror::Error;

/// Errors produced while decoding a firmware volume or extracting its contents.
///
/// Offsets are relative to the start of the firmware volume for volume and
/// file errors, and relative to the start of the enclosing file record for
/// section errors.
#[derive(Debug, Error)]
pub enum Error {
  /// The `_FVH` signature was not found at its fixed offset.
  #[error("firmware volume signature not found at offset {offset:#x}")]
  BadSignature { offset: usize },

  /// The volume claims more bytes than the input provides, or its header
  /// fields are mutually inconsistent.
  #[error("truncated firmware volume: need {needed:#x} bytes, have {available:#x}")]
  TruncatedFv { needed: u64, available: u64 },

  /// The block map terminated before a single usable entry.
  #[error("block map at offset {offset:#x} contains no entries")]
  EmptyBlockMap { offset: usize },

  /// A file record declares a size smaller than its own header.
  #[error("file at offset {offset:#x} declares size {size:#x}, smaller than the file header")]
  MalformedFfs { offset: usize, size: usize },

  /// A file record extends past the end of the volume file area.
  #[error("file at offset {offset:#x} declares size {size:#x}, past the end of the file area")]
  TruncatedFfs { offset: usize, size: usize },

  /// A section record declares a size outside the enclosing file body.
  #[error("section at offset {offset:#x} declares size {size:#x}, outside the enclosing file body")]
  MalformedSection { offset: usize, size: usize },

  /// A compression section uses an algorithm other than LZMA.
  #[error("compression section at offset {offset:#x} uses unsupported algorithm {algorithm:#04x}")]
  UnsupportedCompression { offset: usize, algorithm: u8 },

  /// The decompressed output does not match the declared size. Non-fatal:
  /// reported as a warning while the decompressed bytes are still exposed.
  #[error("decompressed length {actual:#x} does not match declared length {declared:#x}")]
  CompressionLengthMismatch { declared: usize, actual: usize },

  /// The LZMA stream was rejected by the decoder.
  #[error("LZMA stream could not be decoded")]
  DecompressionFailed,

  /// A filesystem write failed while emitting extracted artifacts.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
