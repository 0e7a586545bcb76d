//! LZMA Decompression Support
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::io::Cursor;

use crate::{error::Error, fw_fs::ffs::section::Decompressor};

/// Byte range of the unpacked-size field within the 13-byte `.lzma` stream
/// header.
const UNPACKED_SIZE_RANGE: core::ops::Range<usize> = 5..13;

/// Streams may declare an unknown unpacked size with an all-ones field.
const UNKNOWN_UNPACKED_SIZE: u64 = u64::MAX;

/// The unpacked-size field is untrusted input; preallocation is capped here
/// and the buffer grows normally past it.
const MAX_PREALLOC: u64 = 0x100_0000;

/// Decompressor for `.lzma` streams, backed by `lzma-rs`.
#[derive(Default, Clone, Copy)]
pub struct LzmaDecompressor;

impl Decompressor for LzmaDecompressor {
  fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, Error> {
    // preallocate from the unpacked-size field of the stream header, when
    // one is present.
    let mut decompressed = match compressed.get(UNPACKED_SIZE_RANGE) {
      Some(bytes) => {
        let unpacked_size = u64::from_le_bytes(bytes.try_into().unwrap());
        if unpacked_size == UNKNOWN_UNPACKED_SIZE {
          Vec::new()
        } else {
          Vec::with_capacity(unpacked_size.min(MAX_PREALLOC) as usize)
        }
      }
      None => Vec::new(),
    };

    lzma_rs::lzma_decompress(&mut Cursor::new(compressed), &mut decompressed)
      .map_err(|_| Error::DecompressionFailed)?;
    Ok(decompressed)
  }
}
