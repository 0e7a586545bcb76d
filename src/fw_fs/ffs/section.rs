//! FFS Section Decoding
//!
//! Based on the section definitions in the UEFI Platform Initialization (PI)
//! Specification, Volume 3. Compression sections carrying an LZMA stream are
//! decompressed as they are decoded; every other section exposes its raw
//! post-header bytes.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use core::fmt;
use std::borrow::Cow;

use log::{debug, warn};

use crate::{
  address_helper::align_up,
  error::Error,
  fw_fs::{ffs::FFS_HEADER_SIZE, read_u24_le},
};

/// Sections are placed on 4-byte boundaries within the file body. This is
/// distinct from the 8-byte file stride.
pub const SECTION_ALIGNMENT: usize = 4;

/// Size of the common section header (type tag plus 24-bit size).
pub const SECTION_HEADER_SIZE: usize = 4;

/// Size of the compression header at the front of a compression section body
/// (algorithm tag plus 24-bit uncompressed size).
const COMPRESSION_HEADER_SIZE: usize = 4;

/// Algorithm tag for LZMA, the only compression this decoder understands.
const COMPRESSION_ALGORITHM_LZMA: u8 = 0x01;

/// Raw section type tags.
pub mod raw_type {
  pub const COMPRESSION: u8 = 0x01;
  pub const PE32: u8 = 0x10;
  pub const PIC: u8 = 0x11;
  pub const VERSION: u8 = 0x20;
  pub const GUID_DEFINED: u8 = 0x24;
}

/// Section type tag, with a catch-all for tags this decoder does not name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SectionType {
  Compression,
  Pe32,
  Pic,
  Version,
  GuidDefined,
  Unknown(u8),
}

impl SectionType {
  pub fn from_raw(raw: u8) -> SectionType {
    match raw {
      raw_type::COMPRESSION => SectionType::Compression,
      raw_type::PE32 => SectionType::Pe32,
      raw_type::PIC => SectionType::Pic,
      raw_type::VERSION => SectionType::Version,
      raw_type::GUID_DEFINED => SectionType::GuidDefined,
      other => SectionType::Unknown(other),
    }
  }

  pub fn raw(&self) -> u8 {
    match *self {
      SectionType::Compression => raw_type::COMPRESSION,
      SectionType::Pe32 => raw_type::PE32,
      SectionType::Pic => raw_type::PIC,
      SectionType::Version => raw_type::VERSION,
      SectionType::GuidDefined => raw_type::GUID_DEFINED,
      SectionType::Unknown(raw) => raw,
    }
  }

  /// Name used in extracted artifact filenames. Unnamed tags render as
  /// `Sec` plus two uppercase hex digits.
  pub fn name(&self) -> Cow<'static, str> {
    match *self {
      SectionType::Compression => Cow::Borrowed("Compression"),
      SectionType::Pe32 => Cow::Borrowed("PE32"),
      SectionType::Pic => Cow::Borrowed("PIC"),
      SectionType::Version => Cow::Borrowed("Version"),
      SectionType::GuidDefined => Cow::Borrowed("GUID-defined"),
      SectionType::Unknown(raw) => Cow::Owned(format!("Sec{raw:02X}")),
    }
  }
}

/// Decompresses the stream of a compression section.
///
/// The decoder only depends on this seam, so tests can substitute a stub for
/// the real LZMA implementation.
pub trait Decompressor {
  fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, Error>;
}

/// One decoded section.
///
/// For a compression section the payload is the decompressed output and is
/// owned; for every other section it borrows the post-header bytes of the
/// record.
pub struct Section<'a> {
  section_type: SectionType,
  size: usize,
  attributes: u8,
  file_offset: usize,
  payload: Cow<'a, [u8]>,
}

impl<'a> Section<'a> {
  /// `record` must be exactly the declared section size; the iterator
  /// enforces this.
  fn parse(
    record: &'a [u8],
    file_offset: usize,
    decompressor: &dyn Decompressor,
  ) -> Result<Section<'a>, Error> {
    let section_type = SectionType::from_raw(record[0]);
    let size = record.len();
    let attributes = if size > SECTION_HEADER_SIZE { record[SECTION_HEADER_SIZE] } else { 0 };
    let body = &record[SECTION_HEADER_SIZE..];

    let payload = match section_type {
      SectionType::Compression => {
        Cow::Owned(decompress_body(body, file_offset, decompressor)?)
      }
      _ => Cow::Borrowed(body),
    };

    debug!(
      "section @{:#x}: type={} size={:#x} payload={:#x}",
      file_offset,
      section_type.name(),
      size,
      payload.len()
    );
    Ok(Section { section_type, size, attributes, file_offset, payload })
  }

  /// Returns the section type tag.
  pub fn section_type(&self) -> SectionType {
    self.section_type
  }

  /// Returns the display name of the section type.
  pub fn type_name(&self) -> Cow<'static, str> {
    self.section_type.name()
  }

  /// Returns the total section size (header included).
  pub fn size(&self) -> usize {
    self.size
  }

  /// Returns the attribute byte, or zero for a header-only section.
  pub fn attributes(&self) -> u8 {
    self.attributes
  }

  /// Returns the offset of this section record from the start of the
  /// enclosing file record.
  pub fn file_offset(&self) -> usize {
    self.file_offset
  }

  /// Returns the exposed payload: decompressed output for a compression
  /// section, the raw post-header bytes otherwise.
  pub fn payload(&self) -> &[u8] {
    &self.payload
  }
}

impl fmt::Debug for Section<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Section @{:#x} type: {} size: {:#x}",
      self.file_offset,
      self.type_name(),
      self.size
    )
  }
}

/// Decodes the compression header of a compression section body and inflates
/// the trailing stream.
fn decompress_body(
  body: &[u8],
  file_offset: usize,
  decompressor: &dyn Decompressor,
) -> Result<Vec<u8>, Error> {
  if body.len() < COMPRESSION_HEADER_SIZE {
    Err(Error::MalformedSection {
      offset: file_offset,
      size: SECTION_HEADER_SIZE + body.len(),
    })?;
  }
  let algorithm = body[0];
  let declared = read_u24_le(body, 1);
  if algorithm != COMPRESSION_ALGORITHM_LZMA {
    Err(Error::UnsupportedCompression { offset: file_offset, algorithm })?;
  }

  let stream = &body[COMPRESSION_HEADER_SIZE..];
  let decompressed = decompressor.decompress(stream)?;
  if decompressed.len() != declared {
    // the declared size is advisory; expose the decoder output regardless.
    warn!("{}", Error::CompressionLengthMismatch { declared, actual: decompressed.len() });
  }
  debug!("compression section @{:#x}: {:#x} -> {:#x} bytes", file_offset, stream.len(), decompressed.len());
  Ok(decompressed)
}

/// Iterator over the sections of a file body.
///
/// Yields an error and ends the walk when a record is malformed, its
/// compression algorithm is not LZMA, or its stream cannot be decoded.
pub struct SectionIterator<'a, 'd> {
  body: &'a [u8],
  cursor: usize,
  decompressor: &'d dyn Decompressor,
  done: bool,
}

impl<'a, 'd> SectionIterator<'a, 'd> {
  pub(crate) fn new(body: &'a [u8], decompressor: &'d dyn Decompressor) -> SectionIterator<'a, 'd> {
    SectionIterator { body, cursor: 0, decompressor, done: false }
  }
}

impl<'a> Iterator for SectionIterator<'a, '_> {
  type Item = Result<Section<'a>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let remaining = self.body.len().saturating_sub(self.cursor);
    if remaining < SECTION_HEADER_SIZE {
      return None;
    }

    let record = &self.body[self.cursor..];
    // offsets are reported relative to the start of the file record.
    let file_offset = FFS_HEADER_SIZE + self.cursor;
    let size = read_u24_le(record, 1);
    if size < SECTION_HEADER_SIZE || size > remaining {
      self.done = true;
      return Some(Err(Error::MalformedSection { offset: file_offset, size }));
    }

    let result = Section::parse(&record[..size], file_offset, self.decompressor);
    if result.is_err() {
      self.done = true;
    }
    self.cursor += align_up(size, SECTION_ALIGNMENT);
    Some(result)
  }
}

#[cfg(test)]
mod unit_tests {
  use super::*;
  use crate::fw_fs::testing;

  /// Stand-in for the LZMA seam: inflates by repeating a marker byte.
  struct StubDecompressor {
    output: Vec<u8>,
  }

  impl Decompressor for StubDecompressor {
    fn decompress(&self, _compressed: &[u8]) -> Result<Vec<u8>, Error> {
      Ok(self.output.clone())
    }
  }

  struct FailingDecompressor;

  impl Decompressor for FailingDecompressor {
    fn decompress(&self, _compressed: &[u8]) -> Result<Vec<u8>, Error> {
      Err(Error::DecompressionFailed)
    }
  }

  fn sections_of<'a>(
    body: &'a [u8],
    decompressor: &dyn Decompressor,
  ) -> Vec<Result<Section<'a>, Error>> {
    SectionIterator::new(body, decompressor).collect()
  }

  #[test]
  fn leaf_section_exposes_raw_post_header_bytes() {
    let payload: Vec<u8> = (0u8..0x1C).collect();
    let body = testing::section_record(raw_type::PE32, &payload);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    let section = sections[0].as_ref().unwrap();
    assert_eq!(section.section_type(), SectionType::Pe32);
    assert_eq!(section.size(), 0x20);
    assert_eq!(section.payload(), &payload[..]);
    // the payload is a view into the input, not a copy.
    assert_eq!(section.payload().as_ptr(), body[4..].as_ptr());
  }

  #[test]
  fn attribute_byte_is_read_when_present() {
    let body = testing::section_record(raw_type::PIC, &[0xC3, 0x00, 0x00]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections[0].as_ref().unwrap().attributes(), 0xC3);

    // header-only section: no attribute byte to read.
    let body = testing::section_record(raw_type::PIC, &[]);
    let sections = sections_of(&body, &stub);
    assert_eq!(sections[0].as_ref().unwrap().attributes(), 0);
  }

  #[test]
  fn unknown_tags_are_not_errors_and_name_themselves_in_hex() {
    let body = testing::section_record(0x5B, &[1, 2, 3, 4]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    let section = sections[0].as_ref().unwrap();
    assert_eq!(section.section_type(), SectionType::Unknown(0x5B));
    assert_eq!(section.type_name(), "Sec5B");
    assert_eq!(section.payload(), &[1, 2, 3, 4]);
  }

  #[test]
  fn sections_follow_the_four_byte_stride() {
    // a 9-byte record strides to offset 12.
    let first = testing::section_record(raw_type::VERSION, &[0x31, 0x00, 0x2E, 0x00, 0x30]);
    let second = testing::section_record(0x19, &[0xEE]);
    let body = testing::section_stream(&[first, second]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].as_ref().unwrap().file_offset(), FFS_HEADER_SIZE);
    assert_eq!(sections[1].as_ref().unwrap().file_offset(), FFS_HEADER_SIZE + 12);
  }

  #[test]
  fn section_filling_the_body_exactly_is_accepted() {
    let body = testing::section_record(raw_type::PE32, &[0x42; 8]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].as_ref().unwrap().size(), body.len());
  }

  #[test]
  fn section_one_byte_past_the_body_is_rejected() {
    let mut body = testing::section_record(raw_type::PE32, &[0x42; 8]);
    let size = body.len() + 1;
    body[1..4].copy_from_slice(&[size as u8, (size >> 8) as u8, (size >> 16) as u8]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(matches!(
      sections[0],
      Err(Error::MalformedSection { offset, size }) if offset == FFS_HEADER_SIZE && size == 13
    ));
  }

  #[test]
  fn declared_size_below_the_header_is_rejected() {
    let mut body = testing::section_record(raw_type::PE32, &[0x42; 8]);
    body[1..4].copy_from_slice(&[3, 0, 0]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(matches!(sections[0], Err(Error::MalformedSection { size: 3, .. })));
  }

  #[test]
  fn stride_landing_on_the_body_end_ends_cleanly() {
    let body = testing::section_record(raw_type::PE32, &[0x42; 4]);
    assert_eq!(body.len() % SECTION_ALIGNMENT, 0);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(sections[0].is_ok());
  }

  #[test]
  fn fewer_than_four_trailing_bytes_end_iteration() {
    // a 9-byte record strides to offset 12; three loose bytes follow.
    let mut body = testing::section_record(raw_type::PE32, &[0x42; 5]);
    body.resize(12, 0x00);
    body.extend_from_slice(&[0x00; 3]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(sections[0].is_ok());
  }

  #[test]
  fn compression_section_exposes_decompressed_payload() {
    let inflated = vec![0x7E; 0x30];
    // algorithm 0x01, declared size 0x30, arbitrary stream bytes.
    let mut comp_body = vec![0x01, 0x30, 0x00, 0x00];
    comp_body.extend_from_slice(&[0xAA; 6]);
    let body = testing::section_record(raw_type::COMPRESSION, &comp_body);
    let stub = StubDecompressor { output: inflated.clone() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    let section = sections[0].as_ref().unwrap();
    assert_eq!(section.section_type(), SectionType::Compression);
    assert_eq!(section.payload(), &inflated[..]);
  }

  #[test]
  fn length_mismatch_is_non_fatal() {
    // declares 0x10 bytes but the stub inflates to 0x08.
    let mut comp_body = vec![0x01, 0x10, 0x00, 0x00];
    comp_body.extend_from_slice(&[0xAA; 6]);
    let body = testing::section_record(raw_type::COMPRESSION, &comp_body);
    let stub = StubDecompressor { output: vec![0x55; 8] };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].as_ref().unwrap().payload(), &[0x55; 8]);
  }

  #[test]
  fn unsupported_algorithm_is_rejected() {
    let mut comp_body = vec![0x02, 0x10, 0x00, 0x00];
    comp_body.extend_from_slice(&[0xAA; 6]);
    let body = testing::section_record(raw_type::COMPRESSION, &comp_body);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(matches!(
      sections[0],
      Err(Error::UnsupportedCompression { algorithm: 0x02, .. })
    ));
  }

  #[test]
  fn compression_body_smaller_than_its_header_is_malformed() {
    let body = testing::section_record(raw_type::COMPRESSION, &[0x01, 0x00]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 1);
    assert!(matches!(sections[0], Err(Error::MalformedSection { .. })));
  }

  #[test]
  fn decoder_failure_ends_the_walk() {
    let mut comp_body = vec![0x01, 0x10, 0x00, 0x00];
    comp_body.extend_from_slice(&[0xAA; 6]);
    let bad = testing::section_record(raw_type::COMPRESSION, &comp_body);
    let good = testing::section_record(raw_type::PE32, &[0x42; 4]);
    let body = testing::section_stream(&[bad, good]);
    let sections = sections_of(&body, &FailingDecompressor);
    assert_eq!(sections.len(), 1);
    assert!(matches!(sections[0], Err(Error::DecompressionFailed)));
  }

  #[test]
  fn error_after_good_sections_preserves_the_earlier_ones() {
    let good = testing::section_record(raw_type::PE32, &[0x42; 4]);
    let mut comp_body = vec![0x03, 0x10, 0x00, 0x00];
    comp_body.extend_from_slice(&[0xAA; 6]);
    let bad = testing::section_record(raw_type::COMPRESSION, &comp_body);
    let body = testing::section_stream(&[good, bad]);
    let stub = StubDecompressor { output: Vec::new() };
    let sections = sections_of(&body, &stub);
    assert_eq!(sections.len(), 2);
    assert!(sections[0].is_ok());
    assert!(matches!(sections[1], Err(Error::UnsupportedCompression { algorithm: 0x03, .. })));
  }
}
