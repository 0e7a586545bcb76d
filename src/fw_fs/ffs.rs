//! Firmware File System (FFS) File Decoding
//!
//! Based on the Firmware File System definitions in the UEFI Platform
//! Initialization (PI) Specification, Volume 3.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

pub mod section;

use core::fmt;

use log::debug;
use r_efi::efi;
use uuid::Uuid;

use crate::{
  address_helper::align_up,
  error::Error,
  fw_fs::{
    ffs::section::{Decompressor, SectionIterator},
    lzma::LzmaDecompressor,
    read_guid, read_u24_le,
  },
};

/// Files are placed on 8-byte boundaries within the volume file area.
pub const FFS_FILE_ALIGNMENT: usize = 8;

/// Size of the fixed file header preceding the file body.
pub const FFS_HEADER_SIZE: usize = 24;

/// Byte offsets of the file header fields.
mod offset {
  pub const NAME: usize = 0x00;
  pub const TYPE: usize = 0x10;
  pub const ATTRIBUTES: usize = 0x11;
  pub const SIZE: usize = 0x12;
  pub const STATE: usize = 0x15;
}

/// One FFS file record, borrowing the volume buffer.
#[derive(Clone, Copy)]
pub struct File<'a> {
  raw: &'a [u8],
  fv_offset: usize,
  name: efi::Guid,
  file_type: u8,
  attributes: u8,
  state: u8,
}

impl<'a> File<'a> {
  /// `raw` must be exactly the declared file size; the iterator enforces this.
  fn new(raw: &'a [u8], fv_offset: usize) -> File<'a> {
    File {
      raw,
      fv_offset,
      name: read_guid(raw, offset::NAME),
      file_type: raw[offset::TYPE],
      attributes: raw[offset::ATTRIBUTES],
      state: raw[offset::STATE],
    }
  }

  /// Returns the GUID name of this file.
  pub fn name(&self) -> efi::Guid {
    self.name
  }

  /// Returns the file name in canonical 8-4-4-4-12 form, interpreting the
  /// on-disk bytes with the bytes_le convention.
  pub fn name_string(&self) -> String {
    Uuid::from_bytes_le(*self.name.as_bytes()).to_string()
  }

  /// Returns the raw file type tag.
  pub fn file_type_raw(&self) -> u8 {
    self.file_type
  }

  /// Returns the raw file attributes.
  pub fn attributes_raw(&self) -> u8 {
    self.attributes
  }

  /// Returns the raw file state flags.
  pub fn state_raw(&self) -> u8 {
    self.state
  }

  /// Returns the file size (including header).
  pub fn size(&self) -> usize {
    self.raw.len()
  }

  /// Returns the offset of this file record from the volume start.
  pub fn fv_offset(&self) -> usize {
    self.fv_offset
  }

  /// Returns the whole file record, header included.
  pub fn raw(&self) -> &'a [u8] {
    self.raw
  }

  /// Returns the file body (the bytes after the header).
  pub fn body(&self) -> &'a [u8] {
    &self.raw[FFS_HEADER_SIZE..]
  }

  /// Returns an iterator over the sections of the file body, decompressing
  /// LZMA compression sections as they are encountered.
  pub fn sections(&self) -> SectionIterator<'a, 'static> {
    static LZMA: LzmaDecompressor = LzmaDecompressor;
    SectionIterator::new(self.body(), &LZMA)
  }

  /// Returns an iterator over the sections of the file body, using the
  /// provided decompressor for compression sections.
  pub fn sections_with_decompressor<'d>(
    &self,
    decompressor: &'d dyn Decompressor,
  ) -> SectionIterator<'a, 'd> {
    SectionIterator::new(self.body(), decompressor)
  }
}

impl fmt::Debug for File<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "File @{:#x} type: {:#04x} name: {} size: {:#x}",
      self.fv_offset,
      self.file_type,
      self.name_string(),
      self.size()
    )
  }
}

/// Iterator over the file records of a volume file area.
///
/// Stops cleanly at the terminator record (zeroed GUID slot) or when fewer
/// bytes than a file header remain. A malformed record is yielded as an
/// error and ends the walk.
pub struct FileIterator<'a> {
  area: &'a [u8],
  area_base: usize,
  cursor: usize,
  done: bool,
}

impl<'a> FileIterator<'a> {
  /// `area_base` is the offset of the file area within the volume, used to
  /// report volume-relative offsets.
  pub(crate) fn new(area: &'a [u8], area_base: usize) -> FileIterator<'a> {
    FileIterator { area, area_base, cursor: 0, done: false }
  }
}

impl<'a> Iterator for FileIterator<'a> {
  type Item = Result<File<'a>, Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }
    let remaining = self.area.len().saturating_sub(self.cursor);
    if remaining < FFS_HEADER_SIZE {
      return None;
    }

    let record = &self.area[self.cursor..];
    // a zeroed GUID slot terminates the file area.
    if record[..16].iter().all(|&b| b == 0) {
      self.done = true;
      return None;
    }

    let fv_offset = self.area_base + self.cursor;
    let size = read_u24_le(record, offset::SIZE);
    if size < FFS_HEADER_SIZE {
      self.done = true;
      return Some(Err(Error::MalformedFfs { offset: fv_offset, size }));
    }
    if size > remaining {
      self.done = true;
      return Some(Err(Error::TruncatedFfs { offset: fv_offset, size }));
    }

    let file = File::new(&record[..size], fv_offset);
    debug!(
      "file @{:#x}: name={} type={:#04x} size={:#x}",
      fv_offset,
      file.name_string(),
      file.file_type_raw(),
      size
    );
    self.cursor += align_up(size, FFS_FILE_ALIGNMENT);
    Some(Ok(file))
  }
}
