//! UEFI Firmware Volume Unpacking
//!
//! Parses a UEFI Firmware Volume (FV) binary blob, walks the Firmware File
//! System (FFS) files inside it and the sections inside each file, and
//! extracts every artifact into a flat directory. LZMA compression sections
//! are decompressed transparently as they are decoded.
//!
//! ```no_run
//! use fv_unpack::{extract::{extract, DirWriter}, fw_fs::fv::FirmwareVolume};
//!
//! # fn main() -> Result<(), fv_unpack::Error> {
//! let data = std::fs::read("uefi_blob.bin")?;
//! let fv = FirmwareVolume::new(&data)?;
//! let mut writer = DirWriter::new("fv_out")?;
//! extract(&fv, &mut writer)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

pub mod address_helper;
pub mod error;
pub mod extract;
pub mod fw_fs;

pub use error::{Error, Result};
