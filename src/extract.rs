//! Artifact Extraction
//!
//! Drives the volume, file, and section decoders and hands each artifact to
//! a writer capability. Artifact names are derived deterministically from
//! position and kind, so repeated runs over the same input produce identical
//! output.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::{
  fs, io,
  path::PathBuf,
};

use log::{debug, error, info};

use crate::{error::Error, fw_fs::fv::FirmwareVolume};

/// Capability for writing extracted artifacts.
///
/// The extractor calls this once per artifact and holds no state across
/// calls.
pub trait ArtifactWriter {
  fn write(&mut self, relative_path: &str, payload: &[u8]) -> io::Result<()>;
}

/// Writes artifacts into a flat output directory.
pub struct DirWriter {
  root: PathBuf,
}

impl DirWriter {
  /// Creates the output directory if it does not exist.
  pub fn new(root: impl Into<PathBuf>) -> io::Result<DirWriter> {
    let root = root.into();
    fs::create_dir_all(&root)?;
    Ok(DirWriter { root })
  }
}

impl ArtifactWriter for DirWriter {
  fn write(&mut self, relative_path: &str, payload: &[u8]) -> io::Result<()> {
    fs::write(self.root.join(relative_path), payload)
  }
}

/// Extracts every artifact of a decoded volume through `writer`.
///
/// Emits the raw volume as `fv.bin`, each file record as
/// `file_<ii>_<guid>.ffs`, and each section payload as
/// `file_<ii>_sec_<jj>_<type_name>.bin`. A file or section decode error is
/// reported and ends that walk; artifacts already emitted are kept and
/// later files are still extracted where the file walk permits. Write
/// failures abort with [`Error::Io`].
pub fn extract(fv: &FirmwareVolume, writer: &mut dyn ArtifactWriter) -> Result<(), Error> {
  writer.write("fv.bin", fv.fv_bytes())?;
  info!("extracted fv.bin ({:#x} bytes)", fv.fv_bytes().len());

  for (index, file) in fv.files().enumerate() {
    let file = match file {
      Ok(file) => file,
      Err(err) => {
        error!("file walk stopped at file {index:02}: {err}");
        break;
      }
    };

    let file_artifact = format!("file_{index:02}_{}.ffs", file.name_string());
    writer.write(&file_artifact, file.raw())?;
    info!("extracted {file_artifact}");

    for (section_index, section) in file.sections().enumerate() {
      let section = match section {
        Ok(section) => section,
        Err(err) => {
          error!("section walk stopped in file {index:02}: {err}");
          break;
        }
      };

      let section_artifact =
        format!("file_{index:02}_sec_{section_index:02}_{}.bin", section.type_name());
      writer.write(&section_artifact, section.payload())?;
      debug!("extracted {section_artifact} ({:#x} bytes)", section.payload().len());
    }
  }

  info!("extraction complete");
  Ok(())
}
