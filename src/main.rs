//! Firmware Volume Unpacking Tool
//!
//! Command-line front-end: reads a firmware volume blob and extracts its
//! files and sections into an output directory.
//!
//! ## License
//!
//! Copyright (C) Microsoft Corporation. All rights reserved.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

use std::{fs, io::Write, path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{LevelFilter, error};

use fv_unpack::{
  Error,
  extract::{DirWriter, extract},
  fw_fs::fv::FirmwareVolume,
};

/// Extract FFS files and sections from a UEFI firmware volume blob.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
  /// Path to the firmware volume blob.
  blob: PathBuf,

  /// Directory to write extracted artifacts.
  #[arg(short, long, default_value = "fv_out")]
  outdir: PathBuf,

  /// Enable debug-level diagnostics.
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> ExitCode {
  let args = Args::parse();

  let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
  env_logger::Builder::new()
    .filter_level(level)
    .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
    .init();

  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err @ Error::Io(_)) => {
      error!("{err}");
      ExitCode::from(2)
    }
    Err(err) => {
      error!("failed to parse firmware volume: {err}");
      ExitCode::FAILURE
    }
  }
}

fn run(args: &Args) -> Result<(), Error> {
  let data = fs::read(&args.blob)?;
  let fv = FirmwareVolume::new(&data)?;
  let mut writer = DirWriter::new(&args.outdir)?;
  extract(&fv, &mut writer)
}
