//! Convert FITS image cubes into IDIA-schema HDF5 files optimized for
//! interactive visualization.
//!
//! Alongside a copy of the pixel volume (`/0/DATA`), the converter writes a
//! spectrally-transposed copy (`/0/SwizzledData`) that accelerates Z-profile
//! reads, and precomputed per-slice, per-profile and whole-cube statistics
//! and histograms (`/0/Statistics`). All input header keywords are carried
//! over as string attributes on the root group.
//!
//! # Memory requirement
//!
//! The cube of one polarization is held fully in memory, twice when the
//! rotated copy is produced: peak usage is about `2 * depth * height * width
//! * 4` bytes, plus comparatively small statistics arrays. A 4096x4096x128
//! cube needs roughly 16 GiB.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use hdf_convert::convert;
//!
//! convert(Path::new("cube.fits"), Path::new("cube.hdf5"), false).unwrap();
//! ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use lazy_static::lazy_static;

pub mod cli;
pub mod convert;
pub mod cube;
pub mod dims;
pub mod error;
pub mod header;
pub mod io;

pub use crate::{convert::convert, dims::CubeDims, error::HdfConvertError};

lazy_static! {
    static ref DURATIONS: Mutex<HashMap<&'static str, Duration>> = Mutex::new(HashMap::new());
}

/// Add `duration` to the named phase total.
pub(crate) fn record_duration(name: &'static str, duration: Duration) {
    let mut durations = DURATIONS.lock().unwrap();
    *durations.entry(name).or_default() += duration;
}

/// Total wall-clock time spent in each named conversion phase so far.
pub fn get_durations() -> HashMap<&'static str, Duration> {
    DURATIONS.lock().unwrap().clone()
}
