//! Command Line Interface helpers for hdf_convert

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use clap::{arg, command, ValueHint::FilePath};

use crate::{convert::convert, error::HdfConvertError};

/// Parsed arguments for one conversion.
pub struct ConvertContext {
    /// Path of the input FITS file
    pub input: PathBuf,
    /// Path of the output HDF5 file
    pub output: PathBuf,
    /// Whether to draw progress bars during the statistics passes
    pub draw_progress: bool,
}

impl ConvertContext {
    /// Parse an argument iterator into a [`ConvertContext`].
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::ClapError`] on invalid arguments (including
    /// the help and version pseudo-errors).
    pub fn from_args<I, T>(args: I) -> Result<Self, HdfConvertError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        I: Debug,
    {
        let matches = command!()
            .arg(arg!(<input> "Path of the input FITS file").value_hint(FilePath))
            .arg(
                arg!([output] "Path of the output HDF5 file (derived from the input name when omitted)")
                    .value_hint(FilePath),
            )
            .arg(arg!(--"no-draw-progress" "do not draw progress bars"))
            .try_get_matches_from(args)?;

        let input = PathBuf::from(matches.value_of("input").expect("input is required"));
        let output = match matches.value_of("output") {
            Some(output) => PathBuf::from(output),
            None => derive_output_name(&input),
        };
        let draw_progress = !matches.is_present("no-draw-progress");
        Ok(Self {
            input,
            output,
            draw_progress,
        })
    }

    /// Run the conversion described by this context.
    ///
    /// # Errors
    ///
    /// See [`convert`].
    pub fn run(&self) -> Result<(), HdfConvertError> {
        convert(&self.input, &self.output, self.draw_progress)
    }
}

/// Derive the output filename from the input filename: a case-insensitive
/// trailing `.fits` is replaced with `.hdf5`; any other name gets `.hdf5`
/// appended.
pub fn derive_output_name(input: &Path) -> PathBuf {
    let name = input.as_os_str().to_string_lossy();
    let stem = if name.to_ascii_lowercase().ends_with(".fits") {
        &name[..name.len() - ".fits".len()]
    } else {
        &name[..]
    };
    PathBuf::from(format!("{}.hdf5", stem))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{derive_output_name, ConvertContext};

    #[test]
    fn test_derive_output_name_strips_fits_suffix() {
        assert_eq!(
            derive_output_name(Path::new("data/cube.fits")),
            Path::new("data/cube.hdf5")
        );
        assert_eq!(
            derive_output_name(Path::new("CUBE.FITS")),
            Path::new("CUBE.hdf5")
        );
    }

    #[test]
    fn test_derive_output_name_appends_otherwise() {
        assert_eq!(
            derive_output_name(Path::new("cube.dat")),
            Path::new("cube.dat.hdf5")
        );
        assert_eq!(
            derive_output_name(Path::new("cube.fits.gz")),
            Path::new("cube.fits.gz.hdf5")
        );
        // names merely containing the suffix letters are left alone
        assert_eq!(
            derive_output_name(Path::new("first_cut.txt")),
            Path::new("first_cut.txt.hdf5")
        );
    }

    #[test]
    fn test_from_args_explicit_output() {
        let ctx =
            ConvertContext::from_args(["hdf_convert", "in.fits", "out.hdf5"]).unwrap();
        assert_eq!(ctx.input, Path::new("in.fits"));
        assert_eq!(ctx.output, Path::new("out.hdf5"));
        assert!(ctx.draw_progress);
    }

    #[test]
    fn test_from_args_derived_output() {
        let ctx = ConvertContext::from_args(["hdf_convert", "in.fits"]).unwrap();
        assert_eq!(ctx.output, Path::new("in.hdf5"));
    }

    #[test]
    fn test_from_args_no_draw_progress() {
        let ctx =
            ConvertContext::from_args(["hdf_convert", "in.fits", "--no-draw-progress"]).unwrap();
        assert!(!ctx.draw_progress);
    }

    #[test]
    fn test_from_args_requires_input() {
        assert!(ConvertContext::from_args(["hdf_convert"]).is_err());
    }
}
