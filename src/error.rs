//! Errors that can occur in hdf_convert

use thiserror::Error;

/// An enum of all the errors possible during a conversion
#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum HdfConvertError {
    /// Error when the input FITS file cannot be opened or read.
    #[error("Could not open FITS file {fits_filename}: {fits_error}")]
    InputOpen {
        /// The filename of the fits file
        fits_filename: String,
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
    },

    /// Error when the primary HDU holds anything other than FP32 pixels.
    #[error("Currently only supports FP32 files, got {image_type}")]
    UnsupportedPixelType {
        /// Display of the image type that was found instead
        image_type: String,
    },

    /// Error when the image has fewer than 2 or more than 4 axes.
    #[error("Currently only supports 2D, 3D and 4D cubes, got NAXIS = {naxis}")]
    UnsupportedRank {
        /// The number of axes in the primary HDU
        naxis: usize,
    },

    /// Error when a header record cannot be read from the input.
    #[error("Could not read header record {record_index}: {fits_error}")]
    HeaderRead {
        /// The 1-based index of the record that failed
        record_index: usize,
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
    },

    /// Error when the output file cannot be created.
    #[error("Could not create output file {filename}: {hdf5_error}")]
    OutputCreate {
        /// The filename of the output file
        filename: String,
        /// The [`hdf5::Error`]
        hdf5_error: hdf5::Error,
    },

    /// Error when writing a group, dataset or attribute to the output file.
    #[error("Could not write to output file: {0}")]
    OutputWrite(#[from] hdf5::Error),

    /// Error when the cube buffers cannot be allocated.
    #[error("Insufficient memory available; need {need_gib:.2} GiB for cube buffers")]
    OutOfMemory {
        /// The amount of memory we think we need
        need_gib: f64,
    },

    #[error("bad array shape supplied to argument {argument} of function {function}. expected {expected}, received {received}")]
    /// Error for bad array shape in provided argument
    BadArrayShape {
        /// The argument name within the function
        argument: String,
        /// The function name
        function: String,
        /// The expected shape
        expected: String,
        /// The shape that was received instead
        received: String,
    },

    #[error(transparent)]
    /// Error derived from [`fitsio::errors::Error`]
    FitsIO(#[from] fitsio::errors::Error),

    #[error(transparent)]
    /// Error derived from [`clap::Error`]
    ClapError(#[from] clap::Error),

    #[error(transparent)]
    /// Generic IO error
    IO(#[from] std::io::Error),
}
