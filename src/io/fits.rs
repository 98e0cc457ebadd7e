//! The FITS input collaborator: a block-pixel source with a header-record
//! iterator, built on cfitsio.
//!
//! The crate-level `fitsio` API covers opening, HDU inspection and keyword
//! reads; raw header-record iteration and bulk pixel reads go through
//! `fitsio_sys` directly, checked with [`fitsio::errors::check_status`].

use std::os::raw::{c_char, c_int, c_long};
use std::path::Path;

use fitsio::{hdu::HduInfo, images::ImageType, FitsFile};

use crate::{dims::CubeDims, error::HdfConvertError};

/// cfitsio's FLEN_CARD: an 80 character record plus the terminating NUL.
const FLEN_CARD: usize = 81;

/// An open FITS image validated to be a 2–4 axis FP32 cube.
pub struct FitsReader {
    fits: FitsFile,
    dims: CubeDims,
    filename: String,
}

impl FitsReader {
    /// Open a FITS file and validate the primary HDU.
    ///
    /// # Errors
    ///
    /// - [`HdfConvertError::InputOpen`] if the file cannot be opened or its
    ///   keywords cannot be read.
    /// - [`HdfConvertError::UnsupportedPixelType`] unless the image holds
    ///   FP32 pixels (BITPIX = -32).
    /// - [`HdfConvertError::UnsupportedRank`] unless the image has 2 to 4
    ///   axes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HdfConvertError> {
        let filename = path.as_ref().display().to_string();
        let input_open = |fits_error| HdfConvertError::InputOpen {
            fits_filename: filename.clone(),
            fits_error,
        };

        let mut fits = FitsFile::open(&path).map_err(input_open)?;
        let hdu = fits.primary_hdu().map_err(input_open)?;

        match &hdu.info {
            HduInfo::ImageInfo {
                image_type: ImageType::Float,
                ..
            } => {}
            HduInfo::ImageInfo { image_type, .. } => {
                return Err(HdfConvertError::UnsupportedPixelType {
                    image_type: format!("{:?}", image_type),
                })
            }
            _ => {
                return Err(HdfConvertError::UnsupportedPixelType {
                    image_type: "not an image".to_string(),
                })
            }
        }

        let naxis: i64 = hdu.read_key(&mut fits, "NAXIS").map_err(input_open)?;
        if !(2..=4).contains(&naxis) {
            return Err(HdfConvertError::UnsupportedRank {
                naxis: naxis.max(0) as usize,
            });
        }
        let mut axes = Vec::with_capacity(naxis as usize);
        for axis in 1..=naxis {
            let length: i64 = hdu
                .read_key(&mut fits, &format!("NAXIS{}", axis))
                .map_err(input_open)?;
            axes.push(length.max(0) as usize);
        }
        let dims = CubeDims::from_fits_axes(&axes)?;

        Ok(Self {
            fits,
            dims,
            filename,
        })
    }

    /// The validated cube geometry.
    pub fn dims(&self) -> &CubeDims {
        &self.dims
    }

    /// The filename this reader was opened with.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Number of records in the primary header.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::HeaderRead`] on cfitsio failure.
    pub fn num_header_records(&mut self) -> Result<usize, HdfConvertError> {
        let mut num_records: c_int = 0;
        let mut num_more: c_int = 0;
        let mut status = 0;
        unsafe {
            // ffghsp = fits_get_hdrspace
            fitsio_sys::ffghsp(
                self.fits.as_raw(), /* I - FITS file pointer         */
                &mut num_records,   /* O - number of existing records */
                &mut num_more,      /* O - remaining header space     */
                &mut status,        /* IO - error status              */
            );
        }
        fitsio::errors::check_status(status).map_err(|fits_error| HdfConvertError::HeaderRead {
            record_index: 0,
            fits_error,
        })?;
        Ok(num_records.max(0) as usize)
    }

    /// Read one raw 80-character header record. `record_index` is 1-based,
    /// following cfitsio.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::HeaderRead`] on cfitsio failure.
    pub fn read_header_record(&mut self, record_index: usize) -> Result<String, HdfConvertError> {
        let mut card = [0_u8; FLEN_CARD];
        let mut status = 0;
        unsafe {
            // ffgrec = fits_read_record
            fitsio_sys::ffgrec(
                self.fits.as_raw(),             /* I - FITS file pointer   */
                record_index as c_int,          /* I - 1-based record index */
                card.as_mut_ptr() as *mut c_char, /* O - the 80 char record */
                &mut status,                    /* IO - error status        */
            );
        }
        fitsio::errors::check_status(status).map_err(|fits_error| HdfConvertError::HeaderRead {
            record_index,
            fits_error,
        })?;
        let len = card.iter().position(|&byte| byte == 0).unwrap_or(card.len());
        Ok(String::from_utf8_lossy(&card[..len]).into_owned())
    }

    /// Read the whole cube of one polarization into `destination`, which must
    /// hold exactly `depth * height * width` elements. NaN pixels are
    /// delivered as stored.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::BadArrayShape`] if the destination length
    /// is wrong, or a cfitsio error if the read fails.
    pub fn read_stokes_cube(
        &mut self,
        stokes: usize,
        destination: &mut [f32],
    ) -> Result<(), HdfConvertError> {
        let cube_size = self.dims.cube_size();
        if destination.len() != cube_size {
            return Err(HdfConvertError::BadArrayShape {
                argument: "destination".to_string(),
                function: "read_stokes_cube".to_string(),
                expected: format!("{}", cube_size),
                received: format!("{}", destination.len()),
            });
        }
        let first_element = (stokes * cube_size + 1) as fitsio_sys::LONGLONG;
        let mut any_null: c_int = 0;
        let mut status = 0;
        unsafe {
            // ffgpve = fits_read_img for float data; a zero null value
            // disables null conversion so NaN pixels arrive untouched
            fitsio_sys::ffgpve(
                self.fits.as_raw(),               /* I - FITS file pointer      */
                1 as c_long,                      /* I - group number           */
                first_element,                    /* I - 1-based first element  */
                cube_size as fitsio_sys::LONGLONG, /* I - number of elements    */
                0.0,                              /* I - null substitution value */
                destination.as_mut_ptr(),         /* O - destination array      */
                &mut any_null,                    /* O - any null values read?  */
                &mut status,                      /* IO - error status          */
            );
        }
        fitsio::errors::check_status(status)?;
        Ok(())
    }
}
