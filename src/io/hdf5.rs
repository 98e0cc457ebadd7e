//! The HDF5 output collaborator: the `/0` group hierarchy, string
//! attributes, and the DATA / SwizzledData / Statistics datasets.
//!
//! All numeric datasets are written little-endian (native on every supported
//! target); string attributes are fixed-length 256-character scalars.

use std::path::Path;

use hdf5::types::{FixedAscii, H5Type};
use hdf5::{Dataset, Group};
use log::warn;
use ndarray::{s, ArrayView3, ArrayViewD, Axis, IxDyn};

use crate::{cube::CubeStats, dims::CubeDims, error::HdfConvertError};

/// Fixed capacity of every string attribute on the root group.
const FIXED_STRING_SIZE: usize = 256;

/// A freshly created output file with its `/0` root group.
pub struct OutputFile {
    _file: hdf5::File,
    root: Group,
}

impl OutputFile {
    /// Create (truncate) the output file and its root group.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputCreate`] if either fails.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, HdfConvertError> {
        let filename = path.as_ref().display().to_string();
        let file = hdf5::File::create(&path).map_err(|hdf5_error| {
            HdfConvertError::OutputCreate {
                filename: filename.clone(),
                hdf5_error,
            }
        })?;
        let root = file
            .create_group("0")
            .map_err(|hdf5_error| HdfConvertError::OutputCreate {
                filename,
                hdf5_error,
            })?;
        Ok(Self { _file: file, root })
    }

    /// Write one scalar string attribute onto the root group.
    ///
    /// Values that cannot be represented as fixed-length ASCII are skipped
    /// with a warning rather than aborting the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputWrite`] if the attribute cannot be
    /// created.
    pub fn write_string_attribute(
        &self,
        name: &str,
        value: &str,
    ) -> Result<(), HdfConvertError> {
        let value = match FixedAscii::<FIXED_STRING_SIZE>::from_ascii(value) {
            Ok(value) => value,
            Err(error) => {
                warn!(
                    "Skipping attribute '{}' with unrepresentable value: {}",
                    name, error
                );
                return Ok(());
            }
        };
        self.root
            .new_attr::<FixedAscii<FIXED_STRING_SIZE>>()
            .create(name)?
            .write_scalar(&value)?;
        Ok(())
    }

    /// Create the DATA dataset and, for deep cubes, the
    /// `SwizzledData/ZYX[W]` dataset, so that per-polarization writes are
    /// incremental.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputWrite`] on failure.
    pub fn create_image_datasets(
        &self,
        dims: &CubeDims,
    ) -> Result<ImageDatasets, HdfConvertError> {
        let swizzled = if dims.has_depth() {
            let swizzled_group = self.root.create_group("SwizzledData")?;
            Some(create_dataset::<f32>(
                &swizzled_group,
                dims.swizzled_name(),
                &dims.swizzled_dims(),
            )?)
        } else {
            None
        };
        let data = create_dataset::<f32>(&self.root, "DATA", &dims.standard_dims())?;
        Ok(ImageDatasets {
            naxis: dims.naxis,
            data,
            swizzled,
        })
    }

    /// Create and fill the `Statistics` group.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputWrite`] on failure.
    pub fn write_statistics(
        &self,
        dims: &CubeDims,
        stats: &CubeStats,
    ) -> Result<(), HdfConvertError> {
        let stats_group = self.root.create_group("Statistics")?;

        let xy_group = stats_group.create_group("XY")?;
        let xy_stats_dims = dims.xy_stats_dims();
        write_dataset(&xy_group, "MIN", &xy_stats_dims, &stats.min_xy)?;
        write_dataset(&xy_group, "MAX", &xy_stats_dims, &stats.max_xy)?;
        write_dataset(&xy_group, "MEAN", &xy_stats_dims, &stats.mean_xy)?;
        write_dataset(&xy_group, "NAN_COUNT", &xy_stats_dims, &stats.nan_xy)?;
        write_dataset(
            &xy_group,
            "HISTOGRAM",
            &dims.xy_histogram_dims(),
            &stats.hist_xy,
        )?;

        if dims.has_depth() {
            let xyz_group = stats_group.create_group("XYZ")?;
            let xyz_stats_dims = dims.xyz_stats_dims();
            write_dataset(&xyz_group, "MIN", &xyz_stats_dims, &stats.min_xyz)?;
            write_dataset(&xyz_group, "MAX", &xyz_stats_dims, &stats.max_xyz)?;
            write_dataset(&xyz_group, "MEAN", &xyz_stats_dims, &stats.mean_xyz)?;
            write_dataset(&xyz_group, "NAN_COUNT", &xyz_stats_dims, &stats.nan_xyz)?;
            write_dataset(
                &xyz_group,
                "HISTOGRAM",
                &dims.xyz_histogram_dims(),
                &stats.hist_xyz,
            )?;

            let z_group = stats_group.create_group("Z")?;
            let z_stats_dims = dims.z_stats_dims();
            write_dataset(&z_group, "MIN", &z_stats_dims, &stats.min_z)?;
            write_dataset(&z_group, "MAX", &z_stats_dims, &stats.max_z)?;
            write_dataset(&z_group, "MEAN", &z_stats_dims, &stats.mean_z)?;
            write_dataset(&z_group, "NAN_COUNT", &z_stats_dims, &stats.nan_z)?;
        }
        Ok(())
    }
}

/// The pixel datasets created upfront and written one polarization at a
/// time.
pub struct ImageDatasets {
    naxis: usize,
    data: Dataset,
    swizzled: Option<Dataset>,
}

impl ImageDatasets {
    /// Write one polarization of the standard cube. For a 4-axis image this
    /// selects the hyperslab with the stokes axis fixed to `stokes`.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputWrite`] on failure.
    pub fn write_standard(
        &self,
        stokes: usize,
        cube: ArrayView3<f32>,
    ) -> Result<(), HdfConvertError> {
        match self.naxis {
            2 => self.data.write(cube.index_axis(Axis(0), 0))?,
            3 => self.data.write(cube)?,
            _ => self.data.write_slice(
                cube.insert_axis(Axis(0)),
                s![stokes..stokes + 1, .., .., ..],
            )?,
        }
        Ok(())
    }

    /// Write one polarization of the rotated cube. Must only be called for
    /// cubes with a spectral axis deeper than one plane.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutputWrite`] on failure.
    pub fn write_swizzled(
        &self,
        stokes: usize,
        rotated: ArrayView3<f32>,
    ) -> Result<(), HdfConvertError> {
        let swizzled = match &self.swizzled {
            Some(swizzled) => swizzled,
            None => {
                return Err(HdfConvertError::BadArrayShape {
                    argument: "rotated".to_string(),
                    function: "write_swizzled".to_string(),
                    expected: "a cube with depth > 1".to_string(),
                    received: "no swizzled dataset".to_string(),
                })
            }
        };
        if self.naxis == 4 {
            swizzled.write_slice(
                rotated.insert_axis(Axis(0)),
                s![stokes..stokes + 1, .., .., ..],
            )?;
        } else {
            swizzled.write(rotated)?;
        }
        Ok(())
    }
}

fn create_dataset<T: H5Type>(
    group: &Group,
    name: &str,
    dims: &[usize],
) -> Result<Dataset, HdfConvertError> {
    let dataset = if dims.is_empty() {
        group.new_dataset::<T>().create(name)?
    } else {
        group.new_dataset::<T>().shape(dims.to_vec()).create(name)?
    };
    Ok(dataset)
}

fn write_dataset<T: H5Type + Clone>(
    group: &Group,
    name: &str,
    dims: &[usize],
    data: &[T],
) -> Result<(), HdfConvertError> {
    let dataset = create_dataset::<T>(group, name, dims)?;
    if dims.is_empty() {
        let value = data.first().ok_or_else(|| HdfConvertError::BadArrayShape {
            argument: "data".to_string(),
            function: "write_dataset".to_string(),
            expected: "at least one element".to_string(),
            received: "0".to_string(),
        })?;
        dataset.write_scalar(value)?;
    } else {
        let view = ArrayViewD::from_shape(IxDyn(dims), data).map_err(|_| {
            HdfConvertError::BadArrayShape {
                argument: "data".to_string(),
                function: "write_dataset".to_string(),
                expected: format!("{:?}", dims),
                received: format!("len {}", data.len()),
            }
        })?;
        dataset.write(view)?;
    }
    Ok(())
}
