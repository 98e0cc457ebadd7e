//! Resolving raw FITS axis lengths into the cube geometry and the shape of
//! every output dataset.

use crate::error::HdfConvertError;

/// The semantic shape of an input image cube.
///
/// FITS axis ordering is X (width, fastest), Y (height), Z (depth, spectral),
/// then polarization. The depth axis exists in the output only when the input
/// has at least 3 axes, and the polarization axis only when it has 4; axes that
/// are absent from the input must be absent from the output datasets to
/// preserve rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeDims {
    /// Number of axes in the input image (2, 3 or 4)
    pub naxis: usize,
    /// NAXIS1, the fastest-varying axis
    pub width: usize,
    /// NAXIS2
    pub height: usize,
    /// NAXIS3, or 1 for 2D images
    pub depth: usize,
    /// NAXIS4, or 1 below 4 axes
    pub stokes: usize,
}

impl CubeDims {
    /// Resolve raw axis lengths `[NAXIS1, NAXIS2, ...]` into a [`CubeDims`].
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::UnsupportedRank`] unless 2 to 4 axes are
    /// given.
    pub fn from_fits_axes(axes: &[usize]) -> Result<Self, HdfConvertError> {
        let naxis = axes.len();
        if !(2..=4).contains(&naxis) {
            return Err(HdfConvertError::UnsupportedRank { naxis });
        }
        Ok(Self {
            naxis,
            width: axes[0],
            height: axes[1],
            depth: if naxis >= 3 { axes[2] } else { 1 },
            stokes: if naxis == 4 { axes[3] } else { 1 },
        })
    }

    /// Number of pixels in one XY slice.
    pub fn slice_size(&self) -> usize {
        self.height * self.width
    }

    /// Number of pixels in one polarization cube.
    pub fn cube_size(&self) -> usize {
        self.depth * self.height * self.width
    }

    /// Histogram bin count, shared between the XY and XYZ histograms.
    pub fn num_bins(&self) -> usize {
        ((self.width * self.height) as f64).sqrt().round() as usize
    }

    /// Whether the spectral axis is deep enough to warrant the rotated cube
    /// and the Z/XYZ statistics.
    pub fn has_depth(&self) -> bool {
        self.depth > 1
    }

    /// Name of the rotated dataset under `SwizzledData`.
    pub fn swizzled_name(&self) -> &'static str {
        if self.naxis == 3 {
            "ZYX"
        } else {
            "ZYXW"
        }
    }

    fn with_outer_axes(&self, mut dims: Vec<usize>, depth_axis: bool) -> Vec<usize> {
        if depth_axis && self.naxis >= 3 {
            dims.insert(0, self.depth);
        }
        if self.naxis == 4 {
            dims.insert(0, self.stokes);
        }
        dims
    }

    /// Shape of the `DATA` dataset: `[S?, D?, H, W]`.
    pub fn standard_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![self.height, self.width], true)
    }

    /// Shape of the rotated dataset: `[S?, W, H, D]`.
    pub fn swizzled_dims(&self) -> Vec<usize> {
        let mut dims = vec![self.width, self.height];
        if self.naxis >= 3 {
            dims.push(self.depth);
        }
        if self.naxis == 4 {
            dims.insert(0, self.stokes);
        }
        dims
    }

    /// Shape of the XY statistics datasets: `[S?, D?]`.
    pub fn xy_stats_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![], true)
    }

    /// Shape of the XY histogram dataset: `[S?, D?, B]`.
    pub fn xy_histogram_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![self.num_bins()], true)
    }

    /// Shape of the Z statistics datasets: `[S?, H, W]`.
    pub fn z_stats_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![self.height, self.width], false)
    }

    /// Shape of the XYZ statistics datasets: `[S?]`.
    pub fn xyz_stats_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![], false)
    }

    /// Shape of the XYZ histogram dataset: `[S?, B]`.
    pub fn xyz_histogram_dims(&self) -> Vec<usize> {
        self.with_outer_axes(vec![self.num_bins()], false)
    }
}

#[cfg(test)]
mod tests {
    use super::CubeDims;
    use crate::error::HdfConvertError;

    #[test]
    fn test_from_fits_axes_2d() {
        let dims = CubeDims::from_fits_axes(&[4, 5]).unwrap();
        assert_eq!(dims.width, 4);
        assert_eq!(dims.height, 5);
        assert_eq!(dims.depth, 1);
        assert_eq!(dims.stokes, 1);
        assert!(!dims.has_depth());
        assert_eq!(dims.standard_dims(), vec![5, 4]);
        assert_eq!(dims.swizzled_dims(), vec![4, 5]);
        assert_eq!(dims.xy_stats_dims(), Vec::<usize>::new());
        assert_eq!(dims.xy_histogram_dims(), vec![dims.num_bins()]);
    }

    #[test]
    fn test_from_fits_axes_3d() {
        let dims = CubeDims::from_fits_axes(&[4, 5, 6]).unwrap();
        assert_eq!(dims.depth, 6);
        assert_eq!(dims.stokes, 1);
        assert_eq!(dims.standard_dims(), vec![6, 5, 4]);
        assert_eq!(dims.swizzled_dims(), vec![4, 5, 6]);
        assert_eq!(dims.xy_stats_dims(), vec![6]);
        assert_eq!(dims.xy_histogram_dims(), vec![6, dims.num_bins()]);
        assert_eq!(dims.z_stats_dims(), vec![5, 4]);
        assert_eq!(dims.xyz_stats_dims(), Vec::<usize>::new());
        assert_eq!(dims.xyz_histogram_dims(), vec![dims.num_bins()]);
        assert_eq!(dims.swizzled_name(), "ZYX");
    }

    #[test]
    fn test_from_fits_axes_4d() {
        let dims = CubeDims::from_fits_axes(&[4, 5, 6, 2]).unwrap();
        assert_eq!(dims.stokes, 2);
        assert_eq!(dims.standard_dims(), vec![2, 6, 5, 4]);
        assert_eq!(dims.swizzled_dims(), vec![2, 4, 5, 6]);
        assert_eq!(dims.xy_stats_dims(), vec![2, 6]);
        assert_eq!(dims.xy_histogram_dims(), vec![2, 6, dims.num_bins()]);
        assert_eq!(dims.z_stats_dims(), vec![2, 5, 4]);
        assert_eq!(dims.xyz_stats_dims(), vec![2]);
        assert_eq!(dims.xyz_histogram_dims(), vec![2, dims.num_bins()]);
        assert_eq!(dims.swizzled_name(), "ZYXW");
    }

    #[test]
    fn test_degenerate_depth_has_no_swizzle() {
        // a 3D cube with a single plane keeps its rank but gets no rotated copy
        let dims = CubeDims::from_fits_axes(&[4, 5, 1]).unwrap();
        assert!(!dims.has_depth());
        assert_eq!(dims.standard_dims(), vec![1, 5, 4]);
        assert_eq!(dims.xy_stats_dims(), vec![1]);
    }

    #[test]
    fn test_unsupported_rank() {
        assert!(matches!(
            CubeDims::from_fits_axes(&[4]),
            Err(HdfConvertError::UnsupportedRank { naxis: 1 })
        ));
        assert!(matches!(
            CubeDims::from_fits_axes(&[4, 5, 6, 2, 3]),
            Err(HdfConvertError::UnsupportedRank { naxis: 5 })
        ));
    }

    #[test]
    fn test_num_bins_rounds_sqrt() {
        assert_eq!(CubeDims::from_fits_axes(&[4, 4]).unwrap().num_bins(), 4);
        assert_eq!(CubeDims::from_fits_axes(&[100, 100]).unwrap().num_bins(), 100);
        // sqrt(12) = 3.46... rounds to 3
        assert_eq!(CubeDims::from_fits_axes(&[4, 3]).unwrap().num_bins(), 3);
        // sqrt(8) = 2.83... rounds to 3
        assert_eq!(CubeDims::from_fits_axes(&[4, 2]).unwrap().num_bins(), 3);
    }
}
