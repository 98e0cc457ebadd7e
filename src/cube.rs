//! Cube buffers, statistics accumulators, and the per-polarization
//! conversion passes.
//!
//! The three passes are fork-join data-parallel reductions over disjoint
//! index ranges: the slice pass over Z (fused with the transpose store), the
//! profile pass over (Y,X), and the histogram pass over Z. No locking is
//! required because every task owns a unique destination slab.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::izip;
use log::trace;
use ndarray::{parallel::prelude::*, Array3, Axis};
use rayon::prelude::*;

use crate::{dims::CubeDims, error::HdfConvertError};

/// The standard and rotated pixel buffers for one polarization at a time.
pub struct CubeBuffers {
    /// The cube as stored in the input, row-major (Z, Y, X).
    pub standard: Array3<f32>,
    /// The transposed cube, row-major (X, Y, Z). Allocated only when the
    /// spectral axis is deeper than one plane.
    pub rotated: Option<Array3<f32>>,
}

impl CubeBuffers {
    /// Allocate the cube buffers for the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutOfMemory`] if an allocation fails.
    pub fn allocate(dims: &CubeDims) -> Result<Self, HdfConvertError> {
        let standard = cube_array(
            (dims.depth, dims.height, dims.width),
            try_filled_vec(dims.cube_size(), 0.0_f32)?,
            "standard",
        )?;
        let rotated = if dims.has_depth() {
            Some(cube_array(
                (dims.width, dims.height, dims.depth),
                try_filled_vec(dims.cube_size(), 0.0_f32)?,
                "rotated",
            )?)
        } else {
            None
        };
        Ok(Self { standard, rotated })
    }

    /// Size in bytes of the buffers [`CubeBuffers::allocate`] will request.
    pub fn estimate_bytes(dims: &CubeDims) -> usize {
        let num_cubes = if dims.has_depth() { 2 } else { 1 };
        num_cubes * dims.cube_size() * std::mem::size_of::<f32>()
    }
}

/// Every statistics and histogram accumulator for a whole conversion.
///
/// The per-slice and per-profile arrays span all polarizations; the slice
/// passes fill the slab for one polarization at a time. The Z and XYZ arrays
/// are sized only when the spectral axis is deeper than one plane.
pub struct CubeStats {
    /// Shared bin count for the XY and XYZ histograms.
    pub num_bins: usize,
    /// Per-XY-slice minimum, `stokes * depth`.
    pub min_xy: Vec<f32>,
    /// Per-XY-slice maximum, `stokes * depth`.
    pub max_xy: Vec<f32>,
    /// Per-XY-slice mean over finite pixels, `stokes * depth`.
    pub mean_xy: Vec<f32>,
    /// Per-XY-slice NaN count, `stokes * depth`.
    pub nan_xy: Vec<i64>,
    /// Per-XY-slice histograms, `stokes * depth * num_bins`.
    pub hist_xy: Vec<i64>,
    /// Per-Z-profile minimum, `stokes * height * width`.
    pub min_z: Vec<f32>,
    /// Per-Z-profile maximum, `stokes * height * width`.
    pub max_z: Vec<f32>,
    /// Per-Z-profile mean over finite pixels, `stokes * height * width`.
    pub mean_z: Vec<f32>,
    /// Per-Z-profile NaN count, `stokes * height * width`.
    pub nan_z: Vec<i64>,
    /// Whole-cube minimum per polarization.
    pub min_xyz: Vec<f32>,
    /// Whole-cube maximum per polarization.
    pub max_xyz: Vec<f32>,
    /// Whole-cube mean per polarization.
    pub mean_xyz: Vec<f32>,
    /// Whole-cube NaN count per polarization.
    pub nan_xyz: Vec<i64>,
    /// Per-slice partial XYZ histograms, `stokes * depth * num_bins`,
    /// reduced into [`CubeStats::hist_xyz`] after all polarizations.
    pub partial_hist_xyz: Vec<i64>,
    /// Final XYZ histograms, `stokes * num_bins`.
    pub hist_xyz: Vec<i64>,
}

impl CubeStats {
    /// Allocate every accumulator for the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`HdfConvertError::OutOfMemory`] if an allocation fails.
    pub fn allocate(dims: &CubeDims) -> Result<Self, HdfConvertError> {
        let num_bins = dims.num_bins();
        let num_slices = dims.stokes * dims.depth;
        let num_profiles = if dims.has_depth() {
            dims.stokes * dims.slice_size()
        } else {
            0
        };
        let num_cubes = if dims.has_depth() { dims.stokes } else { 0 };
        Ok(Self {
            num_bins,
            min_xy: try_filled_vec(num_slices, 0.0)?,
            max_xy: try_filled_vec(num_slices, 0.0)?,
            mean_xy: try_filled_vec(num_slices, 0.0)?,
            nan_xy: try_filled_vec(num_slices, 0)?,
            hist_xy: try_filled_vec(num_slices * num_bins, 0)?,
            min_z: try_filled_vec(num_profiles, f32::MAX)?,
            max_z: try_filled_vec(num_profiles, -f32::MAX)?,
            mean_z: try_filled_vec(num_profiles, 0.0)?,
            nan_z: try_filled_vec(num_profiles, 0)?,
            min_xyz: try_filled_vec(num_cubes, 0.0)?,
            max_xyz: try_filled_vec(num_cubes, 0.0)?,
            mean_xyz: try_filled_vec(num_cubes, 0.0)?,
            nan_xyz: try_filled_vec(num_cubes, 0)?,
            partial_hist_xyz: try_filled_vec(num_cubes * dims.depth * num_bins, 0)?,
            hist_xyz: try_filled_vec(num_cubes * num_bins, 0)?,
        })
    }
}

/// Local NaN-safe accumulator for one XY slice or one spectral profile.
///
/// Extremes and the sum exclude NaN pixels; the sum accumulates in double
/// precision and is only narrowed to FP32 at publication.
#[derive(Clone, Copy)]
struct RunningStats {
    min: f32,
    max: f32,
    sum: f64,
    nan_count: i64,
}

impl RunningStats {
    fn new() -> Self {
        Self {
            min: f32::MAX,
            max: -f32::MAX,
            sum: 0.0,
            nan_count: 0,
        }
    }

    fn update(&mut self, value: f32) {
        if value.is_nan() {
            self.nan_count += 1;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.sum += f64::from(value);
        }
    }

    /// The (min, max, mean) triple for a run of `total` samples. All three
    /// are NaN when every sample was NaN.
    fn publish(&self, total: usize) -> (f32, f32, f32) {
        if self.nan_count == total as i64 {
            (f32::NAN, f32::NAN, f32::NAN)
        } else {
            let mean = self.sum / (total as i64 - self.nan_count) as f64;
            (self.min, self.max, mean as f32)
        }
    }
}

/// Reduce each XY slice of the standard cube in parallel, storing the
/// transposed cube at the same time.
///
/// The transpose store is unconditional: NaN pixels are copied as-is. Each
/// task owns one Z coordinate, so the writes into the rotated cube land in
/// disjoint positions.
pub fn collect_slice_stats(
    buffers: &mut CubeBuffers,
    stats: &mut CubeStats,
    dims: &CubeDims,
    stokes: usize,
    draw_progress: bool,
) {
    trace!("start collect_slice_stats for stokes {}", stokes);
    let slice_size = dims.slice_size();
    let progress = slice_progress_bar(dims.depth, "slice statistics", draw_progress);

    let per_slice: Vec<RunningStats> = match buffers.rotated.as_mut() {
        Some(rotated) => buffers
            .standard
            .outer_iter()
            .into_par_iter()
            .zip(rotated.axis_iter_mut(Axis(2)).into_par_iter())
            .map(|(slice, mut rotated_plane)| {
                let mut acc = RunningStats::new();
                for ((j, k), &value) in slice.indexed_iter() {
                    rotated_plane[[k, j]] = value;
                    acc.update(value);
                }
                progress.inc(1);
                acc
            })
            .collect(),
        None => buffers
            .standard
            .outer_iter()
            .into_par_iter()
            .map(|slice| {
                let mut acc = RunningStats::new();
                for &value in slice.iter() {
                    acc.update(value);
                }
                progress.inc(1);
                acc
            })
            .collect(),
    };
    progress.finish_and_clear();

    let offset = stokes * dims.depth;
    for (acc, min, max, mean, nan) in izip!(
        &per_slice,
        &mut stats.min_xy[offset..offset + dims.depth],
        &mut stats.max_xy[offset..offset + dims.depth],
        &mut stats.mean_xy[offset..offset + dims.depth],
        &mut stats.nan_xy[offset..offset + dims.depth],
    ) {
        let (slice_min, slice_max, slice_mean) = acc.publish(slice_size);
        *min = slice_min;
        *max = slice_max;
        *mean = slice_mean;
        *nan = acc.nan_count;
    }
    trace!("end collect_slice_stats for stokes {}", stokes);
}

/// Consolidate the XY slice statistics of one polarization into its XYZ
/// statistics.
///
/// The extremes are seeded from slice 0 even when that slice is all NaN; the
/// NaN-ignoring `min`/`max` heals the seed as soon as a finite slice is
/// folded in. Slice means are weighted by their finite-pixel count. The mean
/// is left 0 when the whole cube is NaN.
pub fn consolidate_xyz_stats(stats: &mut CubeStats, dims: &CubeDims, stokes: usize) {
    let offset = stokes * dims.depth;
    let slice_size = dims.slice_size();
    let cube_size = dims.cube_size();

    let mut xyz_min = f64::from(stats.min_xy[offset]);
    let mut xyz_max = f64::from(stats.max_xy[offset]);
    let mut xyz_sum = 0.0_f64;
    let mut xyz_nan_count = 0_i64;

    for (min, max, mean, nan) in izip!(
        &stats.min_xy[offset..offset + dims.depth],
        &stats.max_xy[offset..offset + dims.depth],
        &stats.mean_xy[offset..offset + dims.depth],
        &stats.nan_xy[offset..offset + dims.depth],
    ) {
        if !mean.is_nan() {
            xyz_sum += f64::from(*mean) * (slice_size as i64 - nan) as f64;
            xyz_min = xyz_min.min(f64::from(*min));
            xyz_max = xyz_max.max(f64::from(*max));
        }
        xyz_nan_count += nan;
    }

    stats.min_xyz[stokes] = xyz_min as f32;
    stats.max_xyz[stokes] = xyz_max as f32;
    stats.nan_xyz[stokes] = xyz_nan_count;
    if xyz_nan_count != cube_size as i64 {
        stats.mean_xyz[stokes] = (xyz_sum / (cube_size as i64 - xyz_nan_count) as f64) as f32;
    }
}

/// Reduce each spectral profile of the standard cube in parallel.
///
/// Lanes along the Z axis iterate the (Y,X) positions in row-major order, so
/// each task publishes to the unique index `y * width + x`. Profiles that are
/// entirely NaN publish NaN extremes and mean.
pub fn collect_profile_stats(
    buffers: &CubeBuffers,
    stats: &mut CubeStats,
    dims: &CubeDims,
    stokes: usize,
) {
    trace!("start collect_profile_stats for stokes {}", stokes);
    let per_profile: Vec<RunningStats> = buffers
        .standard
        .lanes(Axis(0))
        .into_par_iter()
        .map(|profile| {
            let mut acc = RunningStats::new();
            for &value in profile.iter() {
                acc.update(value);
            }
            acc
        })
        .collect();

    let offset = stokes * dims.slice_size();
    for (acc, min, max, mean, nan) in izip!(
        &per_profile,
        &mut stats.min_z[offset..offset + dims.slice_size()],
        &mut stats.max_z[offset..offset + dims.slice_size()],
        &mut stats.mean_z[offset..offset + dims.slice_size()],
        &mut stats.nan_z[offset..offset + dims.slice_size()],
    ) {
        let (profile_min, profile_max, profile_mean) = acc.publish(dims.depth);
        *min = profile_min;
        *max = profile_max;
        *mean = profile_mean;
        *nan = acc.nan_count;
    }
    trace!("end collect_profile_stats for stokes {}", stokes);
}

/// Fill the per-slice XY histograms and, when the cube is deep, the per-slice
/// partial XYZ histograms in a single parallel sweep over Z.
///
/// Bin edges for the XY binning come from the slice's own extremes; the XYZ
/// binning shares the whole-cube extremes from [`consolidate_xyz_stats`]. A
/// slice whose extremes are NaN or whose range is zero contributes to neither
/// binning and its histogram rows stay zero.
pub fn collect_histograms(
    buffers: &CubeBuffers,
    stats: &mut CubeStats,
    dims: &CubeDims,
    stokes: usize,
    draw_progress: bool,
) {
    trace!("start collect_histograms for stokes {}", stokes);
    let num_bins = stats.num_bins;
    let depth = dims.depth;
    let stats_offset = stokes * depth;
    let hist_offset = stokes * depth * num_bins;

    let min_xy = &stats.min_xy[stats_offset..stats_offset + depth];
    let max_xy = &stats.max_xy[stats_offset..stats_offset + depth];
    let hist_xy = &mut stats.hist_xy[hist_offset..hist_offset + depth * num_bins];
    let progress = slice_progress_bar(depth, "histograms", draw_progress);

    if dims.has_depth() {
        let cube_min = f64::from(stats.min_xyz[stokes]);
        let cube_range = f64::from(stats.max_xyz[stokes]) - cube_min;
        let partial =
            &mut stats.partial_hist_xyz[hist_offset..hist_offset + depth * num_bins];

        buffers
            .standard
            .outer_iter()
            .into_par_iter()
            .zip(hist_xy.par_chunks_exact_mut(num_bins))
            .zip(partial.par_chunks_exact_mut(num_bins))
            .enumerate()
            .for_each(|(i, ((slice, xy_bins), xyz_bins))| {
                let slice_min = f64::from(min_xy[i]);
                let slice_max = f64::from(max_xy[i]);
                let range = slice_max - slice_min;
                if slice_min.is_nan() || slice_max.is_nan() || range == 0.0 {
                    progress.inc(1);
                    return;
                }
                for &value in slice.iter() {
                    if value.is_nan() {
                        continue;
                    }
                    increment_bin(xy_bins, f64::from(value), slice_min, range);
                    increment_bin(xyz_bins, f64::from(value), cube_min, cube_range);
                }
                progress.inc(1);
            });
    } else {
        buffers
            .standard
            .outer_iter()
            .into_par_iter()
            .zip(hist_xy.par_chunks_exact_mut(num_bins))
            .enumerate()
            .for_each(|(i, (slice, xy_bins))| {
                let slice_min = f64::from(min_xy[i]);
                let slice_max = f64::from(max_xy[i]);
                let range = slice_max - slice_min;
                if slice_min.is_nan() || slice_max.is_nan() || range == 0.0 {
                    progress.inc(1);
                    return;
                }
                for &value in slice.iter() {
                    if value.is_nan() {
                        continue;
                    }
                    increment_bin(xy_bins, f64::from(value), slice_min, range);
                }
                progress.inc(1);
            });
    }
    progress.finish_and_clear();
    trace!("end collect_histograms for stokes {}", stokes);
}

/// Sum the per-slice partial XYZ histograms into the final per-polarization
/// XYZ histograms. Runs serially after every polarization has been processed.
pub fn consolidate_xyz_histograms(stats: &mut CubeStats, dims: &CubeDims) {
    let num_bins = stats.num_bins;
    let per_stokes = dims.depth * num_bins;
    for (stokes, partial) in stats.partial_hist_xyz.chunks_exact(per_stokes).enumerate() {
        let total = &mut stats.hist_xyz[stokes * num_bins..(stokes + 1) * num_bins];
        for partial_bins in partial.chunks_exact(num_bins) {
            for (total_bin, partial_bin) in total.iter_mut().zip(partial_bins) {
                *total_bin += partial_bin;
            }
        }
    }
}

/// The final-bin clamp keeps a pixel equal to the binning maximum in the last
/// bin instead of one past it.
fn increment_bin(bins: &mut [i64], value: f64, lo: f64, range: f64) {
    let bin_index = ((bins.len() as f64) * (value - lo) / range) as usize;
    bins[bin_index.min(bins.len() - 1)] += 1;
}

fn slice_progress_bar(len: usize, message: &'static str, draw_progress: bool) -> ProgressBar {
    let draw_target = if draw_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let progress = ProgressBar::with_draw_target(len as u64, draw_target);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})")
            .progress_chars("=> "),
    );
    progress.set_message(message);
    progress
}

fn try_filled_vec<T: Clone>(len: usize, fill: T) -> Result<Vec<T>, HdfConvertError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| HdfConvertError::OutOfMemory {
            need_gib: (len * std::mem::size_of::<T>()) as f64 / 1024.0_f64.powi(3),
        })?;
    values.resize(len, fill);
    Ok(values)
}

fn cube_array(
    shape: (usize, usize, usize),
    data: Vec<f32>,
    argument: &str,
) -> Result<Array3<f32>, HdfConvertError> {
    let received = format!("len {}", data.len());
    Array3::from_shape_vec(shape, data).map_err(|_| HdfConvertError::BadArrayShape {
        argument: argument.to_string(),
        function: "cube_array".to_string(),
        expected: format!("{:?}", shape),
        received,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    use super::{
        collect_histograms, collect_profile_stats, collect_slice_stats, consolidate_xyz_histograms,
        consolidate_xyz_stats, CubeBuffers, CubeStats,
    };
    use crate::dims::CubeDims;

    /// The 2x2x2 cube `[[[1,2],[3,4]],[[5,6],[7,NaN]]]` in file order.
    fn example_cube() -> (CubeDims, CubeBuffers) {
        let dims = CubeDims::from_fits_axes(&[2, 2, 2]).unwrap();
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, f32::NAN];
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((2, 2, 2), values).unwrap();
        (dims, buffers)
    }

    fn run_all_passes(dims: &CubeDims, buffers: &mut CubeBuffers, stats: &mut CubeStats) {
        for stokes in 0..dims.stokes {
            collect_slice_stats(buffers, stats, dims, stokes, false);
            if dims.has_depth() {
                consolidate_xyz_stats(stats, dims, stokes);
                collect_profile_stats(buffers, stats, dims, stokes);
            }
            collect_histograms(buffers, stats, dims, stokes, false);
        }
        if dims.has_depth() {
            consolidate_xyz_histograms(stats, dims);
        }
    }

    #[test]
    fn test_slice_stats_with_nan() {
        let (dims, mut buffers) = example_cube();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        collect_slice_stats(&mut buffers, &mut stats, &dims, 0, false);

        assert_eq!(stats.min_xy, vec![1.0, 5.0]);
        assert_eq!(stats.max_xy, vec![4.0, 7.0]);
        assert_abs_diff_eq!(stats.mean_xy[0], 2.5);
        assert_abs_diff_eq!(stats.mean_xy[1], 6.0);
        assert_eq!(stats.nan_xy, vec![0, 1]);
    }

    #[test]
    fn test_transpose_bijection() {
        let (dims, mut buffers) = example_cube();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        collect_slice_stats(&mut buffers, &mut stats, &dims, 0, false);

        let rotated = buffers.rotated.as_ref().unwrap();
        assert_abs_diff_eq!(rotated[[0, 0, 0]], 1.0);
        assert!(rotated[[1, 1, 1]].is_nan());
        for i in 0..dims.depth {
            for j in 0..dims.height {
                for k in 0..dims.width {
                    let standard = buffers.standard[[i, j, k]];
                    let transposed = rotated[[k, j, i]];
                    assert!(
                        standard == transposed || (standard.is_nan() && transposed.is_nan()),
                        "mismatch at ({}, {}, {})",
                        i,
                        j,
                        k
                    );
                }
            }
        }
    }

    #[test]
    fn test_xyz_consolidation() {
        let (dims, mut buffers) = example_cube();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        collect_slice_stats(&mut buffers, &mut stats, &dims, 0, false);
        consolidate_xyz_stats(&mut stats, &dims, 0);

        assert_eq!(stats.min_xyz[0], 1.0);
        assert_eq!(stats.max_xyz[0], 7.0);
        assert_eq!(stats.nan_xyz[0], 1);
        // (2.5 * 4 + 6.0 * 3) / 7 = 28 / 7
        assert_abs_diff_eq!(stats.mean_xyz[0], 4.0);
    }

    #[test]
    fn test_profile_stats() {
        let (dims, mut buffers) = example_cube();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        collect_slice_stats(&mut buffers, &mut stats, &dims, 0, false);
        collect_profile_stats(&buffers, &mut stats, &dims, 0);

        // profile (y=0, x=0) sweeps 1 and 5
        assert_eq!(stats.min_z[0], 1.0);
        assert_eq!(stats.max_z[0], 5.0);
        assert_abs_diff_eq!(stats.mean_z[0], 3.0);
        assert_eq!(stats.nan_z[0], 0);
        // profile (y=1, x=1) sweeps 4 and NaN
        assert_eq!(stats.min_z[3], 4.0);
        assert_eq!(stats.max_z[3], 4.0);
        assert_abs_diff_eq!(stats.mean_z[3], 4.0);
        assert_eq!(stats.nan_z[3], 1);
    }

    #[test]
    fn test_all_nan_slice() {
        let dims = CubeDims::from_fits_axes(&[3, 3, 3]).unwrap();
        let mut values = vec![1.0_f32; 27];
        for value in values.iter_mut().take(18).skip(9) {
            *value = f32::NAN;
        }
        values[0] = 0.0;
        values[26] = 2.0;
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((3, 3, 3), values).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        run_all_passes(&dims, &mut buffers, &mut stats);

        assert!(stats.min_xy[1].is_nan());
        assert!(stats.max_xy[1].is_nan());
        assert!(stats.mean_xy[1].is_nan());
        assert_eq!(stats.nan_xy[1], 9);

        // XYZ stats ignore the all-NaN slice
        assert_eq!(stats.min_xyz[0], 0.0);
        assert_eq!(stats.max_xyz[0], 2.0);
        assert_eq!(stats.nan_xyz[0], 9);

        // every profile crosses the NaN plane exactly once
        assert!(stats.nan_z.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_all_nan_profile_publishes_nan() {
        let dims = CubeDims::from_fits_axes(&[2, 2, 2]).unwrap();
        let values = vec![f32::NAN, 2.0, 3.0, 4.0, f32::NAN, 6.0, 7.0, 8.0];
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((2, 2, 2), values).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        collect_slice_stats(&mut buffers, &mut stats, &dims, 0, false);
        collect_profile_stats(&buffers, &mut stats, &dims, 0);

        assert!(stats.min_z[0].is_nan());
        assert!(stats.max_z[0].is_nan());
        assert!(stats.mean_z[0].is_nan());
        assert_eq!(stats.nan_z[0], 2);
        assert_eq!(stats.nan_z[1], 0);
    }

    #[test]
    fn test_histogram_conservation() {
        let (dims, mut buffers) = example_cube();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        run_all_passes(&dims, &mut buffers, &mut stats);

        let num_bins = stats.num_bins;
        assert_eq!(num_bins, 2);
        // each non-degenerate slice bins its finite pixels
        for i in 0..dims.depth {
            let total: i64 = stats.hist_xy[i * num_bins..(i + 1) * num_bins].iter().sum();
            assert_eq!(
                total,
                dims.slice_size() as i64 - stats.nan_xy[i],
                "slice {}",
                i
            );
        }
        // the reduced XYZ histogram sees every finite pixel of the cube
        let total_xyz: i64 = stats.hist_xyz.iter().sum();
        assert_eq!(total_xyz, dims.cube_size() as i64 - stats.nan_xyz[0]);
    }

    #[test]
    fn test_histogram_degenerate_slice_stays_zero() {
        let dims = CubeDims::from_fits_axes(&[2, 2]).unwrap();
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((1, 2, 2), vec![5.0; 4]).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        run_all_passes(&dims, &mut buffers, &mut stats);

        assert_eq!(stats.min_xy[0], 5.0);
        assert_eq!(stats.max_xy[0], 5.0);
        assert!(stats.hist_xy.iter().all(|&count| count == 0));
    }

    #[test]
    fn test_histogram_max_value_lands_in_last_bin() {
        let dims = CubeDims::from_fits_axes(&[4, 4]).unwrap();
        let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((1, 4, 4), values).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        run_all_passes(&dims, &mut buffers, &mut stats);

        assert_eq!(stats.num_bins, 4);
        let total: i64 = stats.hist_xy.iter().sum();
        assert_eq!(total, 16);
        // v == max would floor into bin 4 without the clamp
        assert_eq!(stats.hist_xy, vec![4, 4, 4, 4]);
    }

    #[test]
    fn test_four_dimensional_constant_polarizations() {
        let dims = CubeDims::from_fits_axes(&[2, 2, 2, 2]).unwrap();
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        for (stokes, fill) in [3.0_f32, 7.0].iter().enumerate() {
            buffers.standard.fill(*fill);
            collect_slice_stats(&mut buffers, &mut stats, &dims, stokes, false);
            consolidate_xyz_stats(&mut stats, &dims, stokes);
            collect_profile_stats(&buffers, &mut stats, &dims, stokes);
            collect_histograms(&buffers, &mut stats, &dims, stokes, false);
        }
        consolidate_xyz_histograms(&mut stats, &dims);

        assert_eq!(stats.min_xyz, vec![3.0, 7.0]);
        assert_eq!(stats.max_xyz, vec![3.0, 7.0]);
        assert_eq!(stats.mean_xyz, vec![3.0, 7.0]);
        assert_eq!(stats.nan_xyz, vec![0, 0]);
        assert_eq!(stats.min_xy, vec![3.0, 3.0, 7.0, 7.0]);
        // constant slices are degenerate, so every histogram stays empty
        assert!(stats.hist_xy.iter().all(|&count| count == 0));
        assert!(stats.hist_xyz.iter().all(|&count| count == 0));
    }

    #[test]
    fn test_uniform_histogram_is_flat() {
        let dims = CubeDims::from_fits_axes(&[100, 100]).unwrap();
        let values: Vec<f32> = (0..10_000).map(|v| v as f32 / 10_000.0).collect();
        let mut buffers = CubeBuffers::allocate(&dims).unwrap();
        buffers.standard = Array3::from_shape_vec((1, 100, 100), values).unwrap();
        let mut stats = CubeStats::allocate(&dims).unwrap();
        run_all_passes(&dims, &mut buffers, &mut stats);

        assert_eq!(stats.num_bins, 100);
        let total: i64 = stats.hist_xy.iter().sum();
        assert_eq!(total, 10_000);
        for (bin, &count) in stats.hist_xy.iter().enumerate() {
            assert!(
                (99..=101).contains(&count),
                "bin {} holds {} counts",
                bin,
                count
            );
        }
    }
}
