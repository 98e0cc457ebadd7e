//! The end-to-end conversion pipeline: read, reduce, write, publish.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::info;

use crate::{
    cube::{
        collect_histograms, collect_profile_stats, collect_slice_stats,
        consolidate_xyz_histograms, consolidate_xyz_stats, CubeBuffers, CubeStats,
    },
    error::HdfConvertError,
    header::translate_header,
    io::{FitsReader, OutputFile},
    record_duration,
};

const MEGABYTE: f64 = 1e6;
const GIBIBYTE: f64 = 1024.0 * 1024.0 * 1024.0;

/// Convert a FITS image cube into an IDIA-schema HDF5 file.
///
/// The output is written to `<output>.tmp` and renamed onto `output` only
/// after a successful close, so no partial file with the final name is ever
/// visible. On failure the temporary file is left in place for inspection.
///
/// The cube of one polarization is held fully in memory, twice when the
/// rotated copy is produced: peak usage is about `2 * depth * height * width
/// * 4` bytes.
///
/// # Errors
///
/// Any failing step aborts the conversion with the corresponding
/// [`HdfConvertError`].
pub fn convert(
    input: &Path,
    output: &Path,
    draw_progress: bool,
) -> Result<(), HdfConvertError> {
    let total_start = Instant::now();
    info!(
        "Converting FITS file {} to HDF5 file {}",
        input.display(),
        output.display()
    );

    let mut reader = FitsReader::open(input)?;
    let dims = reader.dims().clone();
    let cube_bytes = dims.cube_size() * std::mem::size_of::<f32>();

    let tmp_path = temporary_path(output);
    let output_file = OutputFile::create(&tmp_path)?;
    translate_header(&mut reader, &output_file)?;
    let datasets = output_file.create_image_datasets(&dims)?;

    info!(
        "Allocating {:.3} GiB of memory",
        CubeBuffers::estimate_bytes(&dims) as f64 / GIBIBYTE
    );
    let alloc_start = Instant::now();
    let mut buffers = CubeBuffers::allocate(&dims)?;
    let mut stats = CubeStats::allocate(&dims)?;
    info!("Allocated in {:.3} s", alloc_start.elapsed().as_secs_f64());

    for stokes in 0..dims.stokes {
        let read_start = Instant::now();
        {
            let destination = buffers
                .standard
                .as_slice_mut()
                .expect("standard cube is contiguous");
            reader.read_stokes_cube(stokes, destination)?;
        }
        let read_time = read_start.elapsed();
        record_duration("read", read_time);
        info!(
            "Read Stokes {} dataset in {:.3} s ({:.3} MB/s)",
            stokes,
            read_time.as_secs_f64(),
            cube_bytes as f64 / MEGABYTE / read_time.as_secs_f64()
        );

        let process_start = Instant::now();
        collect_slice_stats(&mut buffers, &mut stats, &dims, stokes, draw_progress);
        if dims.has_depth() {
            consolidate_xyz_stats(&mut stats, &dims, stokes);
            collect_profile_stats(&buffers, &mut stats, &dims, stokes);
        }
        collect_histograms(&buffers, &mut stats, &dims, stokes, draw_progress);
        let process_time = process_start.elapsed();
        record_duration("process", process_time);
        info!(
            "Processed Stokes {} dataset in {:.3} s",
            stokes,
            process_time.as_secs_f64()
        );

        let write_start = Instant::now();
        datasets.write_standard(stokes, buffers.standard.view())?;
        let mut written_bytes = cube_bytes;
        if let Some(rotated) = &buffers.rotated {
            datasets.write_swizzled(stokes, rotated.view())?;
            written_bytes += cube_bytes;
        }
        let write_time = write_start.elapsed();
        record_duration("write", write_time);
        info!(
            "Wrote Stokes {} dataset in {:.3} s ({:.3} MB/s)",
            stokes,
            write_time.as_secs_f64(),
            written_bytes as f64 / MEGABYTE / write_time.as_secs_f64()
        );
    }

    if dims.has_depth() {
        consolidate_xyz_histograms(&mut stats, &dims);
    }
    output_file.write_statistics(&dims, &stats)?;
    drop(datasets);
    drop(output_file);

    std::fs::rename(&tmp_path, output)?;
    info!(
        "FITS file converted in {:.3} s",
        total_start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn temporary_path(output: &Path) -> PathBuf {
    let mut tmp = output.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::temporary_path;

    #[test]
    fn test_temporary_path_appends_suffix() {
        assert_eq!(
            temporary_path(Path::new("out/cube.hdf5")),
            Path::new("out/cube.hdf5.tmp")
        );
    }
}
