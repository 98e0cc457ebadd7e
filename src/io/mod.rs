//! Input and output collaborators: the FITS pixel source and the HDF5 sink.

pub mod fits;
pub mod hdf5;

pub use fits::FitsReader;
pub use hdf5::{ImageDatasets, OutputFile};
