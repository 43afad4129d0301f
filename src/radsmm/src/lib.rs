//! Random Access Data Storage for Multiple Models.
//!
//! A RADSMM store holds one scalar likelihood per cell of a seven-dimension
//! model grid (pedigree, marker, theta, gene frequency, penetrance, q-model,
//! disequilibrium), spread over one or more files with a self-describing
//! header, per-axis index tables, optional label tables, and advisory
//! whole-file locking. Cells start life as the EMPTY sentinel and are filled
//! as the likelihood engine sweeps the grid.
//!
//! ```no_run
//! use radsmm::{CellIndex, ElementType, Header, MarkerMode, ModelKind, Store, ThetaMatrix};
//!
//! # fn main() -> Result<(), radsmm::StoreError> {
//! let mut header = Header::new();
//! header.set_type(MarkerMode::TwoPoint, ModelKind::Dichotomous, false);
//! header.set_element_type(ElementType::Double);
//! header.set_sequential_markers(10)?;
//! header.set_sequential_pedigrees(4)?;
//! header.set_thetas(&[0.0, 0.1, 0.2, 0.3, 0.4, 0.5], ThetaMatrix::Diagonal)?;
//! header.set_penetrances(0, &[0.9], &[0.5], &[0.01])?;
//! header.set_gene_freqs(&[0.1])?;
//! header.set_description("two-point sweep");
//!
//! let mut store = Store::create(header, std::path::Path::new("sweep.rad"))?;
//! store.write(CellIndex { pedigree: 0, marker: 3, theta: 2, ..Default::default() }, 1.25e-7)?;
//! store.close()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod header;
pub mod index;
pub mod label;
pub mod seek;
pub mod sentinel;
pub mod store;

pub use error::{ErrorCode, StoreError};
pub use header::{
    ElementType, Header, MarkerMode, ModelKind, Ordering, Penetrance, QuantModel, ThetaMatrix,
    DEFAULT_MAX_FILE_BYTES, HEADER_LEN,
};
pub use label::{LabelKind, LabelTable};
pub use seek::{grid_theta_index, CellIndex};
pub use store::{OpenMode, Store, MAX_DATA_FILES};
