//! Funding analysis modules.
//!
//! Pure computations over validated domain types: chart slices and
//! progress figures, chart colors, and listing pagination.

pub mod aggregator;
pub mod pagination;
pub mod palette;

pub use aggregator::*;
pub use pagination::{paginate, DEFAULT_PAGE_SIZE};
pub use palette::{Palette, PaletteError, BASE_PALETTE, UNFUNDED_COLOR};
