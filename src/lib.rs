//! Co-occurrence heatmaps of stressed-syllable positions in metrical verse.
//!
//! An [`table::ObservationTable`] holds one 0/1 stress indicator per line and
//! syllable position. [`cooccurrence::HeatmapBuilder`] turns it into a
//! [`cooccurrence::CoOccurrenceMatrix`] of conditional percentages plus one
//! [`cooccurrence::PositionSummary`] per position, and [`plot::render_heatmap`]
//! draws both as an annotated heatmap.

pub mod config;
pub mod cooccurrence;
pub mod corpus;
pub mod error;
pub mod plot;
pub mod table;

pub use cooccurrence::{
    CoOccurrenceMatrix, DiagonalPolicy, HeatmapBuilder, PositionSet, PositionSummary, ValueCheck,
};
pub use error::AppError;
pub use table::ObservationTable;
