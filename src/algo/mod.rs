//! UV layout algorithms.
//!
//! This module contains the stages of a UV layout run:
//!
//! - **Islands**: bowtie splitting and island (chart) extraction
//! - **UDIM**: classification of triangles into UDIM tiles
//! - **Packing**: repacking, stacking and density normalization of islands
//! - **Layout**: the orchestrator tying the stages together into one run
//! - **Operators**: self-contained layout jobs for background execution
//!
//! Runs never modify their input. [`run_layout`] returns a [`UvPatch`] that
//! the caller applies once the run has completed.

pub mod islands;
pub mod pack;
pub mod udim;

mod cancel;
mod layout;
mod operator;
mod patch;

pub use cancel::{CancelFlag, Cancellation, Cancelled, NeverCancel};
pub use layout::{
    run_layout, LayoutMode, LayoutOutcome, LayoutPolicy, LayoutReport, LayoutResult,
    LayoutStrategy, LayoutWarning,
};
pub use operator::{LayoutOperator, LayoutOperatorFactory};
pub use patch::{NewElement, UvPatch};
pub use udim::TileId;
