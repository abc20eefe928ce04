//! Bake orchestration: one (object, quantity) cell at a time, wire, rasterize, persist
//! and restore.
//!
//! - `orchestrator`: the run loop, preconditions and per-cell wiring
//! - `cycle`: checkpoints and scratch ownership of one cell
//! - `image_store`: bake target images and their files
//! - `rasterizer`: the external bake call and a reference implementation

mod cycle;
pub mod image_store;
mod orchestrator;
pub mod rasterizer;

pub use cycle::{BakeCycle, SinkCheckpoint};
pub use image_store::{BakeImage, FileImageStore, ImageSpec, ImageStore};
pub use orchestrator::{Baker, check_preconditions};
pub use rasterizer::{BakeKind, BakePass, FlatRasterizer, Rasterizer};
