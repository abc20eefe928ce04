//! Bakes the inputs of principled shading networks into image textures.
//!
//! A run walks every selected mesh, decides which [`quantity::Quantity`] values need an
//! image, rewires each material so the quantity lands on the sink, hands the result to a
//! [`bake::Rasterizer`] and puts every material back the way it was.

pub mod bake;
pub mod color;
pub mod config;
pub mod dsl;
pub mod error;
pub mod graph;
pub mod planner;
pub mod quantity;
pub mod reassembly;
pub mod report;
pub mod resolver;
pub mod scene;
pub mod schema;
pub mod synth;

pub use bake::{Baker, FileImageStore, FlatRasterizer};
pub use config::BakeConfig;
pub use error::BakeError;
pub use report::BakeReport;
pub use scene::Scene;
