use thiserror::Error;

/// Conditions that cancel a whole bake run before any material is touched.
///
/// Raised through `anyhow`; callers recover the variant with
/// `err.downcast_ref::<BakeError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BakeError {
    #[error("no active object")]
    NoActiveObject,
    #[error("{0} is not a mesh object")]
    NotAMesh(String),
    #[error("select at least 2 objects to bake selected to active (got {0})")]
    NotEnoughObjects(usize),
    #[error("material output missing in \"{0}\"")]
    MissingSink(String),
}
