//! Boundary collaborators of the ROAS pipeline: locating weekly extracts on
//! disk and persisting the accumulated output tables.

pub mod inputs;
pub mod store;

pub use inputs::{InputLocator, WindowFiles};
pub use store::TableStore;
