//! A read-only filesystem of synthetic directory trees.
//!
//! Every directory below the mountpoint is named by a root descriptor like
//! `1kx5x4`, which encodes the size of the files in the tree and the number
//! of children at each layer. Directory listings, attributes and file
//! contents are all computed from the requested path.
mod errors;

pub mod content;
pub mod descriptor;
pub mod path;
pub mod tree;

#[cfg(feature = "fs")]
pub mod fs;

pub use descriptor::{DescriptorError, RootDescriptor};
pub use errors::Error;
