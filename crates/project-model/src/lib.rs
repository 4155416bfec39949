//! ReelBatch Project Model
//!
//! Defines the data contracts shared by the render pipeline:
//! - **Project:** one directory holding a main video plus intro/outro stills,
//!   and the work/final paths derived from it
//! - **CodecPolicy:** the closed set of video encoder configurations
//!
//! A project is never mutated; processing only creates its derived files.

pub mod codec;
pub mod project;

pub use codec::*;
pub use project::*;
