//! Animation timeline and blending engine.
//!
//! Authored data (keyframe animations, windowed clips and nestable sequences) lives in an
//! [`AnimationLibrary`]. An [`AnimationPlayer`] runs entries over that data, composes every
//! sample aimed at the same property attribute and writes the result through a host-provided
//! [`PropertyAccess`] implementation. Original values are captured on first use and restored
//! when the last entry animating them finishes.

#![forbid(unsafe_code)]

mod error;
mod model;
mod runtime;
mod version;

#[cfg(any(feature = "json", feature = "binary"))]
mod asset;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "binary")]
pub mod binary;

pub use error::*;
pub use model::*;
pub use runtime::*;
pub use version::*;
