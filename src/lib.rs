//! Generic N-dimensional spatial index.
//!
//! Two tree flavors share one arena-backed node model:
//!
//! - [`OmnitreePoints`](points::OmnitreePoints) indexes items that occupy a
//!   single coordinate vector.
//! - [`OmnitreeBounds`](bounds::OmnitreeBounds) indexes items that occupy an
//!   axis-aligned box, pinning boxes that straddle a division point at the
//!   branch level so every item is stored exactly once.
//!
//! Both locate items through a caller-supplied function rather than storing
//! coordinates next to the values, subdivide leaves on a logarithmic load
//! schedule, and merge sparse branches back into leaves on removal.

#![allow(clippy::bool_comparison)]

pub mod bounds;
pub mod points;
pub mod primitive;
pub mod tree;

pub use bounds::OmnitreeBounds;
pub use points::OmnitreePoints;
pub use primitive::{
    default_compare, encapsulation_check, equals_check, inclusion_check, straddles_lines,
    AxisIndex, Bound, Bounds, Compare, Number, NumberCommon,
};
pub use tree::{DivisionStrategy, Error, StepStatus};

#[cfg(feature = "fixed")]
pub extern crate fixed;
