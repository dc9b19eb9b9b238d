//! A lazy, unit-aware, maskable N-dimensional array engine for scientific data sets.
//!
//! A [`Data`](data::Data) array composes a lazy [`ChunkedArray`](chunked::ChunkedArray) with the physical [`Units`](units::Units) of its elements, a mask of missing elements, and an identifier for every axis.
//! Operations build a lazy computation graph which is evaluated chunk by chunk, in parallel, when elements are requested.
//!
//! ## Getting Started
//! - [`data::Data`] is the array type, and [`data::DataBuilder`] configures a new array.
//! - [`units::Units`] parses, compares and converts units, including reference time units with calendars.
//! - [`compressed`] sources (ragged and gathered arrays) are decompressed lazily.
//! - [`config::global_config_mut`] changes the defaults of new arrays, such as the chunk size and the comparison tolerances.
//!
//! ## Example
//! ```rust
//! # use cfdata::data::{CollapseOptions, Data, Index, Slice};
//! # use cfdata::units::Units;
//! let data = Data::from_vec(
//!     (0..12).map(f64::from).collect(),
//!     &[3, 4],
//!     Units::new("km")?,
//! )?;
//!
//! // Indexing keeps dimensions by default
//! let column = data.getitem(&[Index::Ellipsis, Index::Integer(1)])?;
//! assert_eq!(column.shape(), vec![3, 1]);
//!
//! // Units are conformed by binary operations
//! let metres = Data::scalar(500.0, Units::new("m")?);
//! let sum = data.add(&metres)?;
//! assert_eq!(sum.units().as_str(), "km");
//!
//! // Collapses keep collapsed axes with length one
//! let mean = sum.mean(&CollapseOptions::default().axes(vec![1]))?;
//! assert_eq!(mean.shape(), vec![3, 1]);
//! assert_eq!(mean.getitem(&[Index::Integer(0), Index::Slice(Slice::full())])?.item()?.and_then(|v| v.as_f64()), Some(2.0));
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Licence
//! `cfdata` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array_subset;
pub mod chunked;
pub mod compressed;
pub mod config;
pub mod data;
pub mod data_type;
pub mod fill_value;
pub mod masked_array;
pub mod units;

/// An array shape. Dimensions may optionally be zero.
pub type ArrayShape = Vec<usize>;
