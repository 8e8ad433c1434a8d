//! Array subset iterators.
//!
//! [`Indices`] iterates over the multidimensional indices of the elements in a region in row-major (C) order.
//! It is created with [`ArraySubset::indices`](crate::ArraySubset::indices) and supports [`into_iter()`](IntoIterator::into_iter) ([`IntoIterator`]).

mod indices_iterator;

pub use indices_iterator::{Indices, IndicesIntoIterator, IndicesIterator};
