#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

extern crate blas_src;

pub mod composition;
pub mod config;
pub mod constraints;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod export;
pub(crate) mod math;
pub mod pipeline;
pub mod solver;
pub mod synthetic;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
