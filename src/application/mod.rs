//! Application services: cached queries over the repository traits.

pub mod catalog;
pub mod error;
pub mod queries;
pub mod repos;
