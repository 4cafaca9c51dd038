//! Core data types for the funding rate screener.

pub mod direction;
pub mod funding;

pub use direction::*;
pub use funding::*;
