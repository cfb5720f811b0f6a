//! PartsBay Media Processing Library
//!
//! File validation and the budget-driven image compression engine. Pure
//! CPU work: nothing in this crate touches the network.

pub mod compression;
pub mod engine;
pub mod validator;

pub use compression::{has_meaningful_alpha, select_format, OutputFormat};
pub use engine::{CompressedImage, CompressionEngine, CompressionError};
pub use validator::{MediaValidator, ValidationError};
