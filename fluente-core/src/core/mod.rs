//! Core abstractions for Fluente
//!
//! Error handling and the traits through which the library reaches its
//! external collaborators.

pub mod error;
pub mod traits;

pub use error::{ErrorContext, FluenteError, Result};
pub use traits::*;
