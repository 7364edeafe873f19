//! Core traits and types for the pullweld library.
//!
//! This module contains the error type, the source and transformer traits,
//! the controller that producers push into, and the guards that own stream
//! resources.

pub mod controller;
pub mod error;
pub mod resource;
pub mod traits;

// Re-export core items
pub use controller::Controller;
pub use error::{Error, IntoError, Result};
pub use resource::{Resource, TaskGuard};
pub use traits::{Transformer, UnderlyingSource};
