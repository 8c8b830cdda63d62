// The `utils` module provides utility functions for the framework.

pub mod context_hub;
pub mod dates;
pub mod google_auth;
pub mod template;

pub use crate::utils::dates::{DateParseError, parse_natural_date};
pub use crate::utils::template::{TEngine, TEngineError};
