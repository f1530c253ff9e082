//! Blur hash encoding.
//!
//! The pixel algorithm itself lives in an external encoder executable; this
//! module only knows how to make that executable available and how to call
//! it.
//!
//! - **Parameters**: [`ComponentRatio`]
//! - **Backend**: [`HashEncoder`] trait + [`ProcessEncoder`]

pub mod backend;
mod params;
pub mod process_backend;

pub use backend::{EncoderError, EncoderStatus, HashEncoder};
pub use params::ComponentRatio;
pub use process_backend::ProcessEncoder;
