//! Binary asset storage for item images.
//!
//! The core only records the returned `ImageRef`; bytes live outside the
//! database.

pub mod image_store;
