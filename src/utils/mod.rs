//! Utility Module
//!
//! Small helpers shared across the asset pipeline:
//!
//! - [`text`]: quoted-span scanning used by the config, material and shader
//!   include parsers

pub mod text;
