//! DocuChat core crate - shared types, configuration, and errors.
//!
//! Everything the other crates agree on lives here: the document /
//! conversation / message records, the chat stream event wire format,
//! the TOML-backed configuration, and the top-level error enum.

pub mod config;
pub mod error;
pub mod types;
