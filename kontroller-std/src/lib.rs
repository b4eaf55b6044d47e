//! # kontroller-std
//!
//! Standard implementations for the Kontroller request pipeline.
//!
//! This crate provides:
//! - **Configuration language**: [`dsl::evaluate`] and the script vocabulary
//! - **Registry**: [`ControllerRegistry`], built with [`RegistryBuilder`]
//! - **Async completion**: [`perform_async`]
//! - **Standard hooks**: request logging, span instrumentation
//! - **Testing**: recording steps and continuation probes

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core
pub use kontroller_core;

// Modules
pub mod completion;
pub mod dsl;
pub mod hooks;
pub mod registry;
pub mod testing;

pub use completion::{Completion, CompletionError, perform_async};
pub use registry::{ControllerRegistry, RegistryBuilder, RegistryError};
