//! Tracing setup for processes embedding the engine.
//!
//! The engine itself only emits `tracing` spans and events; installing a
//! subscriber is left to the host. [`init`] is a convenience for hosts that
//! want structured JSON logs.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, passwords, or key material** in any span field or log
//!   event. Column names, row counts, and failure counts only.
//! - Log level comes from `RUST_LOG` when set, else from the configured level.

pub mod init;

pub use init::init;
