//! Shared test utilities for the CMS extension workspace.
//!
//! This crate provides standardised fixtures so the CLI tests and the
//! integration suite build extension directories the same way. It is a
//! dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`fixture`]: [`TestExtensions`] builder for an on-disk extensions directory
//! - [`scripted`]: [`ScriptedExtension`] whose lifecycle outcomes are set by the test

pub mod fixture;
pub mod scripted;

pub use fixture::TestExtensions;
pub use scripted::{Outcome, Script, ScriptedExtension};
