//! Wharf Core
//!
//! Core types and protocol for the Wharf deployment controller.
//!
//! This crate contains:
//! - Domain types: push events, project metadata and build outcomes
//! - Protocol: the typed envelope exchanged with workers over persistent connections

pub mod domain;
pub mod protocol;
