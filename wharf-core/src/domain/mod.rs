//! Core domain types
//!
//! This module contains the structures shared between the controller and the
//! processes attached to it. The worker decodes a [`push::PushEvent`] from every
//! build request and answers with an [`outcome::BuildOutcome`]; the router only
//! ever sees [`project::ProjectMetadata`].

pub mod manifest;
pub mod outcome;
pub mod project;
pub mod push;
