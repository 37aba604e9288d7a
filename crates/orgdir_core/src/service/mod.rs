//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, taxonomy and spatial predicates into directory queries.
//! - Keep transport layers decoupled from storage details.

pub mod query_service;
