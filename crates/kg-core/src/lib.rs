//! # kg-core
//!
//! Core types, entity keys, and error types for the compliance knowledge graph.
//!
//! This crate provides the foundational types shared across all `kg-*` crates:
//! - The closed entity and relationship enumerations
//! - Entity, relationship, and path structs
//! - Deterministic entity key derivation
//! - Visualization payload types and per-type visual defaults
//! - Cross-cutting error types
//! - Response types for rebuild and incremental sync

pub mod entities;
pub mod enums;
pub mod errors;
pub mod keys;
pub mod responses;
pub mod visual;
