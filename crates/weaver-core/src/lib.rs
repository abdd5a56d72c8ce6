//! Core types and engine for the Weaver knowledge graph.
//!
//! Notes, the pages they came from, their categories and extracted concepts
//! become typed entities joined by weighted relationships. This crate holds
//! the engine and the storage trait; it has no database dependencies.

// Store traits return explicit `Send` futures; the lint is advisory only.
#![allow(async_fn_in_trait)]

pub mod concept;
pub mod config;
pub mod entities;
pub mod entity;
pub mod error;
pub mod export;
pub mod graph;
pub mod identity;
pub mod import;
pub mod note;
pub mod query;
pub mod relationship;
pub mod store;
pub mod synthesize;
pub mod temporal;

pub use error::{Error, Result};
pub use graph::KnowledgeGraph;
