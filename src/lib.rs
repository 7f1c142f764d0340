//! Shift Optimizer
//!
//! This library provides the domain model, the constraint model compiled from
//! it, an exact-then-local search over assignments, and the REST API that
//! serves ranked solutions.
//!
//! Each solve is stateless: a request goes in, ranked solutions come out.

pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod constraints;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod error;
pub mod model;
pub mod ranker;
pub mod scoring;
pub mod solver;

#[cfg(test)]
mod test_utils;
