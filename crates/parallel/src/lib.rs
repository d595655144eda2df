//! # landshift parallel
//!
//! Execution strategies for embarrassingly parallel work such as fitting the
//! trees of an ensemble.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential, global-pool or bounded-pool execution
//! - `ParallelStrategy`: index-range map/for-each over a chosen mode
//!
//! With the `parallel` feature disabled every mode runs sequentially.

pub mod strategy;

pub use strategy::{num_cpus, ParallelStrategy, ProcessingMode};
