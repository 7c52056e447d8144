//! Core join logic and pipeline orchestration for evalcorpus.
//!
//! This crate ties the materialized document stream, the query table and the
//! relevance table into the evaluation artifacts (`documents.json`,
//! `queries.json`) and drives the end-to-end `prepare` workflow.

pub mod assembler;
pub mod joiner;
pub mod pipeline;
