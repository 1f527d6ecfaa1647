//! Operator tooling around the error-log RAG service.

pub mod cli;
pub mod commands;
