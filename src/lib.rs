//! # war-api-analyzer
//!
//! An offline REST endpoint analyzer for packaged WAR archives.
//!
//! Given a WAR file, the analyzer enumerates every class file (including
//! classes inside `WEB-INF/lib` jars), decodes the bytecode annotation
//! tables without loading anything into a JVM, and reports every HTTP
//! endpoint the archive exposes: URL pattern, verb, declaring controller,
//! whether the handler alters persistent state, and which validation
//! constraints apply.
//!
//! ## Architecture
//!
//! - **walker**: WAR/nested-jar traversal yielding raw class entries
//! - **reader**: big-endian cursor over class-file bytes
//! - **pool**: constant pool table and reference resolution
//! - **classfile**: class-file decoder (identity, annotations, call targets)
//! - **annotation**: annotation views and element values
//! - **descriptor**: JVM type descriptor parsing and display
//! - **opcodes**: instruction length table for the bytecode walk
//! - **mapping**: controller discovery and URL/verb composition
//! - **mutation**: state-alteration heuristics
//! - **validation**: validation constraint collection
//! - **report**: report data model and summary rollup
//! - **analyzer**: the `analyze` pipeline tying the stages together

pub mod analyzer;
pub mod annotation;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod mapping;
pub mod mutation;
pub mod opcodes;
pub mod pool;
pub mod reader;
pub mod report;
pub mod validation;
pub mod walker;

pub use analyzer::{AnalyzeOptions, analyze, analyze_with_options};
pub use error::{AnalyzeError, Result};
pub use report::{ApiEndpoint, ApiReport};
