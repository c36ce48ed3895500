//! Research agent: collects what public sources say about a company or person,
//! analyzes it along five dimensions with an LLM and renders a Markdown report.

pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod sources;
pub mod telemetry;
