//! Prompter core library: relay server, answer generator, completion client, and transcripts
//! used by the CLI.

pub mod config;
pub mod context;
pub mod generator;
pub mod llm;
pub mod prompt;
pub mod relay;
pub mod transcript;
