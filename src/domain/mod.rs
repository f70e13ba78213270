//! RootData tools and their orchestration
//!
//! Basic passthrough tools, the aggregation tools built on top of them, and the MCP
//! tool and prompt registries.

pub mod aggregate;
pub mod basic;
pub mod compare;
pub mod prompts;
pub mod report;
pub mod tools;
pub mod trends;
pub mod utils;
