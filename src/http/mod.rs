//! HTTP transport layer for the Model Context Protocol
//!
//! Provides the stateless `/mcp` endpoint, the SSE session transport and the public
//! metadata endpoints.

pub mod handlers;
pub mod sse;
