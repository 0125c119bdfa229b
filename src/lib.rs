//! Purpose: Library crate behind the `sheetport` CLI and MCP servers.
//! Exports: `api` (export, range reads, search, upsert paste, HTTP backend),
//! `mcp` (JSON-RPC dispatcher), `tools` (spreadsheet MCP tool handler).
//! Role: Core modules stay private; everything public goes through `api`.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
mod core;

pub mod api;
pub mod mcp;
pub mod tools;
