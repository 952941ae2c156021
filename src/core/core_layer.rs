// The core module contains all business logic.
// Nothing in here performs I/O; the infra layer implements the ports.

#[path = "document/mod.rs"]
pub mod document;

#[path = "nodes/node_assembly.rs"]
pub mod nodes;

#[path = "source/source_service.rs"]
pub mod source;
