pub mod about;
pub mod blast_client;
pub mod blast_xml;
pub mod error;
pub mod mcp_server;
pub mod pipeline;
pub mod sequence;
