pub mod config;
pub mod errors;
pub mod generation;
pub mod ingest;
pub mod llm_client;
pub mod retrieval;
pub mod routes;
pub mod session;
pub mod state;
pub mod style;
