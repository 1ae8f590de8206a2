//! Transports to the ingestion service
//!
//! The delivery queue talks to the ingestion boundary through the
//! [`Transport`] trait so hosts and tests can substitute their own.

pub mod ingest;

pub use ingest::{HttpTransport, HttpTransportBuilder, Transport, DEFAULT_INGEST_ENDPOINT};
