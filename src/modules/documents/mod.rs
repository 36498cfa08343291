//! Document store
//!
//! JSON documents addressed by collection and id, kept in a single Postgres
//! table. Implements the access core's `DocumentStore` capability.

mod postgres_store;

pub use postgres_store::PgDocumentStore;
