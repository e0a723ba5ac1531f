//! ConnectionsRepository Integration Tests
//!
//! Drives the repository against mock providers, factories and connections:
//! - Lookup and lazy construction (`has`, `get`, `get_many`, `get_loaded`, `get_all`)
//! - Teardown (`disconnect`, `disconnect_all`, `shutdown`)
//! - Per-key serialization and cancellation
//! - Staleness eviction

mod staleness;
