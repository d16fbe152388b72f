//! Shared test doubles for the taskmill workspace
//!
//! In-memory implementations of the domain capability traits so unit and
//! integration tests can run without a database, an object store, or real
//! host metrics.

pub mod builders;
pub mod mocks;

pub use builders::TaskBuilder;
pub use mocks::{InMemoryLogStore, MockMetricsSource, MockTaskRepository, ScriptedRunner};
