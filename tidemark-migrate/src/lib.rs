//! Tidemark Migration Library
//!
//! Helpers behind the `tidemark-migrate` CLI that do not need a database.

pub mod scaffold;
