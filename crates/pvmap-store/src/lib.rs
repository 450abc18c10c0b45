//! PV Map Store - Project source adapters
//!
//! This crate provides the implementations of the `ProjectSource` port:
//! - In-memory source evaluating searches locally (development, tests, offline data)
//! - Supabase REST source calling the remote search procedure

pub mod memory;
pub mod supabase;

pub use memory::MemoryProjectSource;
pub use supabase::SupabaseSource;
