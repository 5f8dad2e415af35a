//! Merge engines
//!
//! The daemon only accepts whole-field replacement, so every local edit is
//! turned into a complete next state here. Both engines are pure: they
//! borrow the current state, return a new one, and never touch anything the
//! edit does not address.

pub mod content_map;
pub mod multimap;

pub use content_map::merge as merge_content_map;
pub use multimap::merge as merge_multimap;
