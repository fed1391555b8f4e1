//! Eviction machinery: inventory walk, access-time ordering, deletion, and
//! empty-directory reclamation.

pub mod atime;
pub mod eviction;
pub mod reclaim;
pub mod walker;
