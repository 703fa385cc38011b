//! Pure calculation layer: no I/O, recomputed on every read.

pub mod documents;
pub mod installments;
pub mod summary;
