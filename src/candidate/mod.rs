//! Ranking of scored reference entries.

pub(crate) mod topk;
