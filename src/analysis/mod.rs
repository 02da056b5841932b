//! Aggregation pipeline: sessions are attributed to buckets ([grouping]), buckets are ranked and
//! stacked ([ranking]), and [queries] names the combinations the dashboard needs.

pub mod cache;
pub mod grouping;
pub mod queries;
pub mod ranking;
