/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet  (long instrument export)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RunData
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  RunData  │  Vec<MeasurementRecord>, facet indexes
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply facet predicates → filtered indices
///   └──────────┘
/// ```
pub mod filter;
pub mod loader;
pub mod model;
