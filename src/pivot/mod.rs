/// Pivot layer: long-format records → wide per-sample table.
///
/// Architecture:
/// ```text
///   Vec<MeasurementRecord>   (long: one row per reading)
///        │
///        ▼
///   ┌──────────┐
///   │  repeat   │  GCD set-size heuristic, repeat detection
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  engine   │  group rows, name columns, assemble WideTable
///   └──────────┘
///        │
///        ▼
///   WideTable   (wide: one row per sample / repeat set)
/// ```
///
/// The engine is a pure function of its input: no internal caches, no
/// I/O. Callers that want memoization key it on [`engine::cache_key`].
pub mod engine;
pub mod label;
pub mod repeat;
