// ============================================================================
// RASTER OPERATIONS — pure, CPU-only, rayon-parallelized
// ============================================================================
//
// Every operation reads an input buffer and returns a new one; inputs are
// never mutated in place. Modules:
//   - color:   channel reordering + color-space conversions
//   - filters: shared low-level primitives (blurs, thresholds, bilateral)
//   - stylize: the four stylization filters
//   - mask:    subject-mask extraction
//   - clone:   multi-instance collage compositing
// ============================================================================

pub mod clone;
pub mod color;
pub mod filters;
pub mod mask;
pub mod stylize;
