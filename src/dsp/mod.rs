//! DSP cascade: biquad sections, filter cascades built from them, and the
//! pipeline that composes gains and cascades into one per-connection signal path.

pub mod biquad;
pub mod cascade;
pub mod pipeline;

pub use biquad::Biquad;
pub use cascade::FilterCascade;
pub use pipeline::Pipeline;
