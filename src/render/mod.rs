//! Frame rendering.
//!
//! [`backend`] holds the renderer capability and frame type, [`compositor`] the per-frame
//! vello_cpu rasterizer, and [`filtergraph`] the encoder-side alternative.

/// Renderer selection and the rendered frame type.
pub mod backend;
/// Audio-reactive frame compositor.
pub mod compositor;
/// Whole-job encoder filtergraph backend.
pub mod filtergraph;
pub(crate) mod raster;
/// Text shaping and drawing.
pub mod text;
