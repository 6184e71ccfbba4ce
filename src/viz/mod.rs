/// Spectral analysis into per-band energy samples.
pub(crate) mod spectrum;
