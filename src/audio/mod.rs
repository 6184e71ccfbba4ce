/// Mono PCM decoding through the external decoder.
pub(crate) mod decode;
/// Audio duration probing.
pub(crate) mod probe;
