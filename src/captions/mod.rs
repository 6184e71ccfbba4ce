/// Job style to caption events.
pub(crate) mod script;
/// Timed caption events and lookup.
pub(crate) mod timeline;
