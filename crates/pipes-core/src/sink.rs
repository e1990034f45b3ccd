use crate::arena::SourceHandle;

/// An input port of a `Tool`. Holds at most one upstream connection; a
/// `Tool` with no sinks is a graph root (a pure source), one with no
/// sources is a graph leaf (a pure sink).
#[derive(Debug, Clone, Default)]
pub struct Sink {
    pub name: Option<String>,
    pub upstream: Option<SourceHandle>,
}

impl Sink {
    pub fn new() -> Self {
        Sink::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Sink {
            name: Some(name.into()),
            upstream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.upstream.is_some()
    }
}
