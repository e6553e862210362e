//! Backend identification and capabilities.

/// Identifies the document store behind a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The in-process memory store.
    Memory,
    /// MongoDB.
    MongoDB,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::MongoDB => write!(f, "mongodb"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Capabilities that a backend may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendCapability {
    /// Basic CRUD operations.
    Crud,
    /// Causally consistent sessions.
    Sessions,
    /// Multi-document transactions inside a session.
    Transactions,
    /// Field projections on reads.
    Projection,
    /// Sorted reads.
    Sorting,
    /// Logging of every outgoing command.
    CommandLogging,
}

impl std::fmt::Display for BackendCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendCapability::Crud => "crud",
            BackendCapability::Sessions => "sessions",
            BackendCapability::Transactions => "transactions",
            BackendCapability::Projection => "projection",
            BackendCapability::Sorting => "sorting",
            BackendCapability::CommandLogging => "command-logging",
        };
        write!(f, "{}", name)
    }
}
