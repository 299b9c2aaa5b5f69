//! Runtime configuration for engine construction.

/// Which persistence backend to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// Volatile in-process store for tests and development.
    #[default]
    Memory,
    /// Durable SQLite-backed store.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Configuration resolved once at startup and handed to engine wiring.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub store: StoreKind,
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("CALLWEAVE_DB_NAME").unwrap_or_else(|_| "callweave.db".to_string()))
    }

    pub fn new(store: StoreKind, sqlite_db_name: Option<String>) -> Self {
        Self {
            store,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_sqlite_db_name(mut self, name: impl Into<String>) -> Self {
        self.sqlite_db_name = Some(name.into());
        self
    }

    /// SQLite connection URL for the configured database name.
    #[must_use]
    pub fn sqlite_url(&self) -> Option<String> {
        self.sqlite_db_name
            .as_deref()
            .map(|name| format!("sqlite://{name}?mode=rwc"))
    }
}
