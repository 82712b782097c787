//! Column type registry and id generation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::column::{ColumnDesc, ColumnKind};

/// Builds the behavior of a column from its description.
pub type ColumnFactory = Arc<dyn Fn(&ColumnDesc) -> Option<ColumnKind> + Send + Sync>;

/// Maps `desc.type` keys to column factories.
#[derive(Clone)]
pub struct ColumnTypeRegistry {
    factories: HashMap<String, ColumnFactory>,
}

/// Types registered by [`ColumnTypeRegistry::default`].
pub const BUILTIN_TYPES: [&str; 17] = [
    "actions",
    "rank",
    "selection",
    "string",
    "link",
    "annotate",
    "boolean",
    "date",
    "number",
    "categorical",
    "ordinal",
    "stack",
    "min",
    "max",
    "mean",
    "script",
    "nested",
];

impl Default for ColumnTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for name in BUILTIN_TYPES {
            registry.register(name, move |desc| ColumnKind::for_type(name, desc));
        }
        registry
    }
}

impl ColumnTypeRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for a type key.
    pub fn register<F>(&mut self, column_type: impl Into<String>, factory: F)
    where
        F: Fn(&ColumnDesc) -> Option<ColumnKind> + Send + Sync + 'static,
    {
        self.factories.insert(column_type.into(), Arc::new(factory));
    }

    /// Make `alias` build columns the way `target` does.
    pub fn alias(&mut self, alias: impl Into<String>, target: &str) -> bool {
        match self.factories.get(target).cloned() {
            Some(factory) => {
                self.factories.insert(alias.into(), factory);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, column_type: &str) -> bool {
        self.factories.contains_key(column_type)
    }

    pub fn create(&self, desc: &ColumnDesc) -> Option<ColumnKind> {
        let factory = self.factories.get(&desc.column_type);
        if factory.is_none() {
            tracing::warn!(column_type = %desc.column_type, "unknown column type");
        }
        factory.and_then(|f| f(desc))
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for ColumnTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnTypeRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// Monotonic source of column and ranking ids, owned by one provider.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next unused number.
    pub fn peek(&self) -> u64 {
        self.next
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}{}", self.next);
        self.next += 1;
        id
    }

    /// Never hand out a number below `uid` again.
    pub fn advance_to(&mut self, uid: u64) {
        self.next = self.next.max(uid);
    }
}
