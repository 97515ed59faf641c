//! Document store
//!
//! Collection-oriented store used by the onboarding saga. Adapters provide
//! per-document atomicity only; there are no cross-document transactions.
//!
//! - [`SurrealStore`] - SurrealDB (`mem://`, `rocksdb://...`)
//! - [`MemoryStore`] - in-process, used by tests and `STORE_URL=memory`

mod memory;
mod surreal;

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Raw stored document (store-internal identifiers excluded)
pub type Document = serde_json::Map<String, Value>;

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate {field} in {collection}")]
    Duplicate {
        collection: Collection,
        field: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Pending, in-flight and failed requests
    OnboardingRequests,
    /// Activated tenants
    OnboardedTenants,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::OnboardingRequests, Collection::OnboardedTenants];

    pub const fn name(&self) -> &'static str {
        match self {
            Collection::OnboardingRequests => "onboarding_requests",
            Collection::OnboardedTenants => "onboarded_tenants",
        }
    }

    /// Fields with a unique index
    pub const fn unique_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::OnboardingRequests => &["request_id", "email"],
            Collection::OnboardedTenants => &["request_id"],
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Filter
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `field == value`
    Eq(&'static str, Value),
    /// `field` is one of the values
    In(&'static str, Vec<Value>),
    /// `field < value`; a missing or null field never matches
    Lt(&'static str, Value),
}

impl Clause {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Clause::Eq(field, value) => document.get(*field) == Some(value),
            Clause::In(field, values) => document
                .get(*field)
                .is_some_and(|current| values.contains(current)),
            Clause::Lt(field, value) => document
                .get(*field)
                .and_then(|current| compare(current, value))
                .is_some_and(|ordering| ordering == Ordering::Less),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of clauses; an empty filter matches every document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq(field, value.into()));
        self
    }

    pub fn any_of<V: Into<Value>>(
        mut self,
        field: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push(Clause::In(field, values));
        self
    }

    pub fn lt(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Lt(field, value.into()));
        self
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(document))
    }
}

// =============================================================================
// Update
// =============================================================================

/// Field-level modifications applied by [`DocumentStore::update_one`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Vec<(&'static str, Value)>,
    unset: Vec<&'static str>,
    inc: Vec<(&'static str, i64)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.set.push((field, value.into()));
        self
    }

    pub fn unset(mut self, field: &'static str) -> Self {
        self.unset.push(field);
        self
    }

    pub fn inc(mut self, field: &'static str, by: i64) -> Self {
        self.inc.push((field, by));
        self
    }

    pub fn sets(&self) -> &[(&'static str, Value)] {
        &self.set
    }

    pub fn unsets(&self) -> &[&'static str] {
        &self.unset
    }

    pub fn incs(&self) -> &[(&'static str, i64)] {
        &self.inc
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty()
    }

    /// Apply to an in-memory document
    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            document.insert((*field).to_string(), value.clone());
        }
        for field in &self.unset {
            document.remove(*field);
        }
        for (field, by) in &self.inc {
            let current = document.get(*field).and_then(Value::as_i64).unwrap_or(0);
            document.insert((*field).to_string(), Value::from(current + by));
        }
    }
}

// =============================================================================
// Store trait
// =============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning its store key
    async fn create(&self, collection: Collection, document: Document) -> StoreResult<String>;

    /// First document matching the filter
    async fn read(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>>;

    async fn read_all(&self, collection: Collection, filter: &Filter)
    -> StoreResult<Vec<Document>>;

    /// Atomically update at most one matching document, returning the number
    /// of documents modified (0 or 1)
    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64>;

    /// Delete every matching document, returning how many were removed
    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64>;
}

/// Serialize a record into a store document
pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Database(format!(
            "expected an object document, got {other}"
        ))),
    }
}

/// Deserialize a store document into a record
pub fn from_document<T: DeserializeOwned>(document: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}
