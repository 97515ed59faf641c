//! SurrealDB document store
//!
//! Collections are schemaless tables with unique indexes on the fields listed
//! by [`Collection::unique_fields`]. Conditional updates re-check the filter
//! inside the `UPDATE` statement, so a concurrent writer that changed the
//! record first leaves the update with zero rows.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use surrealdb::engine::any::{self, Any};
use surrealdb::{RecordId, Surreal};

use super::{
    Clause, Collection, Document, DocumentStore, Filter, StoreError, StoreResult, Update,
};

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Only the record id of a returned row
#[derive(Debug, Deserialize)]
struct Touched {
    id: RecordId,
}

#[derive(Clone)]
pub struct SurrealStore {
    db: Surreal<Any>,
}

impl SurrealStore {
    /// Connect (`mem://`, `rocksdb://path`, `ws://host`), select namespace and
    /// database, and define tables and indexes
    pub async fn connect(url: &str, namespace: &str, database: &str) -> StoreResult<Self> {
        let db = any::connect(url).await?;
        db.use_ns(namespace).use_db(database).await?;

        let store = Self { db };
        store.define_schema().await?;
        tracing::info!(url = %url, namespace = %namespace, database = %database, "Document store ready");
        Ok(store)
    }

    async fn define_schema(&self) -> StoreResult<()> {
        let mut sql = String::new();
        for collection in Collection::ALL {
            let table = collection.name();
            sql.push_str(&format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;\n"));
            for field in collection.unique_fields() {
                sql.push_str(&format!(
                    "DEFINE INDEX IF NOT EXISTS {table}_{field}_unique ON TABLE {table} FIELDS {field} UNIQUE;\n"
                ));
            }
        }
        self.db.query(sql).await?.check()?;
        Ok(())
    }

    /// First record id matching the filter
    async fn find_id(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<RecordId>> {
        let (condition, params) = where_clause(filter);
        let sql = format!(
            "SELECT id FROM {}{condition} LIMIT 1",
            collection.name()
        );
        let mut result = self.db.query(sql).bind(params).await?;
        let rows: Vec<Touched> = result.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

/// Render the filter as a `WHERE` clause with bound parameters
fn where_clause(filter: &Filter) -> (String, serde_json::Map<String, Value>) {
    let mut params = serde_json::Map::new();
    let mut conditions = Vec::with_capacity(filter.clauses().len());

    for (i, clause) in filter.clauses().iter().enumerate() {
        let name = format!("f{i}");
        let condition = match clause {
            Clause::Eq(field, value) => {
                params.insert(name.clone(), value.clone());
                format!("{field} = ${name}")
            }
            Clause::In(field, values) => {
                params.insert(name.clone(), Value::Array(values.clone()));
                format!("{field} IN ${name}")
            }
            Clause::Lt(field, value) => {
                params.insert(name.clone(), value.clone());
                format!("({field} != NONE AND {field} != NULL AND {field} < ${name})")
            }
        };
        conditions.push(condition);
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Render the update as a `SET` clause, adding parameters to `params`
fn set_clause(update: &Update, params: &mut serde_json::Map<String, Value>) -> String {
    let mut assignments = Vec::new();
    for (i, (field, value)) in update.sets().iter().enumerate() {
        let name = format!("s{i}");
        params.insert(name.clone(), value.clone());
        assignments.push(format!("{field} = ${name}"));
    }
    for field in update.unsets() {
        assignments.push(format!("{field} = NONE"));
    }
    for (i, (field, by)) in update.incs().iter().enumerate() {
        let name = format!("i{i}");
        params.insert(name.clone(), Value::from(*by));
        assignments.push(format!("{field} = ({field} OR 0) + ${name}"));
    }
    assignments.join(", ")
}

fn map_write_error(err: surrealdb::Error, collection: Collection) -> StoreError {
    let message = err.to_string();
    // Unique index violation: "Database index `...` already contains ..."
    if message.contains("already contains") {
        let field = collection
            .unique_fields()
            .iter()
            .find(|field| message.contains(&format!("{}_{}_unique", collection.name(), field)))
            .map_or_else(|| "unique field".to_string(), |field| (*field).to_string());
        return StoreError::Duplicate { collection, field };
    }
    StoreError::Database(message)
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn create(&self, collection: Collection, document: Document) -> StoreResult<String> {
        let sql = format!("CREATE {} CONTENT $data", collection.name());
        let mut result = self
            .db
            .query(sql)
            .bind(("data", Value::Object(document)))
            .await
            .map_err(|e| map_write_error(e, collection))?;
        let rows: Vec<Touched> = result
            .take(0)
            .map_err(|e| map_write_error(e, collection))?;

        rows.into_iter()
            .next()
            .map(|row| row.id.to_string())
            .ok_or_else(|| StoreError::Database(format!("CREATE on {collection} returned no record")))
    }

    async fn read(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        let (condition, params) = where_clause(filter);
        let sql = format!(
            "SELECT * OMIT id FROM {}{condition} LIMIT 1",
            collection.name()
        );
        let mut result = self.db.query(sql).bind(params).await?;
        let rows: Vec<Value> = result.take(0)?;
        Ok(rows.into_iter().find_map(into_document))
    }

    async fn read_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>> {
        let (condition, params) = where_clause(filter);
        let sql = format!(
            "SELECT * OMIT id FROM {}{condition} ORDER BY created_at",
            collection.name()
        );
        let mut result = self.db.query(sql).bind(params).await?;
        let rows: Vec<Value> = result.take(0)?;
        Ok(rows.into_iter().filter_map(into_document).collect())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        if update.is_empty() {
            return Ok(0);
        }
        let Some(id) = self.find_id(collection, filter).await? else {
            return Ok(0);
        };

        // The filter is repeated so a record changed since `find_id` is skipped
        let (condition, mut params) = where_clause(filter);
        let assignments = set_clause(update, &mut params);
        let sql = format!("UPDATE $record SET {assignments}{condition} RETURN id");

        let mut result = self
            .db
            .query(sql)
            .bind(params)
            .bind(("record", id))
            .await
            .map_err(|e| map_write_error(e, collection))?;
        let rows: Vec<Touched> = result
            .take(0)
            .map_err(|e| map_write_error(e, collection))?;
        Ok(rows.len() as u64)
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let (condition, params) = where_clause(filter);
        let sql = format!("DELETE {}{condition} RETURN BEFORE", collection.name());
        let mut result = self.db.query(sql).bind(params).await?;
        let rows: Vec<Touched> = result.take(0)?;
        Ok(rows.len() as u64)
    }
}

fn into_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
