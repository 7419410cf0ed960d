mod join;
mod result_cache;
mod scan;
mod stmt_cache;
mod write;

pub use join::{IncludeNode, JoinPlan, plan_joins};
pub use result_cache::ResultCache;
pub use scan::{convert_cell, parse_datetime, scan_flat, scan_grouped};
pub use stmt_cache::StatementCache;
pub use write::{NestedWrite, NestedWriteOp, WriteOperation, WriteRequest};

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, warn};

use modelql_core::{
    CancelToken, Connection, DriverError, Error, Result, ScanError, SqlDialect, ValidationError,
    Value,
};
use modelql_datamodel::RelationField;

use crate::descriptor::{ModelDescriptor, ModelRegistry, Record, RecordSink};
use crate::request::{
    CompareOp, Condition, ConditionValue, QueryRequest, WhereNode, value_to_json,
};
use crate::sql::{SqlQuery, delete, insert, select, select_with_joins, update};

/// Relation-aware query engine over one connection: translates
/// structured requests into dialect SQL, scans rows into record
/// graphs, and runs nested writes atomically. Shareable across
/// threads; all mutable state lives behind the caches' locks.
pub struct Executor {
    connection: Arc<dyn Connection>,
    dialect: SqlDialect,
    registry: ModelRegistry,
    statements: StatementCache,
    result_cache: Option<ResultCache>,
}

impl Executor {
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, dialect: SqlDialect, registry: ModelRegistry) -> Self {
        Self {
            connection,
            dialect,
            registry,
            statements: StatementCache::new(),
            result_cache: None,
        }
    }

    /// Turns on the read-result memo. Off by default.
    #[must_use]
    pub fn with_result_cache(mut self, capacity: NonZeroUsize) -> Self {
        self.result_cache = Some(ResultCache::new(capacity));
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    #[must_use]
    pub fn statement_cache(&self) -> &StatementCache {
        &self.statements
    }

    pub fn clear_statement_cache(&self) -> Result<()> {
        self.statements.clear(self.connection.as_ref())?;
        Ok(())
    }

    /// Runs a read request, eagerly loading every included relation
    /// through LEFT JOINs (never through follow-up queries).
    pub fn find_many(&self, request: &QueryRequest, ctx: &CancelToken) -> Result<Vec<Record>> {
        ctx.check()?;
        let descriptor = self.registry.descriptor(&request.table)?;

        let plan = match &request.include {
            Some(include) => plan_joins(&self.registry, &request.table, include)?,
            None => JoinPlan::default(),
        };

        let query = select_with_joins(request, &plan.joins, self.dialect)?;
        debug!(table = %request.table, sql = %query.sql, "running read");

        let cache_key = self
            .result_cache
            .as_ref()
            .map(|_| ResultCache::key(&query.sql, &query.args));
        if let (Some(cache), Some(key)) = (&self.result_cache, &cache_key)
            && let Some(records) = cache.get(key)
        {
            return Ok(records);
        }

        let result = self.run_query(&query, ctx)?;

        let records = if plan.has_to_many() {
            scan_grouped(&result, descriptor, &self.registry, &plan.includes)?
        } else {
            let mut sink = RecordSink::new();
            scan_flat(&result, descriptor, &self.registry, &plan.includes, &mut sink)?;
            sink.into_records()
        };

        if let (Some(cache), Some(key)) = (&self.result_cache, cache_key) {
            let mut tables = BTreeSet::new();
            tables.insert(request.table.clone());
            tables.extend(plan.joins.iter().map(|join| join.table.clone()));
            cache.put(key, tables, records.clone());
        }

        Ok(records)
    }

    /// Runs a write request with its nested operations in a single
    /// transaction. Any failure rolls everything back before
    /// propagating.
    pub fn write(&self, request: &WriteRequest, ctx: &CancelToken) -> Result<Record> {
        ctx.check()?;
        self.connection.begin()?;

        match self.run_write(request, ctx) {
            Ok(record) => {
                self.connection.commit()?;
                self.invalidate_after_write(request);
                Ok(record)
            }
            Err(error) => {
                if let Err(rollback_error) = self.connection.rollback() {
                    warn!(error = %rollback_error, "rollback after failed write also failed");
                }
                Err(error)
            }
        }
    }

    fn run_write(&self, request: &WriteRequest, ctx: &CancelToken) -> Result<Record> {
        let descriptor = self.registry.descriptor(&request.table)?.clone();

        let parent = match request.operation {
            WriteOperation::Create => self.insert_returning(&request.table, &descriptor, &request.data, ctx)?,
            WriteOperation::Update => {
                let query = update(
                    &request.table,
                    &request.data,
                    request.filter.as_ref(),
                    self.dialect,
                )?;
                self.run_execute(&query, ctx)?;
                self.reselect_parent(request, &descriptor, ctx)?
            }
        };

        for nested in &request.nested {
            ctx.check()?;
            let relation = self
                .registry
                .relation(&request.table, &nested.relation)
                .ok_or_else(|| ValidationError::UnknownRelation {
                    model: request.table.clone(),
                    relation: nested.relation.clone(),
                })?
                .clone();
            self.run_nested(&request.table, &descriptor, &parent, &relation, &nested.op, ctx)?;
        }

        Ok(parent)
    }

    fn insert_returning(
        &self,
        table: &str,
        descriptor: &ModelDescriptor,
        data: &BTreeMap<String, Value>,
        ctx: &CancelToken,
    ) -> Result<Record> {
        let query = insert(table, data, self.dialect)?;

        if self.dialect.supports_returning() {
            let result = self.run_query(&query, ctx)?;
            let mut sink = RecordSink::new();
            scan_flat(&result, descriptor, &self.registry, &[], &mut sink)?;
            return sink
                .into_records()
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::from(DriverError::new(
                        query.sql.clone(),
                        modelql_core::redact_args(&query.args),
                        "insert returned no row",
                    ))
                });
        }

        self.run_execute(&query, ctx)?;

        let mut record = Record::default();
        record.fields = data.clone();
        if !record.fields.contains_key(&descriptor.primary_key)
            && let Some(id) = self.connection.last_insert_id()?
        {
            record
                .fields
                .insert(descriptor.primary_key.clone(), Value::Int(id));
        }
        Ok(record)
    }

    /// After a non-returning UPDATE the nested operations still need
    /// the parent key; fetch the row back through the same filter.
    fn reselect_parent(
        &self,
        request: &WriteRequest,
        descriptor: &ModelDescriptor,
        ctx: &CancelToken,
    ) -> Result<Record> {
        let reselect = QueryRequest {
            table: request.table.clone(),
            filter: request.filter.clone(),
            limit: Some(1),
            ..QueryRequest::default()
        };
        let query = select(&reselect, self.dialect)?;
        let result = self.run_query(&query, ctx)?;

        let mut sink = RecordSink::new();
        scan_flat(&result, descriptor, &self.registry, &[], &mut sink)?;
        sink.into_records().into_iter().next().ok_or_else(|| {
            Error::from(ScanError::MissingColumn {
                column: format!("no `{}` row matched the update filter", request.table),
            })
        })
    }

    fn run_nested(
        &self,
        parent_table: &str,
        parent_descriptor: &ModelDescriptor,
        parent: &Record,
        relation: &RelationField,
        op: &NestedWriteOp,
        ctx: &CancelToken,
    ) -> Result<()> {
        if relation.is_many_to_many {
            return self.run_nested_many_to_many(parent_descriptor, parent, relation, op, ctx);
        }
        // The inverse side of a one-to-one keeps its key on the
        // related table and behaves like a single-element list.
        let fk_on_parent = parent_descriptor.field(&relation.foreign_key).is_some();
        if relation.is_list || !fk_on_parent {
            return self.run_nested_one_to_many(parent, relation, op, ctx);
        }
        self.run_nested_many_to_one(parent_table, parent_descriptor, parent, relation, op, ctx)
    }

    fn run_nested_one_to_many(
        &self,
        parent: &Record,
        relation: &RelationField,
        op: &NestedWriteOp,
        ctx: &CancelToken,
    ) -> Result<()> {
        let parent_key = record_value(parent, &relation.local_key)?;
        let child_table = relation.related_table.as_str();
        let child_descriptor = self.registry.descriptor(child_table)?.clone();
        let fk = relation.foreign_key.as_str();

        match op {
            NestedWriteOp::Create { data } => {
                let mut data = data.clone();
                data.insert(fk.to_string(), parent_key);
                let query = insert(child_table, &data, self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Update { filter, data } => {
                let scoped = scope_to_parent(fk, &parent_key, filter.clone());
                let query = update(child_table, data, Some(&scoped), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Delete { filter } => {
                let scoped = scope_to_parent(fk, &parent_key, filter.clone());
                let query = delete(child_table, Some(&scoped), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Connect { id } => {
                let data = BTreeMap::from([(fk.to_string(), parent_key)]);
                let filter = eq_filter(&child_descriptor.primary_key, id);
                let query = update(child_table, &data, Some(&filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Disconnect { id } => {
                let data = BTreeMap::from([(fk.to_string(), Value::Null)]);
                let mut filter = eq_filter(fk, &parent_key);
                if let Some(id) = id {
                    filter
                        .conditions
                        .push(eq_condition(&child_descriptor.primary_key, id));
                }
                let query = update(child_table, &data, Some(&filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Set { ids } => {
                // Disconnect-all, then connect the provided set.
                let clear = BTreeMap::from([(fk.to_string(), Value::Null)]);
                let query = update(
                    child_table,
                    &clear,
                    Some(&eq_filter(fk, &parent_key)),
                    self.dialect,
                )?;
                self.run_execute(&query, ctx)?;

                for id in ids {
                    let data = BTreeMap::from([(fk.to_string(), parent_key.clone())]);
                    let filter = eq_filter(&child_descriptor.primary_key, id);
                    let query = update(child_table, &data, Some(&filter), self.dialect)?;
                    self.run_execute(&query, ctx)?;
                }
            }
            NestedWriteOp::Upsert { filter, create, update: update_data } => {
                let scoped = scope_to_parent(fk, &parent_key, Some(filter.clone()));
                let probe = QueryRequest {
                    table: child_table.to_string(),
                    filter: Some(scoped.clone()),
                    limit: Some(1),
                    ..QueryRequest::default()
                };
                let query = select(&probe, self.dialect)?;
                let existing = self.run_query(&query, ctx)?;

                if existing.is_empty() {
                    let mut data = create.clone();
                    data.insert(fk.to_string(), parent_key);
                    let query = insert(child_table, &data, self.dialect)?;
                    self.run_execute(&query, ctx)?;
                } else {
                    let query = update(child_table, update_data, Some(&scoped), self.dialect)?;
                    self.run_execute(&query, ctx)?;
                }
            }
        }

        Ok(())
    }

    fn run_nested_many_to_one(
        &self,
        parent_table: &str,
        parent_descriptor: &ModelDescriptor,
        parent: &Record,
        relation: &RelationField,
        op: &NestedWriteOp,
        ctx: &CancelToken,
    ) -> Result<()> {
        let parent_pk = record_value(parent, &parent_descriptor.primary_key)?;
        let parent_filter = eq_filter(&parent_descriptor.primary_key, &parent_pk);
        let related_table = relation.related_table.as_str();
        let related_descriptor = self.registry.descriptor(related_table)?.clone();

        match op {
            NestedWriteOp::Create { data } => {
                let related = self.insert_returning(related_table, &related_descriptor, data, ctx)?;
                let key = record_value(&related, &relation.local_key)?;
                let assignment = BTreeMap::from([(relation.foreign_key.clone(), key)]);
                let query = update(parent_table, &assignment, Some(&parent_filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Connect { id } => {
                let assignment = BTreeMap::from([(relation.foreign_key.clone(), id.clone())]);
                let query = update(parent_table, &assignment, Some(&parent_filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Disconnect { .. } => {
                let assignment = BTreeMap::from([(relation.foreign_key.clone(), Value::Null)]);
                let query = update(parent_table, &assignment, Some(&parent_filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Update { filter, data } => {
                let key = record_value(parent, &relation.foreign_key)?;
                let scoped = scope_to_parent(&relation.local_key, &key, filter.clone());
                let query = update(related_table, data, Some(&scoped), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Delete { filter } => {
                let key = record_value(parent, &relation.foreign_key)?;
                let scoped = scope_to_parent(&relation.local_key, &key, filter.clone());
                let query = delete(related_table, Some(&scoped), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Set { .. } => {
                return Err(ValidationError::InvalidAttribute {
                    model: parent_table.to_string(),
                    field: relation.name.clone(),
                    attribute: "set".to_string(),
                    reason: "set applies to list relations".to_string(),
                }
                .into());
            }
            NestedWriteOp::Upsert { filter, create, update: update_data } => {
                let probe = QueryRequest {
                    table: related_table.to_string(),
                    filter: Some(filter.clone()),
                    limit: Some(1),
                    ..QueryRequest::default()
                };
                let query = select(&probe, self.dialect)?;
                let existing = self.run_query(&query, ctx)?;

                if existing.is_empty() {
                    let related =
                        self.insert_returning(related_table, &related_descriptor, create, ctx)?;
                    let key = record_value(&related, &relation.local_key)?;
                    let assignment = BTreeMap::from([(relation.foreign_key.clone(), key)]);
                    let query =
                        update(parent_table, &assignment, Some(&parent_filter), self.dialect)?;
                    self.run_execute(&query, ctx)?;
                } else {
                    let query = update(related_table, update_data, Some(filter), self.dialect)?;
                    self.run_execute(&query, ctx)?;
                }
            }
        }

        Ok(())
    }

    fn run_nested_many_to_many(
        &self,
        parent_descriptor: &ModelDescriptor,
        parent: &Record,
        relation: &RelationField,
        op: &NestedWriteOp,
        ctx: &CancelToken,
    ) -> Result<()> {
        let parent_key = record_value(parent, &relation.local_key)?;
        let junction = relation.junction_table.as_deref().ok_or_else(|| {
            ValidationError::IncompleteRelation {
                model: parent_descriptor.model.clone(),
                relation: relation.name.clone(),
                field: "junction_table".to_string(),
            }
        })?;
        let self_column = relation.junction_fk_to_self.as_deref().ok_or_else(|| {
            ValidationError::IncompleteRelation {
                model: parent_descriptor.model.clone(),
                relation: relation.name.clone(),
                field: "junction_fk_to_self".to_string(),
            }
        })?;
        let other_column = relation.junction_fk_to_other.as_deref().ok_or_else(|| {
            ValidationError::IncompleteRelation {
                model: parent_descriptor.model.clone(),
                relation: relation.name.clone(),
                field: "junction_fk_to_other".to_string(),
            }
        })?;

        let related_table = relation.related_table.as_str();
        let related_descriptor = self.registry.descriptor(related_table)?.clone();

        match op {
            NestedWriteOp::Create { data } => {
                let related = self.insert_returning(related_table, &related_descriptor, data, ctx)?;
                let other_key = record_value(&related, &related_descriptor.primary_key)?;
                self.connect_junction(junction, self_column, &parent_key, other_column, &other_key, ctx)?;
            }
            NestedWriteOp::Connect { id } => {
                self.connect_junction(junction, self_column, &parent_key, other_column, id, ctx)?;
            }
            NestedWriteOp::Disconnect { id } => {
                let mut filter = eq_filter(self_column, &parent_key);
                if let Some(id) = id {
                    filter.conditions.push(eq_condition(other_column, id));
                }
                let query = delete(junction, Some(&filter), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Set { ids } => {
                let query = delete(junction, Some(&eq_filter(self_column, &parent_key)), self.dialect)?;
                self.run_execute(&query, ctx)?;
                for id in ids {
                    self.connect_junction(junction, self_column, &parent_key, other_column, id, ctx)?;
                }
            }
            NestedWriteOp::Delete { filter: _ } => {
                let query = delete(junction, Some(&eq_filter(self_column, &parent_key)), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Update { filter, data } => {
                let scoped = scope_to_junction(
                    &related_descriptor.primary_key,
                    junction,
                    self_column,
                    other_column,
                    &parent_key,
                    self.dialect,
                    filter.clone(),
                );
                let query = update(related_table, data, Some(&scoped), self.dialect)?;
                self.run_execute(&query, ctx)?;
            }
            NestedWriteOp::Upsert { filter, create, update: update_data } => {
                let scoped = scope_to_junction(
                    &related_descriptor.primary_key,
                    junction,
                    self_column,
                    other_column,
                    &parent_key,
                    self.dialect,
                    Some(filter.clone()),
                );
                let probe = QueryRequest {
                    table: related_table.to_string(),
                    filter: Some(scoped.clone()),
                    limit: Some(1),
                    ..QueryRequest::default()
                };
                let query = select(&probe, self.dialect)?;
                let existing = self.run_query(&query, ctx)?;

                if existing.is_empty() {
                    let related =
                        self.insert_returning(related_table, &related_descriptor, create, ctx)?;
                    let other_key = record_value(&related, &related_descriptor.primary_key)?;
                    self.connect_junction(
                        junction, self_column, &parent_key, other_column, &other_key, ctx,
                    )?;
                } else {
                    let query = update(related_table, update_data, Some(&scoped), self.dialect)?;
                    self.run_execute(&query, ctx)?;
                }
            }
        }

        Ok(())
    }

    /// Junction inserts are idempotent: a duplicate-key failure means
    /// the rows are already connected.
    fn connect_junction(
        &self,
        junction: &str,
        self_column: &str,
        parent_key: &Value,
        other_column: &str,
        other_key: &Value,
        ctx: &CancelToken,
    ) -> Result<()> {
        let data = BTreeMap::from([
            (self_column.to_string(), parent_key.clone()),
            (other_column.to_string(), other_key.clone()),
        ]);
        let query = insert_plain(junction, &data, self.dialect);

        match self.run_execute(&query, ctx) {
            Ok(_) => Ok(()),
            Err(Error::Driver(error)) if is_duplicate_key(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }

    fn run_query(&self, query: &SqlQuery, ctx: &CancelToken) -> Result<modelql_core::ResultSet> {
        ctx.check()?;
        self.statements
            .get_or_prepare(self.connection.as_ref(), &query.sql)?;
        Ok(self.connection.query(&query.sql, &query.args, ctx)?)
    }

    fn run_execute(&self, query: &SqlQuery, ctx: &CancelToken) -> Result<u64> {
        ctx.check()?;
        self.statements
            .get_or_prepare(self.connection.as_ref(), &query.sql)?;
        Ok(self.connection.execute(&query.sql, &query.args, ctx)?)
    }

    fn invalidate_after_write(&self, request: &WriteRequest) {
        let Some(cache) = &self.result_cache else {
            return;
        };

        cache.invalidate_table(&request.table);
        for nested in &request.nested {
            if let Some(relation) = self.registry.relation(&request.table, &nested.relation) {
                cache.invalidate_table(&relation.related_table);
                if let Some(junction) = &relation.junction_table {
                    cache.invalidate_table(junction);
                }
            }
        }
    }
}

/// `fk = parent` AND the caller's own filter, when present.
fn scope_to_parent(fk: &str, parent_key: &Value, filter: Option<WhereNode>) -> WhereNode {
    let mut scoped = eq_filter(fk, parent_key);
    if let Some(filter) = filter.filter(|filter| !filter.is_empty()) {
        scoped.groups.push(filter);
    }
    scoped
}

/// `pk IN (SELECT other FROM junction WHERE self = parent)` AND the
/// caller's filter.
fn scope_to_junction(
    related_pk: &str,
    junction: &str,
    self_column: &str,
    other_column: &str,
    parent_key: &Value,
    dialect: SqlDialect,
    filter: Option<WhereNode>,
) -> WhereNode {
    let subquery_sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        dialect.quote_ident(other_column),
        dialect.quote_ident(junction),
        dialect.quote_ident(self_column),
        dialect.placeholder(1)
    );

    let mut scoped = WhereNode::all(vec![Condition::new(
        related_pk,
        CompareOp::In,
        ConditionValue::Subquery {
            sql: subquery_sql,
            args: vec![value_to_json(parent_key)],
        },
    )]);
    if let Some(filter) = filter.filter(|filter| !filter.is_empty()) {
        scoped.groups.push(filter);
    }
    scoped
}

fn eq_condition(field: &str, value: &Value) -> Condition {
    Condition::new(
        field,
        CompareOp::Eq,
        ConditionValue::Literal(value_to_json(value)),
    )
}

fn eq_filter(field: &str, value: &Value) -> WhereNode {
    WhereNode::all(vec![eq_condition(field, value)])
}

fn record_value(record: &Record, field: &str) -> Result<Value> {
    record
        .fields
        .get(field)
        .cloned()
        .ok_or_else(|| {
            Error::from(ScanError::MissingColumn {
                column: field.to_string(),
            })
        })
}

fn is_duplicate_key(error: &DriverError) -> bool {
    let message = error.message.to_ascii_lowercase();
    message.contains("duplicate") || message.contains("unique")
}

/// Plain insert without any returning clause, for junction rows whose
/// generated keys nobody reads.
fn insert_plain(table: &str, data: &BTreeMap<String, Value>, dialect: SqlDialect) -> SqlQuery {
    let mut args = Vec::with_capacity(data.len());
    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    for (column, value) in data {
        columns.push(dialect.quote_ident(column));
        args.push(value.clone());
        placeholders.push(dialect.placeholder(args.len()));
    }

    SqlQuery::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        ),
        args,
    )
}
