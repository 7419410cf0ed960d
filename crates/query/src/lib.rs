mod descriptor;
mod executor;
mod request;
mod sql;

pub use descriptor::{
    FieldDescriptor, FieldKind, ModelDescriptor, ModelRegistry, Record, RecordSink, RelationValue,
    RowSink,
};
pub use executor::{
    Executor, IncludeNode, JoinPlan, NestedWrite, NestedWriteOp, ResultCache, StatementCache,
    WriteOperation, WriteRequest, convert_cell, parse_datetime, plan_joins, scan_flat,
    scan_grouped,
};
pub use request::{
    CompareOp, Condition, ConditionValue, Include, JsonFilter, JsonFilterKind, LogicalOp,
    NestedInclude, OrderBy, QueryRequest, SortDir, WhereNode, json_to_value, value_to_json,
};
pub use sql::{
    Aggregate, AggregateFunc, Aggregation, CommonTableExpression, Join, JoinKind, MongoCommand,
    SqlQuery, WindowFunction, aggregate, delete, insert, mongo_delete, mongo_find, mongo_insert,
    mongo_upsert, render_where, select, select_with_cte, select_with_joins, select_with_windows,
    supports_window_functions, update, upsert,
};
