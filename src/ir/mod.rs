mod serializer;

pub use serializer::serialize;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Regex,
    In,
    Contains,
    StartsWith,
    Exists,
}

impl FilterOp {
    /// Canonical JSON mnemonic, e.g. `$eq`.
    pub fn mnemonic(self) -> &'static str {
        match self {
            FilterOp::Eq => "$eq",
            FilterOp::Ne => "$ne",
            FilterOp::Gt => "$gt",
            FilterOp::Gte => "$gte",
            FilterOp::Lt => "$lt",
            FilterOp::Lte => "$lte",
            FilterOp::Regex => "$regex",
            FilterOp::In => "$in",
            FilterOp::Contains => "$contains",
            FilterOp::StartsWith => "$startsWith",
            FilterOp::Exists => "$exists",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    None,
    And,
    Or,
}

/// `logic` describes how this filter connects to the *next* filter, not the
/// previous one; the last filter in a list carries `LogicOp::None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
    pub logic: LogicOp,
}

impl FilterExpr {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
            logic: LogicOp::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationFunc {
    pub fn mnemonic(self) -> &'static str {
        match self {
            AggregationFunc::Count => "$count",
            AggregationFunc::Sum => "$sum",
            AggregationFunc::Avg => "$avg",
            AggregationFunc::Min => "$min",
            AggregationFunc::Max => "$max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub output_name: String,
    pub func: AggregationFunc,
    /// `count` carries no field; every other function carries one.
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(Vec<u8>),
    Update(Vec<u8>),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Count,
    Exists,
    Aggregate,
}

/// The intermediate representation shared by the fluent builder and the
/// text parser, and consumed exactly once by the serializer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryIr {
    pub space: Option<String>,
    pub store: Option<String>,
    pub filters: Vec<FilterExpr>,
    pub projection: Option<Vec<String>>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub group_by: Vec<String>,
    pub aggregations: Vec<Aggregation>,
    pub mutation: Option<Mutation>,
    pub query_type: Option<QueryType>,
    pub id: Option<u128>,
}

impl QueryIr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this IR has reached a state that is executable: at least one
    /// of `{mutation, non-empty filters/modifiers}` is present. Scan and
    /// read-by-id are tracked outside the IR by the builder, which checks
    /// them first.
    pub fn has_query_content(&self) -> bool {
        !self.filters.is_empty()
            || self.limit.is_some()
            || self.skip.is_some()
            || !self.order_by.is_empty()
            || self.projection.is_some()
            || self.store.is_some()
            || !self.group_by.is_empty()
            || !self.aggregations.is_empty()
    }
}
