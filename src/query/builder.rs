use crate::client::ShinyDbClient;
use crate::error::{Error, Result};
use crate::ir::{
    Aggregation, AggregationFunc, FilterExpr, FilterOp, LogicOp, Mutation, OrderBy, OrderDirection, QueryIr,
    QueryType,
};
use crate::protocol::{Operation, Packet, Status};
use crate::value::Value;

/// Opaque collaborator for `create`/`update`; this crate does not define a
/// document byte format (BSON or otherwise), it only requires some encoder.
pub trait DocumentEncoder {
    fn encode(&self) -> Vec<u8>;
}

/// Owned result of `run()`. `data` carries any payload bytes the reply
/// referenced, already copied out of the wire buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Option<Vec<u8>>,
    pub count: u32,
}

/// Fluent query builder: holds the active client, optional namespace
/// components, the shared IR, and optional read-by-id/scan parameters.
/// Every mutator consumes and returns `Self` so calls chain left to right.
pub struct ShinyDbQuery<'a> {
    client: &'a mut ShinyDbClient,
    space_name: Option<String>,
    store_name: Option<String>,
    index_name: Option<String>,
    ir: QueryIr,
    read_by_id_value: Option<u128>,
    scan_params: Option<(Option<u128>, u32)>,
}

impl<'a> ShinyDbQuery<'a> {
    pub fn new(client: &'a mut ShinyDbClient) -> Self {
        Self {
            client,
            space_name: None,
            store_name: None,
            index_name: None,
            ir: QueryIr::new(),
            read_by_id_value: None,
            scan_params: None,
        }
    }

    /// Builds a query from an externally-constructed `QueryIr`, e.g. the
    /// output of `query::parse`. `space`/`store` are lifted out of the IR
    /// into the namespace fields `run()` already dispatches on, so a
    /// parser-produced IR executes through the exact same path as one built
    /// fluently through this type.
    pub fn from_ir(client: &'a mut ShinyDbClient, ir: QueryIr) -> Self {
        Self {
            client,
            space_name: ir.space.clone(),
            store_name: ir.store.clone(),
            index_name: None,
            ir,
            read_by_id_value: None,
            scan_params: None,
        }
    }

    pub fn space(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.ir.space = Some(name.clone());
        self.space_name = Some(name);
        self
    }

    pub fn store(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.ir.store = Some(name.clone());
        self.store_name = Some(name);
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    pub fn r#where(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.ir.filters.push(FilterExpr::new(field, op, value));
        self
    }

    pub fn and(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        if let Some(last) = self.ir.filters.last_mut() {
            last.logic = LogicOp::And;
        }
        self.ir.filters.push(FilterExpr::new(field, op, value));
        self
    }

    pub fn or(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        if let Some(last) = self.ir.filters.last_mut() {
            last.logic = LogicOp::Or;
        }
        self.ir.filters.push(FilterExpr::new(field, op, value));
        self
    }

    /// Replaces any existing ordering with a single entry; the wire dialect
    /// only supports one.
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.ir.order_by = vec![OrderBy { field: field.into(), direction }];
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.ir.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: u32) -> Self {
        self.ir.skip = Some(n);
        self
    }

    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.ir.projection = Some(fields);
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.ir.group_by.push(field.into());
        self
    }

    pub fn count(mut self, name: impl Into<String>) -> Self {
        self.ir.aggregations.push(Aggregation { output_name: name.into(), func: AggregationFunc::Count, field: None });
        self.ir.query_type = Some(QueryType::Count);
        self
    }

    pub fn sum(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.push_aggregate(name, AggregationFunc::Sum, field)
    }

    pub fn avg(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.push_aggregate(name, AggregationFunc::Avg, field)
    }

    pub fn min(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.push_aggregate(name, AggregationFunc::Min, field)
    }

    pub fn max(self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.push_aggregate(name, AggregationFunc::Max, field)
    }

    fn push_aggregate(mut self, name: impl Into<String>, func: AggregationFunc, field: impl Into<String>) -> Self {
        self.ir.aggregations.push(Aggregation { output_name: name.into(), func, field: Some(field.into()) });
        self
    }

    pub fn create(mut self, document: &dyn DocumentEncoder) -> Self {
        self.ir.mutation = Some(Mutation::Insert(document.encode()));
        self
    }

    pub fn update(mut self, document: &dyn DocumentEncoder) -> Self {
        self.ir.mutation = Some(Mutation::Update(document.encode()));
        self
    }

    pub fn delete(mut self) -> Self {
        self.ir.mutation = Some(Mutation::Delete);
        self
    }

    pub fn read_by_id(mut self, id: u128) -> Self {
        self.read_by_id_value = Some(id);
        self
    }

    pub fn scan(mut self, count: u32, start_key: Option<u128>) -> Self {
        self.scan_params = Some((start_key, count));
        self
    }

    fn namespace(&self) -> Result<String> {
        let space = self.space_name.clone().ok_or(Error::NoSpaceSpecified)?;
        let mut parts = vec![space];
        if let Some(store) = &self.store_name {
            parts.push(store.clone());
        }
        if let Some(index) = &self.index_name {
            parts.push(index.clone());
        }
        Ok(parts.join("."))
    }

    /// Dispatches by precedence: scan, then read-by-id, then mutation, then
    /// aggregate, then general query content; fails `NoOperation` if none of
    /// those apply.
    pub fn run(self) -> Result<QueryResponse> {
        if let Some((start_key, count)) = self.scan_params {
            let namespace = self.namespace()?;
            let packet = self.client.do_operation(Operation::Scan { namespace, start_key, count })?;
            return handle_reply(packet, Error::ScanFailed);
        }

        if let Some(id) = self.read_by_id_value {
            let namespace = self.namespace()?;
            let packet = self.client.do_operation(Operation::Read { namespace, id })?;
            return handle_read_reply(packet);
        }

        if let Some(mutation) = self.ir.mutation.clone() {
            let namespace = self.namespace()?;
            let payload = crate::ir::serialize(&self.ir).into_bytes();
            return match mutation {
                Mutation::Insert(_) => {
                    let packet = self.client.do_operation(Operation::Insert { namespace, payload })?;
                    handle_reply(packet, Error::OperationFailed)
                }
                Mutation::Update(_) => {
                    let packet = self.client.do_operation(Operation::Update { namespace, payload })?;
                    handle_reply(packet, Error::UpdateFailed)
                }
                Mutation::Delete => {
                    let packet = self.client.do_operation(Operation::Delete { namespace, payload })?;
                    handle_reply(packet, Error::DeleteFailed)
                }
            };
        }

        if !self.ir.aggregations.is_empty() {
            let namespace = self.namespace()?;
            let payload = crate::ir::serialize(&self.ir).into_bytes();
            let packet = self.client.do_operation(Operation::Aggregate { namespace, payload })?;
            return handle_reply(packet, Error::AggregateFailed);
        }

        if self.ir.has_query_content() {
            let namespace = self.namespace()?;
            let payload = crate::ir::serialize(&self.ir).into_bytes();
            let packet = self.client.do_operation(Operation::Query { namespace, payload })?;
            return handle_reply(packet, Error::QueryFailed);
        }

        Err(Error::NoOperation)
    }
}

fn handle_read_reply(packet: Packet) -> Result<QueryResponse> {
    match packet.operation {
        Operation::Reply { status: Status::Ok, payload } => {
            let count = if payload.is_some() { 1 } else { 0 };
            Ok(QueryResponse { success: true, data: payload, count })
        }
        Operation::Reply { status: Status::Error, .. } => Err(Error::DocumentNotFound),
        _ => Err(Error::InvalidResponse("expected a reply packet".into())),
    }
}

fn handle_reply(packet: Packet, err: impl Fn(String) -> Error) -> Result<QueryResponse> {
    match packet.operation {
        Operation::Reply { status: Status::Ok, payload } => {
            let count = if payload.is_some() { 1 } else { 0 };
            Ok(QueryResponse { success: true, data: payload, count })
        }
        Operation::Reply { status: Status::Error, payload } => {
            let message = payload.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()).unwrap_or_default();
            Err(err(message))
        }
        _ => Err(Error::InvalidResponse("expected a reply packet".into())),
    }
}
