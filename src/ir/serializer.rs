use base64::Engine as _;

use super::{FilterExpr, LogicOp, Mutation, QueryIr, QueryType};
use crate::value::Value;

/// Serialize a `QueryIr` to the server's query JSON dialect.
///
/// Builds the JSON text directly rather than through a generic
/// `serde_json::Value` tree: rule 11's deliberate no-escaping of string
/// values, and the field-merging/group-splitting in rules 2-3, are not
/// expressible through a generic serializer without fighting its escaping
/// and key-ordering defaults. See `§9` for the rationale.
pub fn serialize(ir: &QueryIr) -> String {
    let mut out = String::from("{");
    out.push_str("\"filter\":");
    out.push_str(&serialize_filter(&ir.filters));

    if let Some(projection) = &ir.projection
        && !projection.is_empty()
    {
        out.push_str(",\"projection\":[");
        for (i, field) in projection.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(field);
            out.push('"');
        }
        out.push(']');
    }

    if !ir.order_by.is_empty() {
        out.push_str(",\"orderBy\":");
        if ir.order_by.len() == 1 {
            out.push_str(&serialize_order_entry(&ir.order_by[0]));
        } else {
            out.push('[');
            for (i, entry) in ir.order_by.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serialize_order_entry(entry));
            }
            out.push(']');
        }
    }

    if let Some(limit) = ir.limit {
        out.push_str(",\"limit\":");
        out.push_str(&limit.to_string());
    }

    if let Some(skip) = ir.skip {
        out.push_str(",\"skip\":");
        out.push_str(&skip.to_string());
    }

    if !ir.group_by.is_empty() {
        out.push_str(",\"group_by\":[");
        for (i, field) in ir.group_by.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(field);
            out.push('"');
        }
        out.push(']');
    }

    if !ir.aggregations.is_empty() {
        out.push_str(",\"aggregate\":{");
        for (i, agg) in ir.aggregations.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(&agg.output_name);
            out.push_str("\":{\"");
            out.push_str(agg.func.mnemonic());
            out.push_str("\":");
            match &agg.field {
                Some(field) => {
                    out.push('"');
                    out.push_str(field);
                    out.push('"');
                }
                None => out.push_str("true"),
            }
            out.push('}');
        }
        out.push('}');
    }

    if ir.query_type == Some(QueryType::Count) {
        out.push_str(",\"count\":true");
    }

    if let Some(mutation) = &ir.mutation {
        out.push_str(",\"mutation\":");
        out.push_str(&serialize_mutation(mutation));
    }

    out.push('}');
    out
}

fn serialize_order_entry(entry: &super::OrderBy) -> String {
    format!(
        "{{\"field\":\"{}\",\"direction\":\"{}\"}}",
        entry.field,
        entry.direction.as_str()
    )
}

fn serialize_mutation(mutation: &Mutation) -> String {
    match mutation {
        Mutation::Insert(bytes) => {
            format!(
                "{{\"type\":\"insert\",\"payload\":\"{}\"}}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            )
        }
        Mutation::Update(bytes) => {
            format!(
                "{{\"type\":\"update\",\"payload\":\"{}\"}}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            )
        }
        Mutation::Delete => "{\"type\":\"delete\"}".to_string(),
    }
}

/// Emit the `filter` value: `{}` when empty, a single AND-group object when
/// no filter carries `or` logic, or `{"$or":[group, ...]}` when at least one
/// does.
fn serialize_filter(filters: &[FilterExpr]) -> String {
    if filters.is_empty() {
        return "{}".to_string();
    }

    if filters.iter().any(|f| f.logic == LogicOp::Or) {
        let groups = split_into_or_groups(filters);
        let mut out = String::from("{\"$or\":[");
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&serialize_and_group(group));
        }
        out.push_str("]}");
        out
    } else {
        let group: Vec<&FilterExpr> = filters.iter().collect();
        serialize_and_group(&group)
    }
}

/// Split a filter list into groups bounded by `or` logic: a filter whose
/// `logic` is `Or` ends its group; the group count equals the number of
/// `or` occurrences plus one.
fn split_into_or_groups(filters: &[FilterExpr]) -> Vec<Vec<&FilterExpr>> {
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for filter in filters {
        current.push(filter);
        if filter.logic == LogicOp::Or {
            groups.push(std::mem::take(&mut current));
        }
    }
    groups.push(current);
    groups
}

/// Emit filters within one AND-group, field-major: multiple filters on the
/// same field merge into one object, preserving first-appearance order of
/// both fields and operators within a field.
fn serialize_and_group(filters: &[&FilterExpr]) -> String {
    let mut fields: Vec<(&str, Vec<(&FilterExpr,)>)> = Vec::new();
    for filter in filters {
        match fields.iter_mut().find(|(name, _)| *name == filter.field) {
            Some((_, entries)) => entries.push((filter,)),
            None => fields.push((filter.field.as_str(), vec![(filter,)])),
        }
    }

    let mut out = String::from("{");
    for (i, (field, entries)) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(field);
        out.push_str("\":{");
        for (j, (filter,)) in entries.iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            out.push('"');
            out.push_str(filter.op.mnemonic());
            out.push_str("\":");
            out.push_str(&serialize_value(&filter.value));
        }
        out.push('}');
    }
    out.push('}');
    out
}

/// Format a `Value` per rule 11: strings are wrapped in quotes verbatim with
/// no escaping (a documented, preserved quirk — see `§9`), integers as
/// base-10, floats with at least one fractional digit, booleans as
/// `true`/`false`, null as `null`, arrays comma-space separated.
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_value).collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

fn format_float(f: f64) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ir::{Aggregation, AggregationFunc, FilterOp, OrderBy, OrderDirection};

    #[test]
    fn empty_filter_case_scenario_5() {
        let mut ir = QueryIr::new();
        ir.space = Some("x".into());
        ir.store = Some("y".into());
        ir.limit = Some(5);
        let json = serialize(&ir);
        assert!(json.contains("\"filter\":{}"));
        assert!(json.contains("\"limit\":5"));
    }

    #[test]
    fn and_only_filter_serialization_scenario_3() {
        let mut ir = QueryIr::new();
        ir.filters.push(FilterExpr {
            logic: LogicOp::And,
            ..FilterExpr::new("MakeFlag", FilterOp::Eq, 1_i64)
        });
        ir.filters.push(FilterExpr::new("ListPrice", FilterOp::Gt, 100_i64));
        ir.order_by.push(OrderBy {
            field: "ListPrice".into(),
            direction: OrderDirection::Desc,
        });
        ir.limit = Some(10);
        let json = serialize(&ir);
        assert!(json.contains("\"filter\":{\"MakeFlag\":{\"$eq\":1},\"ListPrice\":{\"$gt\":100}}"));
        assert!(json.contains("\"orderBy\":{\"field\":\"ListPrice\",\"direction\":\"desc\"}"));
        assert!(json.contains("\"limit\":10"));
    }

    #[test]
    fn or_compound_filter_serialization_scenario_4() {
        let mut ir = QueryIr::new();
        ir.filters.push(FilterExpr {
            logic: LogicOp::Or,
            ..FilterExpr::new("Territory", FilterOp::Eq, "Northeast")
        });
        ir.filters.push(FilterExpr::new("Territory", FilterOp::Eq, "Australia"));
        let json = serialize(&ir);
        assert!(json.contains(
            "\"filter\":{\"$or\":[{\"Territory\":{\"$eq\":\"Northeast\"}},{\"Territory\":{\"$eq\":\"Australia\"}}]}"
        ));
    }

    #[test]
    fn aggregation_serialization_scenario_6() {
        let mut ir = QueryIr::new();
        ir.group_by.push("EmployeeID".into());
        ir.aggregations.push(Aggregation {
            output_name: "order_count".into(),
            func: AggregationFunc::Count,
            field: None,
        });
        ir.aggregations.push(Aggregation {
            output_name: "total_revenue".into(),
            func: AggregationFunc::Sum,
            field: Some("TotalDue".into()),
        });
        let json = serialize(&ir);
        assert!(json.contains("\"group_by\":[\"EmployeeID\"]"));
        assert!(json.contains(
            "\"aggregate\":{\"order_count\":{\"$count\":true},\"total_revenue\":{\"$sum\":\"TotalDue\"}}"
        ));
    }

    #[test]
    fn delete_mutation_serialization_scenario_9() {
        let mut ir = QueryIr::new();
        ir.filters.push(FilterExpr::new("status", FilterOp::Eq, "cancelled"));
        ir.mutation = Some(Mutation::Delete);
        let json = serialize(&ir);
        assert!(json.contains("\"mutation\":{\"type\":\"delete\"}"));
    }

    #[test]
    fn filter_key_always_present_invariant_3() {
        let ir = QueryIr::new();
        assert!(serialize(&ir).contains("\"filter\""));
    }

    #[test]
    fn or_group_count_matches_invariant_5() {
        let mut ir = QueryIr::new();
        ir.filters.push(FilterExpr {
            logic: LogicOp::Or,
            ..FilterExpr::new("a", FilterOp::Eq, 1_i64)
        });
        ir.filters.push(FilterExpr {
            logic: LogicOp::Or,
            ..FilterExpr::new("b", FilterOp::Eq, 2_i64)
        });
        ir.filters.push(FilterExpr::new("c", FilterOp::Eq, 3_i64));
        let json = serialize(&ir);
        // 2 `or` occurrences => 3 groups
        assert_eq!(json.matches("\"$eq\"").count(), 3);
        let groups = split_into_or_groups(&ir.filters);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn float_value_always_has_fractional_digit() {
        assert_eq!(serialize_value(&Value::Float(42.0)), "42.0");
        assert_eq!(serialize_value(&Value::Float(3.5)), "3.5");
    }

    #[test]
    fn string_value_is_not_escaped() {
        // Documented quirk preserved from the source behavior, not a regression.
        assert_eq!(serialize_value(&Value::String("a\"b".into())), "\"a\"b\"");
    }

    #[test]
    fn full_query_fixture_serializes_fields_in_declared_order() {
        let mut ir = QueryIr::new();
        ir.space = Some("shop".into());
        ir.store = Some("orders".into());
        ir.filters.push(FilterExpr::new("status", FilterOp::Eq, "open"));
        ir.projection = Some(vec!["id".into(), "total".into()]);
        ir.order_by.push(OrderBy { field: "total".into(), direction: OrderDirection::Desc });
        ir.limit = Some(20);
        ir.skip = Some(5);
        let json = serialize(&ir);
        assert_eq!(
            json,
            "{\"filter\":{\"status\":{\"$eq\":\"open\"}},\
             \"projection\":[\"id\",\"total\"],\
             \"orderBy\":{\"field\":\"total\",\"direction\":\"desc\"},\
             \"limit\":20,\
             \"skip\":5}"
        );
    }

    #[test]
    fn array_value_uses_comma_space_separator() {
        let v = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(serialize_value(&v), "[1, 2, 3]");
    }
}
