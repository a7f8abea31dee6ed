use std::collections::HashMap;

use crate::error::{DbError, DbResult};
use crate::fields::{FieldVal, IntField};
use crate::operator::OpIterator;
use crate::tuple::{Tuple, TupleDesc};
use crate::types::Type;

pub const NO_GROUPING: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    min: Option<i32>,
    max: Option<i32>,
    sum: i64,
    count: i64,
}

impl Accumulator {
    fn merge(&mut self, value: i32) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.sum += value as i64;
        self.count += 1;
    }

    fn result(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Min => self.min.unwrap_or(0),
            AggOp::Max => self.max.unwrap_or(0),
            AggOp::Sum => self.sum as i32,
            AggOp::Count => self.count as i32,
            AggOp::Avg => {
                if self.count == 0 {
                    0
                } else {
                    (self.sum / self.count) as i32
                }
            }
        }
    }
}

/// Streaming group-by aggregation over integer-valued fields.
pub struct IntegerAggregator {
    gbfield: usize,
    gbtype: Option<Type>,
    afield: usize,
    op: AggOp,
    groups: HashMap<Option<FieldVal>, Accumulator>,
}

impl IntegerAggregator {
    pub fn new(gbfield: usize, gbtype: Option<Type>, afield: usize, op: AggOp) -> Self {
        IntegerAggregator {
            gbfield,
            gbtype,
            afield,
            op,
            groups: HashMap::new(),
        }
    }

    pub fn merge_tuple(&mut self, t: &Tuple) -> DbResult<()> {
        let key = self.group_key(t)?;
        let value = t
            .get_field(self.afield)
            .and_then(|f| f.clone().into_int())
            .ok_or_else(|| DbError::NoSuchElement("aggregate field is not an int".to_string()))?
            .get_value();
        self.groups.entry(key).or_default().merge(value);
        Ok(())
    }

    fn group_key(&self, t: &Tuple) -> DbResult<Option<FieldVal>> {
        if self.gbfield == NO_GROUPING {
            return Ok(None);
        }
        t.get_field(self.gbfield)
            .cloned()
            .map(Some)
            .ok_or_else(|| DbError::NoSuchElement("group-by field missing".to_string()))
    }

    pub fn iterator(&self) -> DbResult<Vec<Tuple>> {
        let td = self.get_tuple_desc();
        if self.groups.is_empty() {
            if self.gbfield == NO_GROUPING && self.op == AggOp::Count {
                return Ok(vec![Tuple::new(vec![FieldVal::IntField(IntField::new(0))], &td)]);
            }
            return Ok(vec![]);
        }
        let mut rows = vec![];
        for (key, acc) in self.groups.iter() {
            let value = FieldVal::IntField(IntField::new(acc.result(self.op)));
            let fields = match key {
                Some(k) => vec![k.clone(), value],
                None => vec![value],
            };
            rows.push(Tuple::new(fields, &td));
        }
        Ok(rows)
    }

    pub fn get_tuple_desc(&self) -> TupleDesc {
        if self.gbfield == NO_GROUPING {
            TupleDesc::new(vec![Type::IntType], vec!["aggregateValue".to_string()])
        } else {
            TupleDesc::new(
                vec![self.gbtype.clone().unwrap_or(Type::IntType), Type::IntType],
                vec!["groupValue".to_string(), "aggregateValue".to_string()],
            )
        }
    }
}

/// Group-by aggregation over string-valued fields; only COUNT is
/// meaningful for a string, so any other `op` is rejected at
/// construction time.
pub struct StringAggregator {
    gbfield: usize,
    gbtype: Option<Type>,
    afield: usize,
    groups: HashMap<Option<FieldVal>, i64>,
}

impl StringAggregator {
    pub fn new(gbfield: usize, gbtype: Option<Type>, afield: usize, op: AggOp) -> DbResult<Self> {
        if op != AggOp::Count {
            return Err(DbError::InvalidIteratorState(
                "StringAggregator only supports COUNT".to_string(),
            ));
        }
        Ok(StringAggregator {
            gbfield,
            gbtype,
            afield,
            groups: HashMap::new(),
        })
    }

    pub fn merge_tuple(&mut self, t: &Tuple) -> DbResult<()> {
        let key = if self.gbfield == NO_GROUPING {
            None
        } else {
            Some(
                t.get_field(self.gbfield)
                    .cloned()
                    .ok_or_else(|| DbError::NoSuchElement("group-by field missing".to_string()))?,
            )
        };
        if t.get_field(self.afield).is_none() {
            return Err(DbError::NoSuchElement("aggregate field missing".to_string()));
        }
        *self.groups.entry(key).or_insert(0) += 1;
        Ok(())
    }

    pub fn iterator(&self) -> DbResult<Vec<Tuple>> {
        let td = self.get_tuple_desc();
        if self.groups.is_empty() {
            if self.gbfield == NO_GROUPING {
                return Ok(vec![Tuple::new(vec![FieldVal::IntField(IntField::new(0))], &td)]);
            }
            return Ok(vec![]);
        }
        let mut rows = vec![];
        for (key, count) in self.groups.iter() {
            let value = FieldVal::IntField(IntField::new(*count as i32));
            let fields = match key {
                Some(k) => vec![k.clone(), value],
                None => vec![value],
            };
            rows.push(Tuple::new(fields, &td));
        }
        Ok(rows)
    }

    pub fn get_tuple_desc(&self) -> TupleDesc {
        if self.gbfield == NO_GROUPING {
            TupleDesc::new(vec![Type::IntType], vec!["aggregateValue".to_string()])
        } else {
            TupleDesc::new(
                vec![self.gbtype.clone().unwrap_or(Type::StringType), Type::IntType],
                vec!["groupValue".to_string(), "aggregateValue".to_string()],
            )
        }
    }
}

enum Aggregator {
    Int(IntegerAggregator),
    Str(StringAggregator),
}

impl Aggregator {
    fn merge_tuple(&mut self, t: &Tuple) -> DbResult<()> {
        match self {
            Aggregator::Int(a) => a.merge_tuple(t),
            Aggregator::Str(a) => a.merge_tuple(t),
        }
    }

    fn iterator(&self) -> DbResult<Vec<Tuple>> {
        match self {
            Aggregator::Int(a) => a.iterator(),
            Aggregator::Str(a) => a.iterator(),
        }
    }

    fn get_tuple_desc(&self) -> TupleDesc {
        match self {
            Aggregator::Int(a) => a.get_tuple_desc(),
            Aggregator::Str(a) => a.get_tuple_desc(),
        }
    }
}

/// Drains `child` on first `next`, building the appropriate aggregator
/// for the aggregate field's type, then re-emits its grouped results.
/// The output field naming follows `op(childFieldName)`.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    afield: usize,
    gbfield: usize,
    op: AggOp,
    td: TupleDesc,
    aggregator: Option<Aggregator>,
    rows: Vec<Tuple>,
    idx: usize,
}

impl Aggregate {
    pub fn new(child: Box<dyn OpIterator>, afield: usize, gbfield: usize, op: AggOp) -> Self {
        let child_td = child.get_tuple_desc();
        let op_name = match op {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        let afield_name = child_td
            .get_field_name(afield)
            .cloned()
            .unwrap_or_else(|| afield.to_string());
        let agg_col = format!("{}({})", op_name, afield_name);

        let td = if gbfield == NO_GROUPING {
            TupleDesc::new(vec![Type::IntType], vec![agg_col])
        } else {
            let gb_name = child_td
                .get_field_name(gbfield)
                .cloned()
                .unwrap_or_else(|| gbfield.to_string());
            let gbtype = child_td.get_field_type(gbfield).cloned().unwrap_or(Type::IntType);
            TupleDesc::new(vec![gbtype, Type::IntType], vec![gb_name, agg_col])
        };

        Aggregate {
            child,
            afield,
            gbfield,
            op,
            td,
            aggregator: None,
            rows: vec![],
            idx: 0,
        }
    }

    fn drain(&mut self) -> DbResult<()> {
        let child_td = self.child.get_tuple_desc().clone();
        let gbtype = if self.gbfield == NO_GROUPING {
            None
        } else {
            child_td.get_field_type(self.gbfield).cloned()
        };
        let is_string_field = matches!(child_td.get_field_type(self.afield), Some(Type::StringType));
        let mut aggregator = if is_string_field {
            Aggregator::Str(StringAggregator::new(self.gbfield, gbtype, self.afield, self.op)?)
        } else {
            Aggregator::Int(IntegerAggregator::new(self.gbfield, gbtype, self.afield, self.op))
        };
        while let Some(t) = self.child.next()? {
            aggregator.merge_tuple(&t)?;
        }
        self.rows = aggregator.iterator()?;
        self.aggregator = Some(aggregator);
        self.idx = 0;
        Ok(())
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.aggregator = None;
        self.rows.clear();
        self.idx = 0;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if self.aggregator.is_none() {
            self.drain()?;
        }
        Ok(self.idx < self.rows.len())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.has_next()? {
            return Ok(None);
        }
        let t = self.rows[self.idx].clone();
        self.idx += 1;
        Ok(Some(t))
    }

    fn close(&mut self) {
        self.child.close();
        self.aggregator = None;
        self.rows.clear();
        self.idx = 0;
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.idx = 0;
        Ok(())
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, mut children: Vec<Box<dyn OpIterator>>) {
        if let Some(child) = children.pop() {
            self.child = child;
        }
    }
}
