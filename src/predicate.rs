use crate::fields::FieldVal;
use crate::tuple::Tuple;

/// Comparison operators shared by `Filter` and `Join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

/// A single-tuple predicate used by `Filter`: `t[field] op value`.
#[derive(Debug, Clone)]
pub struct Predicate {
    field_index: usize,
    op: Op,
    operand: FieldVal,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, operand: FieldVal) -> Self {
        Predicate {
            field_index,
            op,
            operand,
        }
    }

    pub fn filter(&self, t: &Tuple) -> bool {
        match t.get_field(self.field_index) {
            Some(field) => field.compare(self.op, &self.operand),
            None => false,
        }
    }
}

/// A two-tuple predicate used by `Join`: `left[leftField] op right[rightField]`.
#[derive(Debug, Clone, Copy)]
pub struct JoinPredicate {
    left_field: usize,
    op: Op,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: Op, right_field: usize) -> Self {
        JoinPredicate {
            left_field,
            op,
            right_field,
        }
    }

    pub fn get_op(&self) -> Op {
        self.op
    }

    pub fn get_left_field(&self) -> usize {
        self.left_field
    }

    pub fn get_right_field(&self) -> usize {
        self.right_field
    }

    pub fn filter(&self, left: &Tuple, right: &Tuple) -> bool {
        match (
            left.get_field(self.left_field),
            right.get_field(self.right_field),
        ) {
            (Some(l), Some(r)) => l.compare(self.op, r),
            _ => false,
        }
    }
}
