use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::DbResult;
use crate::fields::FieldVal;
use crate::operator::{LookAhead, OpIterator};
use crate::predicate::{JoinPredicate, Op};
use crate::tuple::{Tuple, TupleDesc};

fn field_lt(a: &FieldVal, b: &FieldVal) -> bool {
    a.compare(Op::LessThan, b)
}

fn field_cmp(a: &FieldVal, b: &FieldVal) -> Ordering {
    if field_lt(a, b) {
        Ordering::Less
    } else if field_lt(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Enumeration state built once both children have been drained: two
/// hash tables keyed on the join field, their keys sorted, and a
/// `(i, j, a, b)` cursor over candidate bucket pairs.
struct JoinState {
    left_buckets: Vec<Vec<Tuple>>,
    right_buckets: Vec<Vec<Tuple>>,
    /// `[lo, hi)` range into `right_buckets` that could satisfy `op`
    /// against `left_buckets[i]`'s key, precomputed from the sorted
    /// key order so advancement does work proportional to the result.
    j_range: Vec<(usize, usize)>,
    i: usize,
    j: usize,
    a: usize,
    b: usize,
}

impl JoinState {
    fn build(op: Op, left_field: usize, right_field: usize, left: Vec<Tuple>, right: Vec<Tuple>) -> Self {
        let mut left_groups: HashMap<FieldVal, Vec<Tuple>> = HashMap::new();
        for t in left {
            if let Some(k) = t.get_field(left_field) {
                left_groups.entry(k.clone()).or_default().push(t);
            }
        }
        let mut right_groups: HashMap<FieldVal, Vec<Tuple>> = HashMap::new();
        for t in right {
            if let Some(k) = t.get_field(right_field) {
                right_groups.entry(k.clone()).or_default().push(t);
            }
        }

        if op == Op::Equals {
            let common: Vec<FieldVal> = left_groups
                .keys()
                .filter(|k| right_groups.contains_key(*k))
                .cloned()
                .collect();
            left_groups.retain(|k, _| common.contains(k));
            right_groups.retain(|k, _| common.contains(k));
        }

        let mut k1: Vec<FieldVal> = left_groups.keys().cloned().collect();
        k1.sort_by(field_cmp);
        let mut k2: Vec<FieldVal> = right_groups.keys().cloned().collect();
        k2.sort_by(field_cmp);

        let left_buckets: Vec<Vec<Tuple>> = k1.iter().map(|k| left_groups.remove(k).unwrap()).collect();
        let right_buckets: Vec<Vec<Tuple>> = k2.iter().map(|k| right_groups.remove(k).unwrap()).collect();

        let j_range = k1
            .iter()
            .map(|key| match op {
                Op::Equals => match k2.binary_search_by(|k| field_cmp(k, key)) {
                    Ok(idx) => (idx, idx + 1),
                    Err(_) => (0, 0),
                },
                Op::NotEquals => (0, k2.len()),
                Op::GreaterThan => (0, k2.partition_point(|k| field_lt(k, key))),
                Op::GreaterThanOrEq => (0, k2.partition_point(|k| field_lt(k, key) || k == key)),
                Op::LessThan => (k2.partition_point(|k| !field_lt(key, k)), k2.len()),
                Op::LessThanOrEq => (k2.partition_point(|k| field_lt(k, key)), k2.len()),
                Op::Like => (0, k2.len()),
            })
            .collect();

        JoinState {
            left_buckets,
            right_buckets,
            j_range,
            i: 0,
            j: 0,
            a: 0,
            b: 0,
        }
    }

    fn reset_cursor(&mut self) {
        self.i = 0;
        self.j = 0;
        self.a = 0;
        self.b = 0;
    }

    /// Returns the next candidate `(left, right)` pair in `(i, j, a, b)`
    /// order — innermost `b`, then `a`, then `j`, then `i` — or `None`
    /// once every candidate bucket pair has been exhausted.
    fn next_candidate(&mut self) -> Option<(Tuple, Tuple)> {
        loop {
            if self.i >= self.left_buckets.len() {
                return None;
            }
            let (lo, hi) = self.j_range[self.i];
            if self.j < lo {
                self.j = lo;
                self.a = 0;
                self.b = 0;
            }
            if self.j >= hi {
                self.i += 1;
                self.j = 0;
                self.a = 0;
                self.b = 0;
                continue;
            }
            let left_bucket = &self.left_buckets[self.i];
            if self.a >= left_bucket.len() {
                self.a = 0;
                self.j += 1;
                continue;
            }
            let right_bucket = &self.right_buckets[self.j];
            if self.b >= right_bucket.len() {
                self.b = 0;
                self.a += 1;
                continue;
            }
            let pair = (left_bucket[self.a].clone(), right_bucket[self.b].clone());
            self.b += 1;
            return Some(pair);
        }
    }
}

/// General theta-join: hash both children on the join field, then
/// enumerate candidate bucket pairs pruned by sort order on the
/// operator, emitting `left ∥ right` for every pair that satisfies
/// `predicate`.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator>,
    right: Box<dyn OpIterator>,
    td: TupleDesc,
    state: Option<JoinState>,
    look_ahead: LookAhead,
}

impl Join {
    pub fn new(predicate: JoinPredicate, left: Box<dyn OpIterator>, right: Box<dyn OpIterator>) -> Self {
        let td = TupleDesc::merge(left.get_tuple_desc(), right.get_tuple_desc());
        Join {
            predicate,
            left,
            right,
            td,
            state: None,
            look_ahead: LookAhead::new(),
        }
    }

    fn drain(&mut self) -> DbResult<()> {
        let mut left_rows = vec![];
        while let Some(t) = self.left.next()? {
            left_rows.push(t);
        }
        let mut right_rows = vec![];
        while let Some(t) = self.right.next()? {
            right_rows.push(t);
        }
        self.state = Some(JoinState::build(
            self.predicate.get_op(),
            self.predicate.get_left_field(),
            self.predicate.get_right_field(),
            left_rows,
            right_rows,
        ));
        Ok(())
    }

    fn fetch_next(predicate: &JoinPredicate, state: &mut Option<JoinState>) -> DbResult<Option<Tuple>> {
        let state = match state {
            Some(s) => s,
            None => return Ok(None),
        };
        while let Some((t1, t2)) = state.next_candidate() {
            if predicate.filter(&t1, &t2) {
                return Ok(Some(Tuple::concat(&t1, &t2)));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Join {
    fn open(&mut self) -> DbResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.state = None;
        self.look_ahead.reset();
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if self.state.is_none() {
            self.drain()?;
        }
        let predicate = &self.predicate;
        let state = &mut self.state;
        self.look_ahead.has_next(|| Self::fetch_next(predicate, state))
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.state.is_none() {
            self.drain()?;
        }
        let predicate = &self.predicate;
        let state = &mut self.state;
        self.look_ahead.next(|| Self::fetch_next(predicate, state))
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.state = None;
        self.look_ahead.reset();
    }

    fn rewind(&mut self) -> DbResult<()> {
        if let Some(state) = &mut self.state {
            state.reset_cursor();
        }
        self.look_ahead.reset();
        Ok(())
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }

    fn set_children(&mut self, mut children: Vec<Box<dyn OpIterator>>) {
        if children.len() == 2 {
            self.right = children.pop().unwrap();
            self.left = children.pop().unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::IntField;
    use crate::types::Type;

    fn td2() -> TupleDesc {
        TupleDesc::new(
            vec![Type::IntType, Type::IntType],
            vec!["a".to_string(), "b".to_string()],
        )
    }

    fn td3() -> TupleDesc {
        TupleDesc::new(
            vec![Type::IntType, Type::IntType, Type::IntType],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )
    }

    struct VecScan {
        td: TupleDesc,
        rows: Vec<Tuple>,
        idx: usize,
    }
    impl OpIterator for VecScan {
        fn open(&mut self) -> DbResult<()> {
            self.idx = 0;
            Ok(())
        }
        fn has_next(&mut self) -> DbResult<bool> {
            Ok(self.idx < self.rows.len())
        }
        fn next(&mut self) -> DbResult<Option<Tuple>> {
            if self.idx >= self.rows.len() {
                return Ok(None);
            }
            let t = self.rows[self.idx].clone();
            self.idx += 1;
            Ok(Some(t))
        }
        fn close(&mut self) {}
        fn get_tuple_desc(&self) -> &TupleDesc {
            &self.td
        }
    }

    fn row2(a: i32, b: i32) -> Tuple {
        Tuple::new(
            vec![FieldVal::IntField(IntField::new(a)), FieldVal::IntField(IntField::new(b))],
            &td2(),
        )
    }

    fn row3(a: i32, b: i32, c: i32) -> Tuple {
        Tuple::new(
            vec![
                FieldVal::IntField(IntField::new(a)),
                FieldVal::IntField(IntField::new(b)),
                FieldVal::IntField(IntField::new(c)),
            ],
            &td3(),
        )
    }

    fn r1() -> Vec<Tuple> {
        vec![row2(1, 2), row2(3, 4), row2(5, 6), row2(7, 8)]
    }
    fn r2() -> Vec<Tuple> {
        vec![row3(1, 2, 3), row3(2, 3, 4), row3(3, 4, 5), row3(4, 5, 6), row3(5, 6, 7)]
    }

    #[test]
    fn equi_join_matches_scenario_s1() {
        let left = VecScan { td: td2(), rows: r1(), idx: 0 };
        let right = VecScan { td: td3(), rows: r2(), idx: 0 };
        let pred = JoinPredicate::new(0, Op::Equals, 0);
        let mut join = Join::new(pred, Box::new(left), Box::new(right));
        join.open().unwrap();
        let mut out = vec![];
        while let Some(t) = join.next().unwrap() {
            out.push(
                t.get_fields()
                    .iter()
                    .map(|f| f.clone().into_int().unwrap().get_value())
                    .collect::<Vec<_>>(),
            );
        }
        out.sort();
        assert_eq!(
            out,
            vec![
                vec![1, 2, 1, 2, 3],
                vec![3, 4, 3, 4, 5],
                vec![5, 6, 5, 6, 7],
            ]
        );
    }

    #[test]
    fn greater_than_join_matches_scenario_s2() {
        let left = VecScan { td: td2(), rows: r1(), idx: 0 };
        let right = VecScan { td: td3(), rows: r2(), idx: 0 };
        let pred = JoinPredicate::new(0, Op::GreaterThan, 0);
        let mut join = Join::new(pred, Box::new(left), Box::new(right));
        join.open().unwrap();
        let mut count = 0;
        while join.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 11);
    }
}
