use crate::error::DbResult;
use crate::operator::{LookAhead, OpIterator};
use crate::predicate::Predicate;
use crate::tuple::{Tuple, TupleDesc};

/// Passes through only the child's tuples that satisfy `predicate`.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    look_ahead: LookAhead,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Filter {
            predicate,
            child,
            look_ahead: LookAhead::new(),
        }
    }

    fn fetch_next(predicate: &Predicate, child: &mut dyn OpIterator) -> DbResult<Option<Tuple>> {
        while let Some(t) = child.next()? {
            if predicate.filter(&t) {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.look_ahead.reset();
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        let predicate = &self.predicate;
        let child = self.child.as_mut();
        self.look_ahead.has_next(|| Self::fetch_next(predicate, child))
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        let predicate = &self.predicate;
        let child = self.child.as_mut();
        self.look_ahead.next(|| Self::fetch_next(predicate, child))
    }

    fn close(&mut self) {
        self.child.close();
        self.look_ahead.reset();
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        self.child.get_tuple_desc()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, IntField};
    use crate::predicate::Op;
    use crate::tuple::TupleDesc;
    use crate::types::Type;

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

    #[test]
    fn filter_keeps_only_matching_rows() {
        let td = TupleDesc::new(vec![Type::IntType], vec!["a".to_string()]);
        let rows = (0..5)
            .map(|i| Tuple::new(vec![FieldVal::IntField(IntField::new(i))], &td))
            .collect();
        let scan = VecScan { td: td.clone(), rows, idx: 0 };
        let pred = crate::predicate::Predicate::new(0, Op::GreaterThanOrEq, FieldVal::IntField(IntField::new(3)));
        let mut filter = Filter::new(pred, Box::new(scan));
        filter.open().unwrap();
        let mut out = vec![];
        while let Some(t) = filter.next().unwrap() {
            out.push(t.get_field(0).unwrap().clone().into_int().unwrap().get_value());
        }
        assert_eq!(out, vec![3, 4]);
    }
}
