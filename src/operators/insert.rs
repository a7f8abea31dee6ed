use crate::buffer_pool::BufferPool;
use crate::error::DbResult;
use crate::fields::{FieldVal, IntField};
use crate::operator::OpIterator;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// Drains `child`, inserting every tuple into `table_id` through the
/// buffer pool, and emits exactly one `(count)` tuple; every call
/// after that returns end-of-stream.
pub struct Insert<'a> {
    tid: TransactionId,
    buffer_pool: &'a BufferPool,
    table_id: usize,
    child: Box<dyn OpIterator + 'a>,
    td: TupleDesc,
    done: bool,
}

impl<'a> Insert<'a> {
    pub fn new(
        tid: TransactionId,
        buffer_pool: &'a BufferPool,
        table_id: usize,
        child: Box<dyn OpIterator + 'a>,
    ) -> Self {
        Insert {
            tid,
            buffer_pool,
            table_id,
            child,
            td: TupleDesc::new(vec![crate::types::Type::IntType], vec!["count".to_string()]),
            done: false,
        }
    }
}

impl<'a> OpIterator for Insert<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(!self.done)
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        let mut count = 0i32;
        while let Some(t) = self.child.next()? {
            self.buffer_pool.insert_tuple(self.tid, self.table_id, t)?;
            count += 1;
        }
        self.done = true;
        Ok(Some(Tuple::new(vec![FieldVal::IntField(IntField::new(count))], &self.td)))
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, mut children: Vec<Box<dyn OpIterator>>) {
        // `Box<dyn OpIterator>` is implicitly `'static`, and trait-object
        // lifetime bounds are covariant, so it coerces into our
        // `'a`-bounded child slot for any `'a`.
        if let Some(child) = children.pop() {
            self.child = child;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::heap_file::HeapFile;
    use crate::operators::seq_scan::SeqScan;
    use std::sync::Arc;
    use tempfile::tempfile;

    fn td() -> TupleDesc {
        TupleDesc::new(vec![crate::types::Type::IntType], vec!["a".to_string()])
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

    #[test]
    fn insert_emits_count_then_end_of_stream() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let tid = TransactionId::new();

        let rows = (0..3)
            .map(|i| Tuple::new(vec![FieldVal::IntField(IntField::new(i))], &td()))
            .collect();
        let scan = VecScan { td: td(), rows, idx: 0 };
        let mut insert = Insert::new(tid, &bp, table_id, Box::new(scan));
        insert.open().unwrap();
        let first = insert.next().unwrap().unwrap();
        assert_eq!(first.get_field(0).unwrap().clone().into_int().unwrap().get_value(), 3);
        assert!(insert.next().unwrap().is_none());

        let mut verify = SeqScan::new(&bp, &catalog, tid, table_id, None).unwrap();
        verify.open().unwrap();
        let mut seen = 0;
        while verify.next().unwrap().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 3);
    }
}
