use crate::buffer_pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::fields::{FieldVal, IntField};
use crate::operator::OpIterator;
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// Drains `child`, deleting every tuple (identified by its `RecordId`)
/// through the buffer pool, and emits exactly one `(count)` tuple.
pub struct Delete<'a> {
    tid: TransactionId,
    buffer_pool: &'a BufferPool,
    child: Box<dyn OpIterator + 'a>,
    td: TupleDesc,
    done: bool,
}

impl<'a> Delete<'a> {
    pub fn new(tid: TransactionId, buffer_pool: &'a BufferPool, child: Box<dyn OpIterator + 'a>) -> Self {
        Delete {
            tid,
            buffer_pool,
            child,
            td: TupleDesc::new(vec![crate::types::Type::IntType], vec!["count".to_string()]),
            done: false,
        }
    }
}

impl<'a> OpIterator for Delete<'a> {
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
        while let Some(mut t) = self.child.next()? {
            let table_id = t
                .get_record_id()
                .ok_or(DbError::NotOnPage)?
                .get_page_id()
                .get_table_id();
            self.buffer_pool.delete_tuple(self.tid, table_id, &mut t)?;
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

    #[test]
    fn delete_removes_every_scanned_tuple() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let tid = TransactionId::new();
        let table = catalog.get_table_from_id(table_id).unwrap();
        for i in 0..4 {
            table
                .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(i))], &td()))
                .unwrap();
        }

        let scan = SeqScan::new(&bp, &catalog, tid, table_id, None).unwrap();
        let mut delete = Delete::new(tid, &bp, Box::new(scan));
        delete.open().unwrap();
        let count = delete.next().unwrap().unwrap();
        assert_eq!(count.get_field(0).unwrap().clone().into_int().unwrap().get_value(), 4);
        assert!(delete.next().unwrap().is_none());

        let mut verify = SeqScan::new(&bp, &catalog, tid, table_id, None).unwrap();
        verify.open().unwrap();
        assert!(verify.next().unwrap().is_none());
    }
}
