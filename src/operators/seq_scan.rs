use std::sync::{Arc, RwLock};

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::heap_file::HeapFile;
use crate::heap_page::{HeapPage, HeapPageId, Permission};
use crate::operator::OpIterator;
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Tuple, TupleDesc};

/// Leaf operator: a full scan of one table's pages, in page then
/// in-page slot order. Field names are reported prefixed by `alias`
/// (or the table name, if no alias was given) so a self-join of the
/// same table produces disambiguated field names downstream.
pub struct SeqScan<'a> {
    buffer_pool: &'a BufferPool,
    table: Arc<HeapFile>,
    tid: TransactionId,
    td: TupleDesc,
    page_no: usize,
    slot_no: usize,
    current_page: Option<Arc<RwLock<HeapPage>>>,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        buffer_pool: &'a BufferPool,
        catalog: &Arc<Catalog>,
        tid: TransactionId,
        table_id: usize,
        alias: Option<&str>,
    ) -> DbResult<Self> {
        let table = catalog
            .get_table_from_id(table_id)
            .ok_or_else(|| DbError::CatalogMissing(format!("table id {}", table_id)))?;
        let td = table.get_tuple_desc().with_alias(alias);
        Ok(SeqScan {
            buffer_pool,
            table,
            tid,
            td,
            page_no: 0,
            slot_no: 0,
            current_page: None,
        })
    }

    fn load_page(&mut self, page_no: usize) -> DbResult<bool> {
        if page_no >= self.table.num_pages()? {
            self.current_page = None;
            return Ok(false);
        }
        let pid = HeapPageId::new(self.table.get_id(), page_no);
        self.current_page = Some(self.buffer_pool.get_page(self.tid, pid, Permission::Read)?);
        Ok(true)
    }

    /// Advances `(page_no, slot_no)` to the next occupied slot, loading
    /// pages as needed. Leaves state past the end once exhausted.
    fn advance_to_next_occupied(&mut self) -> DbResult<bool> {
        loop {
            if self.current_page.is_none() && !self.load_page(self.page_no)? {
                return Ok(false);
            }
            let page = self.current_page.clone().unwrap();
            let guard = page.read().unwrap();
            let num_slots = guard.num_tuples();
            while self.slot_no < num_slots {
                if guard.get_tuple(self.slot_no).get_record_id().is_some() {
                    return Ok(true);
                }
                self.slot_no += 1;
            }
            drop(guard);
            self.page_no += 1;
            self.slot_no = 0;
            self.current_page = None;
        }
    }
}

impl<'a> OpIterator for SeqScan<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.page_no = 0;
        self.slot_no = 0;
        self.current_page = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.advance_to_next_occupied()
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.advance_to_next_occupied()? {
            return Ok(None);
        }
        let page = self.current_page.clone().unwrap();
        let guard = page.read().unwrap();
        let stored = guard.get_tuple(self.slot_no);
        let rid = stored
            .get_record_id()
            .unwrap_or_else(|| RecordId::new(HeapPageId::new(self.table.get_id(), self.page_no), self.slot_no));
        let mut renamed = Tuple::new(stored.get_fields().to_vec(), &self.td);
        renamed.set_record_id(Some(rid));
        self.slot_no += 1;
        Ok(Some(renamed))
    }

    fn close(&mut self) {
        self.page_no = 0;
        self.slot_no = 0;
        self.current_page = None;
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, IntField};
    use crate::types::Type;
    use tempfile::tempfile;

    fn td() -> TupleDesc {
        TupleDesc::new(vec![Type::IntType], vec!["a".to_string()])
    }

    #[test]
    fn scan_visits_every_inserted_tuple() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let tid = TransactionId::new();
        let table = catalog.get_table_from_id(table_id).unwrap();
        for i in 0..5 {
            table
                .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(i))], &td()))
                .unwrap();
        }

        let mut scan = SeqScan::new(&bp, &catalog, tid, table_id, Some("t")).unwrap();
        scan.open().unwrap();
        let mut seen = vec![];
        while let Some(t) = scan.next().unwrap() {
            seen.push(t.get_field(0).unwrap().clone().into_int().unwrap().get_value());
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(scan.get_tuple_desc().get_field_name(0), Some(&"t.a".to_string()));
    }

    #[test]
    fn rewind_replays_from_start() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let tid = TransactionId::new();
        let table = catalog.get_table_from_id(table_id).unwrap();
        table
            .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(1))], &td()))
            .unwrap();

        let mut scan = SeqScan::new(&bp, &catalog, tid, table_id, None).unwrap();
        scan.open().unwrap();
        assert!(scan.next().unwrap().is_some());
        assert!(scan.next().unwrap().is_none());
        scan.rewind().unwrap();
        assert!(scan.next().unwrap().is_some());
    }
}
