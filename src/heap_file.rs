use std::fs::File;
use std::io::{Read as IoRead, Seek, SeekFrom, Write as IoWrite};
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::buffer_pool::{BufferPool, PAGE_SIZE};
use crate::error::DbResult;
use crate::heap_page::{HeapPage, HeapPageId, Permission};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};

/// A table stored as a sequence of fixed-size pages in one disk file.
pub struct HeapFile {
    file: Mutex<File>,
    td: TupleDesc,
    id: usize,
}

impl HeapFile {
    pub fn new(file: File, td: TupleDesc) -> Self {
        HeapFile {
            file: Mutex::new(file),
            td,
            id: Uuid::new_v4().as_u128() as usize,
        }
    }

    pub fn get_id(&self) -> usize {
        self.id
    }

    pub fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    /// Reads the page at `pid`, zero-extending the file if it is
    /// shorter than `pid` requires.
    pub fn read_page(&self, pid: &HeapPageId) -> DbResult<HeapPage> {
        let mut data = vec![0; PAGE_SIZE];
        let mut file = self.file.lock().unwrap();
        let mut num_pages = (file.metadata()?.len() as f64 / PAGE_SIZE as f64).ceil() as usize;
        let page_no = pid.get_page_number();
        while num_pages <= page_no {
            file.seek(SeekFrom::Start((num_pages * PAGE_SIZE) as u64))?;
            file.write_all(&data)?;
            num_pages += 1;
        }

        file.seek(SeekFrom::Start((page_no * PAGE_SIZE) as u64))?;
        file.read_exact(&mut data)?;
        HeapPage::new(*pid, data, self.td.clone())
    }

    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let pid = page.get_id();
        let data = page.get_page_data();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((pid.get_page_number() * PAGE_SIZE) as u64))?;
        file.write_all(&data)?;
        Ok(())
    }

    pub fn num_pages(&self) -> DbResult<usize> {
        let file = self.file.lock().unwrap();
        Ok((file.metadata()?.len() as f64 / PAGE_SIZE as f64).ceil() as usize)
    }

    /// Places `tuple` on the first page with a free slot, appending a
    /// new page if none has room. `buffer_pool` is passed explicitly
    /// rather than looked up from a global so this call can be driven
    /// from any `DbContext`.
    pub fn add_tuple(
        &self,
        tid: TransactionId,
        buffer_pool: &BufferPool,
        tuple: Tuple,
    ) -> DbResult<()> {
        let table_id = self.get_id();
        let mut page_no = 0;

        loop {
            let pid = HeapPageId::new(table_id, page_no);
            if page_no >= self.num_pages()? {
                let page = buffer_pool.get_page(tid, pid, Permission::Write)?;
                let mut page_writer = page.write().unwrap();
                page_writer.add_tuple(tuple)?;
                page_writer.mark_dirty(true, tid);
                return Ok(());
            }

            let page = buffer_pool.get_page(tid, pid, Permission::Read)?;
            let has_room = page.read().unwrap().get_num_empty_slots() > 0;
            if has_room {
                let page = buffer_pool.get_page(tid, pid, Permission::Write)?;
                let mut page_writer = page.write().unwrap();
                page_writer.add_tuple(tuple)?;
                page_writer.mark_dirty(true, tid);
                return Ok(());
            }
            page_no += 1;
        }
    }

    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        buffer_pool: &BufferPool,
        tuple: &mut Tuple,
    ) -> DbResult<()> {
        let rid = tuple
            .get_record_id()
            .ok_or(crate::error::DbError::NotOnPage)?;
        let pid = rid.get_page_id();
        let page = buffer_pool.get_page(tid, pid, Permission::Write)?;
        let mut page_writer = page.write().unwrap();
        page_writer.delete_tuple(tuple)?;
        page_writer.mark_dirty(true, tid);
        Ok(())
    }

    pub fn iter<'a>(&'a self, tid: TransactionId, buffer_pool: &'a BufferPool) -> HeapFileIterator<'a> {
        HeapFileIterator {
            heap_file: self,
            buffer_pool,
            current_page_index: 0,
            tid,
        }
    }
}

pub struct HeapFileIterator<'a> {
    heap_file: &'a HeapFile,
    buffer_pool: &'a BufferPool,
    current_page_index: usize,
    tid: TransactionId,
}

impl<'a> Iterator for HeapFileIterator<'a> {
    type Item = DbResult<Arc<RwLock<HeapPage>>>;

    fn next(&mut self) -> Option<Self::Item> {
        let num_pages = match self.heap_file.num_pages() {
            Ok(n) => n,
            Err(e) => return Some(Err(e)),
        };
        if self.current_page_index >= num_pages {
            return None;
        }
        let pid = HeapPageId::new(self.heap_file.get_id(), self.current_page_index);
        self.current_page_index += 1;
        Some(
            self.buffer_pool
                .get_page(self.tid, pid, Permission::Read),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::fields::{FieldVal, IntField};
    use crate::types::Type;
    use tempfile::tempfile;

    fn td() -> TupleDesc {
        TupleDesc::new(vec![Type::IntType], vec!["a".to_string()])
    }

    #[test]
    fn add_tuple_spills_to_new_page_when_full() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let table = catalog.get_table_from_id(table_id).unwrap();
        let tid = TransactionId::new();

        let slots = {
            let pid = HeapPageId::new(table_id, 0);
            let page = bp.get_page(tid, pid, Permission::Read).unwrap();
            page.read().unwrap().num_tuples()
        };
        for _ in 0..slots {
            table
                .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(1))], &td()))
                .unwrap();
        }
        assert_eq!(table.num_pages().unwrap(), 1);
        table
            .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(2))], &td()))
            .unwrap();
        assert_eq!(table.num_pages().unwrap(), 2);
    }

    #[test]
    fn iter_visits_every_page() {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let table_id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::new(Arc::clone(&catalog));
        let table = catalog.get_table_from_id(table_id).unwrap();
        let tid = TransactionId::new();
        table
            .add_tuple(tid, &bp, Tuple::new(vec![FieldVal::IntField(IntField::new(1))], &td()))
            .unwrap();
        let pages: Vec<_> = table.iter(tid, &bp).collect();
        assert_eq!(pages.len(), 1);
    }
}
