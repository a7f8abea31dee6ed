use std::sync::{Arc, RwLock};

use crate::catalog::Catalog;
use crate::error::{DbError, DbResult};
use crate::heap_page::{HeapPage, HeapPageId, Permission};
use crate::lock_manager::LockManager;
use crate::log::{LogFile, NullLogFile};
use crate::transaction::TransactionId;
use crate::tuple::Tuple;

pub const PAGE_SIZE: usize = 4096;
pub const DEFAULT_PAGES: usize = 50;

/// Cache of pages kept in memory, bounded to `num_pages` entries and
/// backed by the disk files in `catalog`. Eviction is NO-STEAL: a dirty
/// page is never evicted, only flushed at commit. The cache and
/// eviction queue themselves live inside `lock_manager`'s single latch,
/// not as separate fields here, so a lock grant and a cache/eviction
/// decision for the same page can never interleave with each other.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    num_pages: usize,
    log: Arc<dyn LogFile>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_capacity(catalog, DEFAULT_PAGES)
    }

    pub fn with_capacity(catalog: Arc<Catalog>, num_pages: usize) -> Self {
        Self::with_capacity_and_log(catalog, num_pages, Arc::new(NullLogFile))
    }

    pub fn with_capacity_and_log(catalog: Arc<Catalog>, num_pages: usize, log: Arc<dyn LogFile>) -> Self {
        BufferPool {
            catalog,
            lock_manager: LockManager::new(),
            num_pages,
            log,
        }
    }

    /// Retrieves the specified page from cache or disk, acquiring the
    /// requested lock first. The lock acquisition and the cache lookup/
    /// load/evict sequence run under one latch acquisition inside
    /// `LockManager::fetch_page`, so a page can never be returned to a
    /// transaction that isn't entitled to touch it yet, and an evictor
    /// can never race a blocked lock waiter for the same page.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permission,
    ) -> DbResult<Arc<RwLock<HeapPage>>> {
        let catalog = &self.catalog;
        self.lock_manager.fetch_page(tid, pid, perm, self.num_pages, || {
            let table = catalog
                .get_table_from_id(pid.get_table_id())
                .ok_or_else(|| DbError::CatalogMissing(format!("table id {}", pid.get_table_id())))?;
            table.read_page(&pid)
        })
    }

    /// Commits `tid`: flushes every dirty page it holds to disk, then
    /// releases its locks. Per spec, locks must not be released before
    /// the flush completes.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        if commit {
            self.flush_pages(tid)?;
        } else {
            self.revert_pages(tid);
        }
        self.lock_manager.release_locks(tid);
        Ok(())
    }

    fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        let locked = self.lock_manager.get_locked_pages(tid);
        for pid in locked {
            if let Some(page) = self.lock_manager.get_cached(pid) {
                let mut page = page.write().unwrap();
                if page.is_dirty() == Some(tid) {
                    self.log.log_write(tid);
                    self.log.force();
                    let table = self
                        .catalog
                        .get_table_from_id(pid.get_table_id())
                        .ok_or_else(|| {
                            DbError::CatalogMissing(format!("table id {}", pid.get_table_id()))
                        })?;
                    table.write_page(&page)?;
                    page.mark_dirty(false, tid);
                    page.set_before_image();
                    log::debug!("flushed page {:?} for transaction {:?}", pid, tid);
                }
            }
        }
        Ok(())
    }

    fn revert_pages(&self, tid: TransactionId) {
        let locked = self.lock_manager.get_locked_pages(tid);
        for pid in locked {
            if let Some(page) = self.lock_manager.get_cached(pid) {
                let mut page = page.write().unwrap();
                if page.is_dirty() == Some(tid) {
                    *page = page.get_before_image();
                    log::debug!("reverted page {:?} for transaction {:?}", pid, tid);
                }
            }
        }
    }

    pub fn insert_tuple(&self, tid: TransactionId, table_id: usize, tuple: Tuple) -> DbResult<()> {
        let table = self
            .catalog
            .get_table_from_id(table_id)
            .ok_or_else(|| DbError::CatalogMissing(format!("table id {}", table_id)))?;
        table.add_tuple(tid, self, tuple)
    }

    pub fn delete_tuple(&self, tid: TransactionId, table_id: usize, tuple: &mut Tuple) -> DbResult<()> {
        let table = self
            .catalog
            .get_table_from_id(table_id)
            .ok_or_else(|| DbError::CatalogMissing(format!("table id {}", table_id)))?;
        table.delete_tuple(tid, self, tuple)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> Option<Permission> {
        self.lock_manager.holds_lock(tid, pid)
    }

    pub fn release_page(&self, tid: TransactionId, pid: HeapPageId) {
        self.lock_manager.release(tid, pid);
    }

    pub fn flush_all_pages(&self) -> DbResult<()> {
        let mut err = None;
        self.lock_manager.for_each_cached(|pid, page| {
            if err.is_some() {
                return;
            }
            let mut page = page.write().unwrap();
            if let Some(tid) = page.is_dirty() {
                match self.catalog.get_table_from_id(pid.get_table_id()) {
                    Some(table) => match table.write_page(&page) {
                        Ok(()) => {
                            page.mark_dirty(false, tid);
                            page.set_before_image();
                        }
                        Err(e) => err = Some(e),
                    },
                    None => err = Some(DbError::CatalogMissing(format!("table id {}", pid.get_table_id()))),
                }
            }
        });
        err.map_or(Ok(()), Err)
    }

    pub fn get_num_pages(&self) -> usize {
        self.num_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, IntField};
    use crate::heap_file::HeapFile;
    use crate::tuple::TupleDesc;
    use crate::types::Type;
    use tempfile::tempfile;

    fn td() -> TupleDesc {
        TupleDesc::new(
            vec![Type::IntType, Type::IntType],
            vec!["a".to_string(), "b".to_string()],
        )
    }

    fn setup() -> (Arc<Catalog>, BufferPool, usize) {
        let catalog = Arc::new(Catalog::new());
        let file = HeapFile::new(tempfile().unwrap(), td());
        let id = file.get_id();
        catalog.add_table(file, "t".to_string());
        let bp = BufferPool::with_capacity(Arc::clone(&catalog), 2);
        (catalog, bp, id)
    }

    #[test]
    fn insert_then_scan_sees_tuple() {
        let (_catalog, bp, table_id) = setup();
        let tid = TransactionId::new();
        let t = Tuple::new(
            vec![
                FieldVal::IntField(IntField::new(1)),
                FieldVal::IntField(IntField::new(2)),
            ],
            &td(),
        );
        bp.insert_tuple(tid, table_id, t).unwrap();
        bp.transaction_complete(tid, true).unwrap();

        let tid2 = TransactionId::new();
        let pid = HeapPageId::new(table_id, 0);
        let page = bp.get_page(tid2, pid, Permission::Read).unwrap();
        assert_eq!(page.read().unwrap().get_num_empty_slots(), {
            let total = page.read().unwrap().num_tuples();
            total - 1
        });
    }

    #[test]
    fn abort_reverts_dirty_page() {
        let (_catalog, bp, table_id) = setup();
        let tid = TransactionId::new();
        let t = Tuple::new(
            vec![
                FieldVal::IntField(IntField::new(1)),
                FieldVal::IntField(IntField::new(2)),
            ],
            &td(),
        );
        bp.insert_tuple(tid, table_id, t).unwrap();
        bp.transaction_complete(tid, false).unwrap();

        let tid2 = TransactionId::new();
        let pid = HeapPageId::new(table_id, 0);
        let page = bp.get_page(tid2, pid, Permission::Read).unwrap();
        assert_eq!(
            page.read().unwrap().get_num_empty_slots(),
            page.read().unwrap().num_tuples()
        );
    }

    #[test]
    fn eviction_skips_dirty_pages() {
        let (_catalog, bp, table_id) = setup();
        let tid = TransactionId::new();
        // fill page 0, forcing inserts onto page 1 and 2
        for _ in 0..3 {
            let pid = HeapPageId::new(table_id, 0);
            let page = bp.get_page(tid, pid, Permission::Write).unwrap();
            let mut guard = page.write().unwrap();
            while guard.get_num_empty_slots() > 0 {
                let t = Tuple::new(
                    vec![
                        FieldVal::IntField(IntField::new(1)),
                        FieldVal::IntField(IntField::new(2)),
                    ],
                    &td(),
                );
                guard.add_tuple(t).unwrap();
            }
            guard.mark_dirty(true, tid);
            break;
        }
        let pid1 = HeapPageId::new(table_id, 1);
        bp.get_page(tid, pid1, Permission::Read).unwrap();
        // capacity is 2, both pages cached so far are dirty/pinned-by-read;
        // a third distinct page must still succeed or fail deterministically
        let pid2 = HeapPageId::new(table_id, 2);
        let result = bp.get_page(tid, pid2, Permission::Read);
        assert!(result.is_ok() || matches!(result, Err(DbError::AllPagesDirty)));
    }
}
