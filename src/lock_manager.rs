use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::error::{DbError, DbResult};
use crate::heap_page::{HeapPage, HeapPageId, Permission};
use crate::transaction::TransactionId;

/// Per-page lock bookkeeping: who holds it, in which mode.
#[derive(Default)]
struct PageLockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl PageLockState {
    fn holders(&self) -> impl Iterator<Item = &TransactionId> {
        self.shared.iter().chain(self.exclusive.iter())
    }

    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }
}

/// All lock-table *and* page-cache structure lives behind this one
/// `Mutex`: lock grant/wait bookkeeping, the cached pages themselves,
/// and the eviction queue. A page can therefore never be evicted, or
/// handed to a second transaction, while another transaction's lock
/// request for it is still being decided — the single latch is what
/// spec.md's serialization guarantee actually depends on, not just a
/// convenient sequencing of two independently-locked structures.
struct Latch {
    page_locks: HashMap<HeapPageId, PageLockState>,
    held: HashMap<TransactionId, HashSet<HeapPageId>>,
    waiting: HashMap<TransactionId, (HeapPageId, Permission)>,
    cache: HashMap<HeapPageId, Arc<RwLock<HeapPage>>>,
    eviction_queue: VecDeque<HeapPageId>,
}

impl Latch {
    fn new() -> Self {
        Latch {
            page_locks: HashMap::new(),
            held: HashMap::new(),
            waiting: HashMap::new(),
            cache: HashMap::new(),
            eviction_queue: VecDeque::new(),
        }
    }
}

pub struct LockManager {
    latch: Arc<Mutex<Latch>>,
    condvars: Mutex<HashMap<HeapPageId, Arc<Condvar>>>,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            latch: Arc::new(Mutex::new(Latch::new())),
            condvars: Mutex::new(HashMap::new()),
        }
    }

    fn condvar_for(&self, pid: HeapPageId) -> Arc<Condvar> {
        let mut map = self.condvars.lock().unwrap();
        Arc::clone(map.entry(pid).or_insert_with(|| Arc::new(Condvar::new())))
    }

    /// Runs the blocking grant loop against an already-held latch
    /// guard, returning that same guard (still held) once `mode` is
    /// granted, or an error (with the guard dropped) on self-abort.
    /// Factored out so `acquire` and `fetch_page` share one grant path
    /// while `fetch_page` keeps the latch held across the cache check
    /// that follows.
    fn acquire_locked<'g>(
        &self,
        mut guard: MutexGuard<'g, Latch>,
        tid: TransactionId,
        pid: HeapPageId,
        mode: Permission,
    ) -> DbResult<MutexGuard<'g, Latch>> {
        loop {
            if let Some(held) = current_mode(&guard, tid, pid) {
                if held == Permission::Write || mode == Permission::Read {
                    return Ok(guard);
                }
            }

            let state = guard.page_locks.entry(pid).or_default();
            let is_sole_reader =
                state.shared.len() == 1 && state.shared.contains(&tid) && state.exclusive.is_none();

            if mode == Permission::Write && is_sole_reader {
                state.shared.remove(&tid);
                state.exclusive = Some(tid);
                return Ok(guard);
            }

            let grantable = match mode {
                Permission::Read => state.exclusive.is_none(),
                Permission::Write => state.is_empty(),
            };

            if grantable {
                grant(&mut guard, tid, pid, mode);
                return Ok(guard);
            }

            if would_deadlock(&guard, tid, pid) {
                log::warn!("transaction {:?} detected deadlock on {:?}, self-aborting", tid, pid);
                drop(guard);
                jitter_sleep();
                return Err(DbError::TransactionAborted);
            }

            guard.waiting.insert(tid, (pid, mode));
            let cv = self.condvar_for(pid);
            log::debug!("transaction {:?} blocking for {:?} on {:?}", tid, mode, pid);
            guard = cv.wait(guard).unwrap();
            guard.waiting.remove(&tid);
        }
    }

    /// Acquires `mode` on `pid` for `tid`. Blocks the caller until the
    /// lock can be granted, or returns `DbError::TransactionAborted` if
    /// granting it would complete a wait-for cycle (the detecting
    /// transaction is the one that aborts).
    pub fn acquire(&self, tid: TransactionId, pid: HeapPageId, mode: Permission) -> DbResult<()> {
        let guard = self.latch.lock().unwrap();
        self.acquire_locked(guard, tid, pid, mode)?;
        Ok(())
    }

    /// Acquires `mode` on `pid` for `tid`, then returns its cached
    /// page — loading it via `load` and evicting a clean victim if
    /// necessary — all under the one latch acquisition, so the lock
    /// grant and the cache/eviction bookkeeping happen as a single
    /// atomic step with no gap a concurrent evictor or loader could
    /// race into.
    pub fn fetch_page<F>(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        mode: Permission,
        num_pages: usize,
        load: F,
    ) -> DbResult<Arc<RwLock<HeapPage>>>
    where
        F: FnOnce() -> DbResult<HeapPage>,
    {
        let guard = self.latch.lock().unwrap();
        let mut guard = self.acquire_locked(guard, tid, pid, mode)?;

        if let Some(page) = guard.cache.get(&pid) {
            return Ok(Arc::clone(page));
        }

        let page = load()?;
        if guard.cache.len() >= num_pages {
            evict_one(&mut guard)?;
        }
        let handle = Arc::new(RwLock::new(page));
        guard.cache.insert(pid, Arc::clone(&handle));
        guard.eviction_queue.push_back(pid);
        Ok(handle)
    }

    /// The cached page for `pid`, if any, without touching the lock table.
    pub fn get_cached(&self, pid: HeapPageId) -> Option<Arc<RwLock<HeapPage>>> {
        self.latch.lock().unwrap().cache.get(&pid).cloned()
    }

    /// Visits every cached page under one latch acquisition.
    pub fn for_each_cached<F: FnMut(HeapPageId, &Arc<RwLock<HeapPage>>)>(&self, mut f: F) {
        let guard = self.latch.lock().unwrap();
        for (pid, page) in guard.cache.iter() {
            f(*pid, page);
        }
    }

    /// Releases `tid`'s lock on `pid`, if held, and wakes any waiters.
    pub fn release(&self, tid: TransactionId, pid: HeapPageId) {
        let mut guard = self.latch.lock().unwrap();
        let mut became_free = false;
        if let Some(state) = guard.page_locks.get_mut(&pid) {
            if state.exclusive == Some(tid) {
                state.exclusive = None;
                became_free = true;
            } else if state.shared.remove(&tid) {
                became_free = state.shared.is_empty();
            }
            if state.is_empty() {
                guard.page_locks.remove(&pid);
            }
        }
        if let Some(pages) = guard.held.get_mut(&tid) {
            pages.remove(&pid);
        }
        drop(guard);
        if became_free {
            self.condvar_for(pid).notify_all();
        }
    }

    /// Releases every page `tid` holds. Iterates a snapshot of the
    /// holding set rather than the live set, since `release` mutates
    /// `held` as it goes.
    pub fn release_locks(&self, tid: TransactionId) {
        let pages: Vec<HeapPageId> = {
            let guard = self.latch.lock().unwrap();
            guard
                .held
                .get(&tid)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        };
        for pid in pages {
            self.release(tid, pid);
        }
        self.latch.lock().unwrap().held.remove(&tid);
    }

    /// The strongest mode currently granted to `tid` on `pid`, if any.
    /// An in-flight upgrade is reported as the pre-upgrade (`Read`) mode
    /// until it completes.
    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> Option<Permission> {
        let guard = self.latch.lock().unwrap();
        current_mode(&guard, tid, pid)
    }

    pub fn get_locked_pages(&self, tid: TransactionId) -> HashSet<HeapPageId> {
        let guard = self.latch.lock().unwrap();
        guard.held.get(&tid).cloned().unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

fn current_mode(latch: &Latch, tid: TransactionId, pid: HeapPageId) -> Option<Permission> {
    let state = latch.page_locks.get(&pid)?;
    if state.exclusive == Some(tid) {
        Some(Permission::Write)
    } else if state.shared.contains(&tid) {
        Some(Permission::Read)
    } else {
        None
    }
}

fn grant(latch: &mut Latch, tid: TransactionId, pid: HeapPageId, mode: Permission) {
    let state = latch.page_locks.entry(pid).or_default();
    match mode {
        Permission::Read => {
            state.shared.insert(tid);
        }
        Permission::Write => {
            state.exclusive = Some(tid);
        }
    }
    latch.held.entry(tid).or_default().insert(pid);
}

/// Depth-first search over the wait-for graph: edges run from a waiter
/// to every current holder of the page it wants, and from each holder
/// (if it is itself blocked) to the holders of *its* wanted page.
/// Returns true if granting `tid` its wait on `pid` would complete a
/// cycle back to `tid`.
fn would_deadlock(latch: &Latch, tid: TransactionId, pid: HeapPageId) -> bool {
    let mut stack: Vec<TransactionId> = latch
        .page_locks
        .get(&pid)
        .map(|s| s.holders().cloned().collect())
        .unwrap_or_default();
    let mut visited = HashSet::new();
    while let Some(holder) = stack.pop() {
        if holder == tid {
            return true;
        }
        if !visited.insert(holder) {
            continue;
        }
        if let Some((waited_pid, _)) = latch.waiting.get(&holder) {
            if let Some(state) = latch.page_locks.get(waited_pid) {
                stack.extend(state.holders().cloned());
            }
        }
    }
    false
}

/// Evicts the oldest clean page from `latch`'s cache. NO-STEAL: a dirty
/// page is skipped, since evicting it would lose changes no log can
/// redo. If every cached page is dirty, there is nowhere to put the
/// new one.
fn evict_one(latch: &mut Latch) -> DbResult<()> {
    let candidates = latch.eviction_queue.len();
    for _ in 0..candidates {
        let candidate = latch.eviction_queue.pop_front().unwrap();
        match latch.cache.get(&candidate) {
            Some(page) if page.read().unwrap().is_dirty().is_none() => {
                latch.cache.remove(&candidate);
                log::debug!("evicted page {:?}", candidate);
                return Ok(());
            }
            Some(_) => latch.eviction_queue.push_back(candidate),
            None => {}
        }
    }
    Err(DbError::AllPagesDirty)
}

fn jitter_sleep() {
    let millis = rand::thread_rng().gen_range(10..75);
    thread::sleep(Duration::from_millis(millis));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    #[test]
    fn shared_locks_coexist() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid, Permission::Read).unwrap();
        lm.acquire(t2, pid, Permission::Read).unwrap();
        assert_eq!(lm.holds_lock(t1, pid), Some(Permission::Read));
        assert_eq!(lm.holds_lock(t2, pid), Some(Permission::Read));
    }

    #[test]
    fn exclusive_excludes_others() {
        let lm = Arc::new(LockManager::new());
        let pid = HeapPageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire(t1, pid, Permission::Write).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || {
            lm2.acquire(t2, pid, Permission::Read).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        lm.release(t1, pid);
        handle.join().unwrap();
        assert_eq!(lm.holds_lock(t2, pid), Some(Permission::Read));
    }

    #[test]
    fn sole_reader_upgrades_in_place() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        let t1 = TransactionId::new();
        lm.acquire(t1, pid, Permission::Read).unwrap();
        lm.acquire(t1, pid, Permission::Write).unwrap();
        assert_eq!(lm.holds_lock(t1, pid), Some(Permission::Write));
    }

    #[test]
    fn deadlock_is_detected_and_one_side_aborts() {
        // T1 holds p1 shared, T2 holds p2 shared; T1 wants p2
        // exclusive (blocks); T2 wants p1 exclusive, which must detect
        // the cycle and self-abort.
        let lm = Arc::new(LockManager::new());
        let p1 = HeapPageId::new(1, 0);
        let p2 = HeapPageId::new(1, 1);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();

        lm.acquire(t1, p1, Permission::Read).unwrap();
        lm.acquire(t2, p2, Permission::Read).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let lm1 = Arc::clone(&lm);
        let b1 = Arc::clone(&barrier);
        let h1 = thread::spawn(move || {
            b1.wait();
            lm1.acquire(t1, p2, Permission::Write)
        });

        let lm2 = Arc::clone(&lm);
        let b2 = Arc::clone(&barrier);
        let h2 = thread::spawn(move || {
            b2.wait();
            thread::sleep(Duration::from_millis(20));
            lm2.acquire(t2, p1, Permission::Write)
        });

        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();
        // exactly one side must have aborted so the other can proceed
        assert!(r1.is_ok() != r2.is_ok());
    }

    #[test]
    fn release_locks_frees_every_page() {
        let lm = LockManager::new();
        let p1 = HeapPageId::new(1, 0);
        let p2 = HeapPageId::new(1, 1);
        let t1 = TransactionId::new();
        lm.acquire(t1, p1, Permission::Read).unwrap();
        lm.acquire(t1, p2, Permission::Write).unwrap();
        lm.release_locks(t1);
        assert_eq!(lm.holds_lock(t1, p1), None);
        assert_eq!(lm.holds_lock(t1, p2), None);
        assert!(lm.get_locked_pages(t1).is_empty());
    }

    #[test]
    fn fetch_page_loads_once_and_caches() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        let tid = TransactionId::new();
        let mut loads = 0;
        let page = lm
            .fetch_page(tid, pid, Permission::Read, 10, || {
                loads += 1;
                Ok(HeapPage::new(pid, vec![0; crate::buffer_pool::PAGE_SIZE], td_for_test()).unwrap())
            })
            .unwrap();
        assert_eq!(loads, 1);
        let again = lm.get_cached(pid).unwrap();
        assert!(Arc::ptr_eq(&page, &again));
    }

    fn td_for_test() -> crate::tuple::TupleDesc {
        crate::tuple::TupleDesc::new(vec![crate::types::Type::IntType], vec!["a".to_string()])
    }
}
