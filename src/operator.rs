use crate::error::DbResult;
use crate::tuple::{Tuple, TupleDesc};

/// Pull-based iterator contract shared by every node in an operator
/// tree. `has_next`/`next` buffer one look-ahead tuple rather than
/// fusing into a single call, so a caller can probe for end-of-stream
/// without consuming a tuple.
pub trait OpIterator {
    fn open(&mut self) -> DbResult<()>;
    fn has_next(&mut self) -> DbResult<bool>;
    fn next(&mut self) -> DbResult<Option<Tuple>>;
    fn close(&mut self);
    fn rewind(&mut self) -> DbResult<()> {
        self.close();
        self.open()
    }
    fn get_tuple_desc(&self) -> &TupleDesc;

    /// This operator's direct children, for callers that want to
    /// introspect or walk an operator tree generically. Leaves (e.g.
    /// `SeqScan`) return an empty slice.
    fn get_children(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }

    /// Rebinds this operator's children, for callers that want to
    /// rewire an operator tree generically. Operators with a fixed
    /// arity (e.g. `Join`'s `left`/`right`) should treat a mismatched
    /// count as a no-op; the default ignores whatever is passed since
    /// a leaf has nothing to rebind.
    fn set_children(&mut self, children: Vec<Box<dyn OpIterator>>) {
        let _ = children;
    }
}

/// Shared look-ahead buffering logic: operators that don't need custom
/// `has_next`/`next` behavior implement `fetch_next` and get the rest
/// for free via this helper, mirroring the `readNext`/`hasNext` split
/// used throughout the SimpleDB-family operator trees this crate is
/// descended from.
pub struct LookAhead {
    buffered: Option<Tuple>,
    done: bool,
}

impl LookAhead {
    pub fn new() -> Self {
        LookAhead {
            buffered: None,
            done: false,
        }
    }

    pub fn reset(&mut self) {
        self.buffered = None;
        self.done = false;
    }

    pub fn has_next<F>(&mut self, mut fetch_next: F) -> DbResult<bool>
    where
        F: FnMut() -> DbResult<Option<Tuple>>,
    {
        if self.buffered.is_some() {
            return Ok(true);
        }
        if self.done {
            return Ok(false);
        }
        match fetch_next()? {
            Some(t) => {
                self.buffered = Some(t);
                Ok(true)
            }
            None => {
                self.done = true;
                Ok(false)
            }
        }
    }

    pub fn next<F>(&mut self, fetch_next: F) -> DbResult<Option<Tuple>>
    where
        F: FnMut() -> DbResult<Option<Tuple>>,
    {
        if self.buffered.is_none() && !self.has_next(fetch_next)? {
            return Ok(None);
        }
        Ok(self.buffered.take())
    }
}

impl Default for LookAhead {
    fn default() -> Self {
        Self::new()
    }
}
