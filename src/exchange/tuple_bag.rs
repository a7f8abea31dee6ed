use std::time::Instant;

use crate::tuple::{Tuple, TupleDesc};

/// Wire message shipped across a shuffle/collect edge. The concrete
/// network framing is external; this is the value both sides agree on.
#[derive(Debug, Clone)]
pub struct TupleBag {
    pub operator_id: usize,
    pub source_worker_id: usize,
    pub tuple_desc: TupleDesc,
    pub tuples: Vec<Tuple>,
    pub is_eos: bool,
}

impl TupleBag {
    pub fn batch(operator_id: usize, source_worker_id: usize, td: TupleDesc, tuples: Vec<Tuple>) -> Self {
        TupleBag {
            operator_id,
            source_worker_id,
            tuple_desc: td,
            tuples,
            is_eos: false,
        }
    }

    pub fn eos(operator_id: usize, source_worker_id: usize, td: TupleDesc) -> Self {
        TupleBag {
            operator_id,
            source_worker_id,
            tuple_desc: td,
            tuples: vec![],
            is_eos: true,
        }
    }
}

/// Accumulates tuples for one outbound edge and decides when to flush:
/// immediately at `max_size`, or at `min_size` once `max_ms` has
/// elapsed since the last flush.
pub struct BagBuffer {
    operator_id: usize,
    source_worker_id: usize,
    td: TupleDesc,
    min_size: usize,
    max_size: usize,
    max_ms: u64,
    buffered: Vec<Tuple>,
    last_flush: Instant,
}

impl BagBuffer {
    pub fn new(operator_id: usize, source_worker_id: usize, td: TupleDesc, min_size: usize, max_size: usize, max_ms: u64) -> Self {
        BagBuffer {
            operator_id,
            source_worker_id,
            td,
            min_size,
            max_size,
            max_ms,
            buffered: vec![],
            last_flush: Instant::now(),
        }
    }

    /// Adds one tuple, returning a flushed `TupleBag` if that push
    /// crossed `max_size`, or if enough time has passed with at least
    /// `min_size` buffered.
    pub fn push(&mut self, t: Tuple) -> Option<TupleBag> {
        self.buffered.push(t);
        if self.buffered.len() >= self.max_size {
            return Some(self.flush());
        }
        if self.buffered.len() >= self.min_size && self.last_flush.elapsed().as_millis() as u64 >= self.max_ms {
            return Some(self.flush());
        }
        None
    }

    pub fn flush_if_any(&mut self) -> Option<TupleBag> {
        if self.buffered.is_empty() {
            None
        } else {
            Some(self.flush())
        }
    }

    fn flush(&mut self) -> TupleBag {
        let tuples = std::mem::take(&mut self.buffered);
        self.last_flush = Instant::now();
        TupleBag::batch(self.operator_id, self.source_worker_id, self.td.clone(), tuples)
    }

    pub fn eos(&self) -> TupleBag {
        TupleBag::eos(self.operator_id, self.source_worker_id, self.td.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, IntField};
    use crate::types::Type;

    fn td() -> TupleDesc {
        TupleDesc::new(vec![Type::IntType], vec!["a".to_string()])
    }

    fn t(v: i32) -> Tuple {
        Tuple::new(vec![FieldVal::IntField(IntField::new(v))], &td())
    }

    #[test]
    fn flushes_immediately_at_max_size() {
        let mut buf = BagBuffer::new(1, 0, td(), 10, 2, 10_000);
        assert!(buf.push(t(1)).is_none());
        let bag = buf.push(t(2)).unwrap();
        assert_eq!(bag.tuples.len(), 2);
        assert!(!bag.is_eos);
    }

    #[test]
    fn flush_if_any_drains_remainder() {
        let mut buf = BagBuffer::new(1, 0, td(), 10, 100, 10_000);
        buf.push(t(1));
        buf.push(t(2));
        let bag = buf.flush_if_any().unwrap();
        assert_eq!(bag.tuples.len(), 2);
        assert!(buf.flush_if_any().is_none());
    }

    #[test]
    fn eos_bag_is_empty_and_marked() {
        let buf = BagBuffer::new(1, 0, td(), 10, 100, 10_000);
        let bag = buf.eos();
        assert!(bag.is_eos);
        assert!(bag.tuples.is_empty());
    }
}
