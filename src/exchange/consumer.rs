use std::collections::{HashSet, VecDeque};

use crossbeam_channel::Receiver;

use crate::error::DbResult;
use crate::exchange::tuple_bag::TupleBag;
use crate::operator::OpIterator;
use crate::tuple::{Tuple, TupleDesc};

/// Root-side counterpart to `CollectProducer`: a single inbound queue
/// of `TupleBag`s, read in order until the producer's end-of-stream
/// bag arrives.
pub struct CollectConsumer {
    receiver: Receiver<TupleBag>,
    td: TupleDesc,
    current: VecDeque<Tuple>,
    eos: bool,
}

impl CollectConsumer {
    pub fn new(receiver: Receiver<TupleBag>, td: TupleDesc) -> Self {
        CollectConsumer {
            receiver,
            td,
            current: VecDeque::new(),
            eos: false,
        }
    }
}

impl OpIterator for CollectConsumer {
    fn open(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        if !self.current.is_empty() {
            return Ok(true);
        }
        if self.eos {
            return Ok(false);
        }
        match self.receiver.recv() {
            Ok(bag) if bag.is_eos => {
                self.eos = true;
                Ok(false)
            }
            Ok(bag) => {
                self.current.extend(bag.tuples);
                Ok(!self.current.is_empty())
            }
            Err(_) => {
                self.eos = true;
                Ok(false)
            }
        }
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.current.pop_front())
    }

    fn close(&mut self) {
        self.current.clear();
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }
}

/// One `ShuffleConsumer` per partition, fed by every source worker's
/// `ShuffleProducer`. Tracks which source workers have signalled
/// end-of-stream and only reports end-of-stream itself once every
/// source has and the queue is drained.
pub struct ShuffleConsumer {
    receiver: Receiver<TupleBag>,
    td: TupleDesc,
    num_sources: usize,
    sources_done: HashSet<usize>,
    current: VecDeque<Tuple>,
}

impl ShuffleConsumer {
    pub fn new(receiver: Receiver<TupleBag>, td: TupleDesc, num_sources: usize) -> Self {
        ShuffleConsumer {
            receiver,
            td,
            num_sources,
            sources_done: HashSet::new(),
            current: VecDeque::new(),
        }
    }

    fn all_sources_done(&self) -> bool {
        self.sources_done.len() >= self.num_sources
    }
}

impl OpIterator for ShuffleConsumer {
    fn open(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        loop {
            if !self.current.is_empty() {
                return Ok(true);
            }
            if self.all_sources_done() {
                return Ok(false);
            }
            match self.receiver.recv() {
                Ok(bag) if bag.is_eos => {
                    self.sources_done.insert(bag.source_worker_id);
                }
                Ok(bag) => {
                    self.current.extend(bag.tuples);
                }
                Err(_) => return Ok(false),
            }
        }
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.current.pop_front())
    }

    fn close(&mut self) {
        self.current.clear();
    }

    fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }
}
