use std::sync::Mutex;

use crate::buffer_pool::PAGE_SIZE;
use crate::error::{DbError, DbResult};
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Tuple, TupleDesc};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Copy)]
pub enum Permission {
    Read,
    Write,
}

/// Representation of a page id: just a table id and a page number.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Copy)]
pub struct HeapPageId {
    table_id: usize,
    page_number: usize,
}

impl HeapPageId {
    pub fn new(table_id: usize, page_number: usize) -> Self {
        HeapPageId {
            table_id,
            page_number,
        }
    }

    pub fn get_table_id(&self) -> usize {
        self.table_id
    }

    pub fn get_page_number(&self) -> usize {
        self.page_number
    }

    pub fn serialize(&self) -> Vec<usize> {
        vec![self.table_id, self.page_number]
    }
}

/// Representation for a set of bytes of data read from disk.
/// Format is header bytes + tuple bytes. Header bytes indicate
/// whether or not a tuple is present in that slot on the page.
/// The number of bytes for header is equal to ceiling(# tuple slots / 8).
#[derive(Debug)]
pub struct HeapPage {
    pid: HeapPageId,
    td: TupleDesc,
    header_size: usize,
    header: Vec<u8>,
    tuples: Vec<Tuple>,
    num_slots: usize,
    // Guarded on its own so a concurrent `set_before_image` can never
    // race a `get_before_image` read of the same byte buffer.
    old_data: Mutex<Vec<u8>>,
    dirtied_by: Option<TransactionId>,
}

impl PartialEq for HeapPage {
    fn eq(&self, other: &Self) -> bool {
        self.pid == other.pid
            && self.td == other.td
            && self.header == other.header
            && self.tuples == other.tuples
    }
}
impl Eq for HeapPage {}

impl Clone for HeapPage {
    fn clone(&self) -> Self {
        HeapPage {
            pid: self.pid,
            td: self.td.clone(),
            header_size: self.header_size,
            header: self.header.clone(),
            tuples: self.tuples.clone(),
            num_slots: self.num_slots,
            old_data: Mutex::new(self.old_data.lock().unwrap().clone()),
            dirtied_by: self.dirtied_by,
        }
    }
}

pub fn slot_count_for(td: &TupleDesc) -> usize {
    (PAGE_SIZE * 8) / (td.get_size() * 8 + 1)
}

impl HeapPage {
    pub fn new(pid: HeapPageId, data: Vec<u8>, td: TupleDesc) -> DbResult<Self> {
        let num_slots = slot_count_for(&td);
        let header_size = (num_slots as f64 / 8.0).ceil() as usize;
        let header = data[..header_size].to_vec();

        let mut tuples = vec![];
        for i in 0..num_slots {
            if Self::get_slot(&header, i) {
                let start = header_size + i * td.get_size();
                let end = start + td.get_size();
                let tuple_data = &data[start..end];
                let mut tuple = Tuple::deserialize(tuple_data, &td)?;
                tuple.set_record_id(Some(RecordId::new(pid, i)));
                tuples.push(tuple);
            } else {
                tuples.push(Tuple::new(vec![], &td));
            }
        }

        Ok(HeapPage {
            pid,
            td,
            header_size,
            header,
            tuples,
            num_slots,
            old_data: Mutex::new(data),
            dirtied_by: None,
        })
    }

    pub fn get_id(&self) -> HeapPageId {
        self.pid
    }

    /// Snapshot of the page as of the last `set_before_image` (initially
    /// the page as read from disk).
    pub fn get_before_image(&self) -> HeapPage {
        let data = self.old_data.lock().unwrap().clone();
        HeapPage::new(self.pid, data, self.td.clone())
            .expect("before-image bytes were always a previously valid page")
    }

    pub fn set_before_image(&mut self) {
        let data = self.get_page_data();
        *self.old_data.lock().unwrap() = data;
    }

    pub fn get_page_data(&self) -> Vec<u8> {
        let mut data = self.header.clone();
        for i in 0..self.num_slots {
            if Self::get_slot(&self.header, i) {
                data.extend(self.tuples[i].serialize());
            } else {
                data.extend(vec![0; self.td.get_size()]);
            }
        }
        // pad the rest of the page with 0s
        data.extend(vec![0; PAGE_SIZE - data.len()]);
        data
    }

    fn get_slot(header: &[u8], i: usize) -> bool {
        let idx = i / 8;
        let bit = i % 8;
        if idx >= header.len() {
            return false;
        }
        let byte = header[idx];
        let mask = 1 << bit;
        byte & mask != 0
    }

    fn set_slot(header: &mut [u8], i: usize, value: bool) {
        let idx = i / 8;
        let bit = i % 8;
        let byte = header[idx];
        let mask = 1 << bit;
        if value {
            header[idx] = byte | mask;
        } else {
            header[idx] = byte & !mask;
        }
    }

    /// Places `t` in the lowest-indexed free slot, assigning its record id.
    /// Only the field types need to match this page's schema, not the
    /// names: a tuple arriving via an aliased `SeqScan` (e.g. an
    /// insert-select pipeline) carries renamed fields over identical types.
    pub fn add_tuple(&mut self, mut t: Tuple) -> DbResult<()> {
        if t.get_tuple_desc().get_num_fields() != self.td.get_num_fields()
            || (0..self.td.get_num_fields())
                .any(|i| t.get_tuple_desc().get_field_type(i) != self.td.get_field_type(i))
        {
            return Err(DbError::SchemaMismatch);
        }
        for i in 0..self.num_slots {
            if !Self::get_slot(&self.header, i) {
                t.set_record_id(Some(RecordId::new(self.pid, i)));
                self.tuples[i] = t;
                Self::set_slot(&mut self.header, i, true);
                return Ok(());
            }
        }
        Err(DbError::PageFull)
    }

    pub fn delete_tuple(&mut self, t: &mut Tuple) -> DbResult<()> {
        let rid = match t.get_record_id() {
            Some(rid) => rid,
            None => return Err(DbError::NotOnPage),
        };
        if rid.get_page_id() != self.pid {
            return Err(DbError::NotOnPage);
        }
        let tuple_no = rid.get_tuple_no();
        // Compare field values only, not `TupleDesc`: `t` may have come
        // through a `SeqScan` alias, which renames fields without
        // changing what's stored on the page.
        if tuple_no >= self.num_slots
            || !Self::get_slot(&self.header, tuple_no)
            || self.tuples[tuple_no].get_fields() != t.get_fields()
        {
            return Err(DbError::NotOnPage);
        }

        self.tuples[tuple_no] = Tuple::new(vec![], &self.td);
        Self::set_slot(&mut self.header, tuple_no, false);
        t.set_record_id(None);
        Ok(())
    }

    pub fn get_num_empty_slots(&self) -> usize {
        let mut count = 0;
        for i in 0..self.num_slots {
            if !Self::get_slot(&self.header, i) {
                count += 1;
            }
        }
        count
    }

    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        if dirty {
            self.dirtied_by = Some(tid);
        } else {
            self.dirtied_by = None;
        }
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn iter(&self) -> HeapPageIterator {
        HeapPageIterator {
            page: self,
            index: 0,
        }
    }

    pub fn get_tuple(&self, i: usize) -> &Tuple {
        &self.tuples[i]
    }

    pub fn num_tuples(&self) -> usize {
        self.num_slots
    }

    pub fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }
}

pub struct HeapPageIterator<'a> {
    page: &'a HeapPage,
    index: usize,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = &'a Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.page.num_slots {
            let i = self.index;
            self.index += 1;
            if HeapPage::get_slot(&self.page.header, i) {
                return Some(&self.page.tuples[i]);
            }
        }
        None
    }
}
