use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::error::{DbError, DbResult};
use crate::fields::{Field, FieldVal};
use crate::heap_page::HeapPageId;
use crate::types::Type;

/// Reference to a tuple on a page of a table.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct RecordId {
    pid: HeapPageId,
    tuple_no: usize,
}

impl RecordId {
    pub fn new(pid: HeapPageId, tuple_no: usize) -> Self {
        RecordId { pid, tuple_no }
    }

    pub fn get_page_id(&self) -> HeapPageId {
        self.pid
    }

    pub fn get_tuple_no(&self) -> usize {
        self.tuple_no
    }
}

#[derive(Debug, Clone)]
pub struct TupleDesc {
    types: Vec<Type>,
    fields: Vec<String>,
}

/// Equality is by type sequence only; field names are advisory (e.g. an
/// alias prefix from `with_alias`), so two descriptors naming the same
/// types under different names still compare equal.
impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.types == other.types
    }
}

impl Eq for TupleDesc {}

impl TupleDesc {
    pub fn new(types: Vec<Type>, fields: Vec<String>) -> Self {
        TupleDesc { types, fields }
    }

    /// Concatenates two descriptors, `td1.numFields + td2.numFields` long.
    pub fn merge(td1: &TupleDesc, td2: &TupleDesc) -> TupleDesc {
        let mut types = td1.types.clone();
        types.extend(td2.types.clone());
        let mut field_names = td1.fields.clone();
        field_names.extend(td2.fields.clone());
        TupleDesc::new(types, field_names)
    }

    // kept as an alias: the teacher named this `combine`.
    pub fn combine(td1: &TupleDesc, td2: &TupleDesc) -> TupleDesc {
        Self::merge(td1, td2)
    }

    pub fn get_num_fields(&self) -> usize {
        self.types.len()
    }

    pub fn get_field_name(&self, i: usize) -> Option<&String> {
        self.fields.get(i)
    }

    /// Returns the (possibly null) index of the field with a given name.
    pub fn name_to_id(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|n| n == name)
    }

    pub fn get_field_type(&self, i: usize) -> Option<&Type> {
        self.types.get(i)
    }

    /// Prefixes every field name with `alias.` (or `null.` if alias is `None`).
    pub fn with_alias(&self, alias: Option<&str>) -> TupleDesc {
        let prefix = alias.unwrap_or("null");
        let fields = self
            .fields
            .iter()
            .map(|f| format!("{}.{}", prefix, f))
            .collect();
        TupleDesc::new(self.types.clone(), fields)
    }

    /// Return the size (in bytes) of tuples corresponding to this TupleDesc.
    pub fn get_size(&self) -> usize {
        self.types.iter().fold(0, |acc, t| acc + t.get_len())
    }
}

/// A row of fields matching a `TupleDesc`, plus an optional `RecordId`
/// (absent until the tuple has been placed on a page).
#[derive(Debug, Clone)]
pub struct Tuple {
    fields: Vec<FieldVal>,
    td: TupleDesc,
    rid: Option<RecordId>,
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.td == other.td && self.fields == other.fields
    }
}
impl Eq for Tuple {}

impl Hash for Tuple {
    /// Hashes the tab-separated string form, so equal tuples hash equally
    /// regardless of how their fields were constructed.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_tab_separated().hash(state);
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.to_display_string())
    }
}

impl Tuple {
    pub fn new(fields: Vec<FieldVal>, td: &TupleDesc) -> Self {
        Tuple {
            fields,
            td: td.clone(),
            rid: None,
        }
    }

    pub fn get_tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    pub fn get_record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    pub fn get_field(&self, i: usize) -> Option<&FieldVal> {
        self.fields.get(i)
    }

    pub fn set_field(&mut self, i: usize, field: FieldVal) {
        self.fields[i] = field;
    }

    pub fn get_fields(&self) -> &[FieldVal] {
        &self.fields
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![];
        for field in self.fields.iter() {
            match field {
                FieldVal::IntField(int_field) => bytes.extend(int_field.serialize()),
                FieldVal::StringField(string_field) => bytes.extend(string_field.serialize()),
            }
        }
        bytes
    }

    pub fn deserialize(bytes: &[u8], td: &TupleDesc) -> DbResult<Self> {
        let mut offset = 0;
        let mut fields = vec![];
        for t in td.types.iter() {
            let field = t.parse(&bytes[offset..])?;
            offset += t.get_len();
            fields.push(field);
        }
        Ok(Tuple::new(fields, td))
    }

    /// Concatenates two tuples into one under the merged `TupleDesc`.
    pub fn concat(left: &Tuple, right: &Tuple) -> Tuple {
        let td = TupleDesc::merge(&left.td, &right.td);
        let mut fields = left.fields.clone();
        fields.extend(right.fields.clone());
        Tuple::new(fields, &td)
    }

    fn to_tab_separated(&self) -> String {
        self.fields
            .iter()
            .map(field_to_string)
            .collect::<Vec<_>>()
            .join("\t")
    }

    fn to_display_string(&self) -> String {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, field)| format!("{}: {}", self.td.fields[i], field_to_string(field)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn field_to_string(field: &FieldVal) -> String {
    match field {
        FieldVal::IntField(int_field) => int_field.get_value().to_string(),
        FieldVal::StringField(string_field) => string_field.get_value(),
    }
}

pub fn no_such_field(name: &str) -> DbError {
    DbError::NoSuchElement(format!("no such field: {}", name))
}
