use crate::predicate::Op;
use crate::types::{Type, STRING_SIZE};
use std::hash::{Hash, Hasher};

// Wrapper for different types of fields
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum FieldVal {
    IntField(IntField),
    StringField(StringField),
}

impl FieldVal {
    // Extracts the inner IntField
    pub fn into_int(self) -> Option<IntField> {
        match self {
            FieldVal::IntField(int_field) => Some(int_field),
            _ => None,
        }
    }
    // Extracts the inner StringField
    pub fn into_string(self) -> Option<StringField> {
        match self {
            FieldVal::StringField(string_field) => Some(string_field),
            _ => None,
        }
    }

    /// Evaluates one of the six comparison operators, plus `LIKE` for
    /// strings (substring match). Comparing across types, or `LIKE`
    /// against a non-string, is always false.
    pub fn compare(&self, op: Op, other: &FieldVal) -> bool {
        match (self, other) {
            (FieldVal::IntField(a), FieldVal::IntField(b)) => {
                let (a, b) = (a.value, b.value);
                match op {
                    Op::Equals => a == b,
                    Op::NotEquals => a != b,
                    Op::LessThan => a < b,
                    Op::LessThanOrEq => a <= b,
                    Op::GreaterThan => a > b,
                    Op::GreaterThanOrEq => a >= b,
                    Op::Like => false,
                }
            }
            (FieldVal::StringField(a), FieldVal::StringField(b)) => {
                let (a, b) = (&a.value, &b.value);
                match op {
                    Op::Equals => a == b,
                    Op::NotEquals => a != b,
                    Op::LessThan => a < b,
                    Op::LessThanOrEq => a <= b,
                    Op::GreaterThan => a > b,
                    Op::GreaterThanOrEq => a >= b,
                    Op::Like => a.contains(b.as_str()),
                }
            }
            _ => false,
        }
    }
}

// Trait for different types of fields
pub trait Field {
    // Get the type of the field
    fn get_type(&self) -> Type;
    // Serialize the field into bytes
    fn serialize(&self) -> Vec<u8>;
}

#[derive(Debug, Clone)]
pub struct IntField {
    value: i32,
}

impl IntField {
    pub fn new(value: i32) -> Self {
        IntField { value }
    }
    pub fn get_value(&self) -> i32 {
        self.value
    }
}

impl PartialEq for IntField {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl Eq for IntField {}
impl Hash for IntField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Field for IntField {
    fn get_type(&self) -> Type {
        Type::IntType
    }
    fn serialize(&self) -> Vec<u8> {
        self.value.to_be_bytes().to_vec()
    }
}

/// A string-typed field. Equality and hashing are over the logical
/// value only, never over the padding bytes used at serialization
/// time, so equal values collide in a hash-join bucket regardless of
/// how they were padded (spec section 9 design note).
#[derive(Debug, Clone)]
pub struct StringField {
    value: String,
}

impl StringField {
    pub fn new(value: String) -> Self {
        StringField { value }
    }

    pub fn get_value(&self) -> String {
        self.value.clone()
    }
}

impl PartialEq for StringField {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl Eq for StringField {}
impl Hash for StringField {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Field for StringField {
    fn get_type(&self) -> Type {
        Type::StringType
    }

    fn serialize(&self) -> Vec<u8> {
        let mut bytes = vec![0; STRING_SIZE + 4];
        let str_bytes = self.value.as_bytes();
        let copy_len = std::cmp::min(str_bytes.len(), STRING_SIZE);
        bytes[0..4].copy_from_slice(&(copy_len as u32).to_be_bytes());
        // copy as many bytes as possible from string and pad with 0s
        bytes[4..4 + copy_len].copy_from_slice(&str_bytes[..copy_len]);
        bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_int_field() {
        let int_field = IntField::new(1);
        assert_eq!(int_field.get_type(), Type::IntType);
        assert_eq!(int_field.serialize(), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_string_field() {
        let string_field = StringField::new("hello".to_string());
        assert_eq!(string_field.get_type(), Type::StringType);
        let mut serialized = vec![0u8; STRING_SIZE + 4];
        serialized[3] = 5;
        serialized[4..9].copy_from_slice("hello".as_bytes());

        assert_eq!(string_field.serialize(), serialized);
    }

    #[test]
    fn string_hash_ignores_padding() {
        use std::collections::hash_map::DefaultHasher;
        let a = FieldVal::StringField(StringField::new("abc".to_string()));
        let b = FieldVal::StringField(StringField::new("abc".to_string()));
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
        assert_eq!(a, b);
    }

    #[test]
    fn like_is_substring_match() {
        let a = FieldVal::StringField(StringField::new("hello world".to_string()));
        let pat = FieldVal::StringField(StringField::new("wor".to_string()));
        assert!(a.compare(Op::Like, &pat));
        let pat2 = FieldVal::StringField(StringField::new("xyz".to_string()));
        assert!(!a.compare(Op::Like, &pat2));
    }

    #[test]
    fn int_comparisons() {
        let a = FieldVal::IntField(IntField::new(5));
        let b = FieldVal::IntField(IntField::new(3));
        assert!(a.compare(Op::GreaterThan, &b));
        assert!(!a.compare(Op::LessThan, &b));
        assert!(a.compare(Op::NotEquals, &b));
        assert!(!a.compare(Op::Like, &b));
    }
}
