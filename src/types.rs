use crate::error::{DbError, DbResult};
use crate::fields::{FieldVal, IntField, StringField};

/// Crate-wide fixed width for string fields (spec: "fixed-width bytes, length <= 128").
pub const STRING_SIZE: usize = 128;

// Only support Int and String types
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Type {
    IntType,
    StringType,
}

impl Type {
    // Get the size of the type in bytes
    pub fn get_len(&self) -> usize {
        match self {
            // 4 bytes ints
            Type::IntType => 4,
            // 4 bytes for length + STRING_SIZE bytes for string
            Type::StringType => STRING_SIZE + 4,
        }
    }

    // Parse bytes into a FieldVal
    pub fn parse(&self, bytes: &[u8]) -> DbResult<FieldVal> {
        match self {
            Type::IntType => {
                let mut int_bytes = [0; 4];
                int_bytes.copy_from_slice(&bytes[..4]);
                Ok(FieldVal::IntField(IntField::new(i32::from_be_bytes(
                    int_bytes,
                ))))
            }
            Type::StringType => {
                let mut len_bytes = [0; 4];
                len_bytes.copy_from_slice(&bytes[..4]);
                let len = u32::from_be_bytes(len_bytes) as usize;
                let len = len.min(STRING_SIZE);
                let string_bytes = bytes[4..4 + len].to_vec();
                let value = String::from_utf8(string_bytes)
                    .map_err(|e| DbError::NoSuchElement(e.to_string()))?;
                Ok(FieldVal::StringField(StringField::new(value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips() {
        let f = IntField::new(-7);
        let bytes = crate::fields::Field::serialize(&f);
        let parsed = Type::IntType.parse(&bytes).unwrap();
        assert_eq!(parsed.into_int().unwrap().get_value(), -7);
    }

    #[test]
    fn string_round_trips() {
        let f = StringField::new("hello".to_string());
        let bytes = crate::fields::Field::serialize(&f);
        let parsed = Type::StringType.parse(&bytes).unwrap();
        assert_eq!(parsed.into_string().unwrap().get_value(), "hello");
    }
}
