use crate::tuple::Tuple;

/// Chooses which of `num_partitions` destination workers a tuple is
/// routed to. The concrete strategy is external to the core; only the
/// interface is specified.
pub trait PartitionFunction: Send + Sync {
    fn partition(&self, tuple: &Tuple, num_partitions: usize) -> usize;
}

/// Hashes a single field's value, the usual strategy for a shuffle on
/// a join or group-by key.
pub struct FieldHashPartition {
    field_index: usize,
}

impl FieldHashPartition {
    pub fn new(field_index: usize) -> Self {
        FieldHashPartition { field_index }
    }
}

impl PartitionFunction for FieldHashPartition {
    fn partition(&self, tuple: &Tuple, num_partitions: usize) -> usize {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        if let Some(field) = tuple.get_field(self.field_index) {
            field.hash(&mut hasher);
        }
        (hasher.finish() as usize) % num_partitions.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldVal, IntField};
    use crate::tuple::TupleDesc;
    use crate::types::Type;

    #[test]
    fn same_key_always_routes_to_same_partition() {
        let td = TupleDesc::new(vec![Type::IntType], vec!["a".to_string()]);
        let t1 = Tuple::new(vec![FieldVal::IntField(IntField::new(42))], &td);
        let t2 = Tuple::new(vec![FieldVal::IntField(IntField::new(42))], &td);
        let part = FieldHashPartition::new(0);
        assert_eq!(part.partition(&t1, 8), part.partition(&t2, 8));
    }
}
