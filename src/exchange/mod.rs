pub mod consumer;
pub mod partition;
pub mod producer;
pub mod tuple_bag;
pub mod worker;
