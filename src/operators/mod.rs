pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod join;
pub mod seq_scan;
