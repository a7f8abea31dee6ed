use teachdb::database::DbContext;
use teachdb::error::DbResult;
use teachdb::fields::{FieldVal, IntField, StringField};
use teachdb::heap_file::HeapFile;
use teachdb::operator::OpIterator;
use teachdb::operators::aggregate::{AggOp, Aggregate};
use teachdb::operators::filter::Filter;
use teachdb::operators::insert::Insert;
use teachdb::operators::seq_scan::SeqScan;
use teachdb::predicate::{Op, Predicate};
use teachdb::transaction::{Transaction, TransactionId};
use teachdb::tuple::{Tuple, TupleDesc};
use teachdb::types::Type;

fn employee_schema() -> TupleDesc {
    TupleDesc::new(
        vec![Type::IntType, Type::StringType],
        vec!["id".to_string(), "name".to_string()],
    )
}

fn insert_one(ctx: &DbContext, table_id: usize, tid: TransactionId, t: Tuple) -> DbResult<()> {
    struct OneShot(Option<Tuple>, TupleDesc);
    impl OpIterator for OneShot {
        fn open(&mut self) -> DbResult<()> {
            Ok(())
        }
        fn has_next(&mut self) -> DbResult<bool> {
            Ok(self.0.is_some())
        }
        fn next(&mut self) -> DbResult<Option<Tuple>> {
            Ok(self.0.take())
        }
        fn close(&mut self) {}
        fn get_tuple_desc(&self) -> &TupleDesc {
            &self.1
        }
    }
    let td = t.get_tuple_desc().clone();
    let source = Box::new(OneShot(Some(t), td));
    let mut insert = Insert::new(tid, ctx.get_buffer_pool(), table_id, source);
    insert.open()?;
    insert.next()?;
    insert.close();
    Ok(())
}

/// A fresh, uniquely-named table file under the system temp directory.
/// `main` is a demo binary outside the `cfg(test)` tree, so it can't
/// reach for the `tempfile` dev-dependency; `uuid` is already a
/// production dependency and gives us a collision-free name instead.
fn temp_table_file() -> std::io::Result<std::fs::File> {
    let path = std::env::temp_dir().join(format!("teachdb-{}.tbl", uuid::Uuid::new_v4()));
    std::fs::OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn main() -> DbResult<()> {
    env_logger::init();

    let ctx = DbContext::default();
    let heap_file = HeapFile::new(temp_table_file().expect("temp table file"), employee_schema());
    let table_id = heap_file.get_id();
    ctx.get_catalog().add_table(heap_file, "employees".to_string());
    log::info!("table id: {}", table_id);

    let tid = TransactionId::new();
    for (i, name) in ["ada", "grace", "linus"].iter().enumerate() {
        let t = Tuple::new(
            vec![
                FieldVal::IntField(IntField::new(i as i32)),
                FieldVal::StringField(StringField::new(name.to_string())),
            ],
            &employee_schema(),
        );
        insert_one(&ctx, table_id, tid, t)?;
    }
    Transaction::begin(ctx.get_buffer_pool()).commit()?;

    // Scan, filter to ids >= 1, and count the survivors.
    let read_tid = TransactionId::new();
    let scan = SeqScan::new(ctx.get_buffer_pool(), ctx.get_catalog(), read_tid, table_id, Some("e"))?;
    let predicate = Predicate::new(0, Op::GreaterThanOrEq, FieldVal::IntField(IntField::new(1)));
    let filter = Filter::new(predicate, Box::new(scan));
    let mut count = Aggregate::new(Box::new(filter), 0, teachdb::operators::aggregate::NO_GROUPING, AggOp::Count);

    count.open()?;
    while let Some(t) = count.next()? {
        log::info!("matching rows: {}", t);
    }
    count.close();

    Transaction::begin(ctx.get_buffer_pool()).commit()
}
