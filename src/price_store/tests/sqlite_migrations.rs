mod common;
use common::{assert_sqlite_pragmas, setup_db};

use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Integer;

#[derive(QueryableByName)]
struct TblCnt {
    #[diesel(sql_type = Integer)]
    cnt: i32,
}

#[test]
fn migrations_apply_and_pragmas_are_set() {
    let (_db, mut conn) = setup_db();

    assert_sqlite_pragmas(&mut conn);

    let tbls: TblCnt = sql_query(
        "SELECT COUNT(*) AS cnt
            FROM sqlite_master
            WHERE type='table'
            AND name IN ('stock_data','stock_data_log');",
    )
    .get_result(&mut conn)
    .unwrap();
    assert_eq!(tbls.cnt, 2, "expected both tables to be present");
}

#[test]
fn connect_dispatches_on_backend() {
    use price_store::db::connection::connect;
    use price_store::db::session::{Dialect, SqlSession};
    use price_store::with_session;
    use shared_utils::config::DatabaseBackend;

    let (db, _conn) = setup_db();
    let mut conn = connect(&db.config()).unwrap();
    assert_eq!(conn.backend(), DatabaseBackend::Sqlite);

    let dialect = with_session!(&mut conn, |s| s.dialect());
    assert_eq!(dialect, Dialect::Sqlite);
    let exists = with_session!(&mut conn, |s| s.table_exists(None, "stock_data")).unwrap();
    assert!(exists);
}
