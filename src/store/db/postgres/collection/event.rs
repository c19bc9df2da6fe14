use std::{sync::Arc, time::Duration};

use flume::{Receiver, Sender};
use sea_query::{ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};
use tokio::{runtime::Runtime, time::MissedTickBehavior};
use tracing::{error, warn};

use crate::{
    Result,
    store::{
        DbCollection, PageData, data,
        db::postgres::{DbInit, DbRow},
        query,
    },
};

use super::{DbConnection, map_db_err, query_page};

/// Event log. Inserts are buffered and written in batches.
#[derive(Debug)]
pub struct EventCollection {
    conn: DbConnection,

    batch_tx: Sender<data::Event>,
    batch_rx: Receiver<data::Event>,

    runtime: Arc<Runtime>,
}

#[derive(Iden)]
#[iden = "events"]
enum CollectionIden {
    Table,

    Id,
    Eid,
    Sid,
    Name,
    Message,
    Timestamp,
}

const COLUMNS: [CollectionIden; 6] = [
    CollectionIden::Id,
    CollectionIden::Eid,
    CollectionIden::Sid,
    CollectionIden::Name,
    CollectionIden::Message,
    CollectionIden::Timestamp,
];

impl DbCollection for EventCollection {
    type Item = data::Event;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .expr(SeaFunc::count(SeaExpr::col(CollectionIden::Id)))
            .and_where(SeaExpr::col(CollectionIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        let (sql, values) = SeaQuery::select()
            .from(CollectionIden::Table)
            .columns(COLUMNS)
            .and_where(SeaExpr::col(CollectionIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(&sql, values).map_err(map_db_err)?;
        Self::Item::from_row(&row).map_err(map_db_err)
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        let mut count_query = SeaQuery::select();
        count_query.from(CollectionIden::Table).expr(SeaFunc::count(SeaExpr::col(CollectionIden::Id)));

        let mut query = SeaQuery::select();
        query.columns(COLUMNS).from(CollectionIden::Table);

        query_page(&self.conn, query, count_query, q)
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        self.batch_tx.send(data.clone()).map_err(map_db_err)?;
        Ok(true)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        let model = data.clone();
        let (sql, sql_values) = SeaQuery::update()
            .table(CollectionIden::Table)
            .values([
                (CollectionIden::Eid, model.eid.into()),
                (CollectionIden::Sid, model.sid.into()),
                (CollectionIden::Name, model.name.into()),
                (CollectionIden::Message, model.message.into()),
                (CollectionIden::Timestamp, model.timestamp.into()),
            ])
            .and_where(SeaExpr::col(CollectionIden::Id).eq(data.id()))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        let (sql, values) =
            SeaQuery::delete().from_table(CollectionIden::Table).and_where(SeaExpr::col(CollectionIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

impl DbRow for data::Event {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            eid: row.try_get("eid")?,
            sid: row.try_get("sid")?,
            name: row.try_get("name")?,
            message: row.try_get("message")?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

impl DbInit for EventCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Eid).string().not_null())
                .col(ColumnDef::new(CollectionIden::Sid).string().default(""))
                .col(ColumnDef::new(CollectionIden::Name).string().default(""))
                .col(ColumnDef::new(CollectionIden::Message).text().default(""))
                .col(ColumnDef::new(CollectionIden::Timestamp).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_events_eid").if_not_exists().table(CollectionIden::Table).col(CollectionIden::Eid).build(PostgresQueryBuilder),
            Index::create().name("idx_events_sid").if_not_exists().table(CollectionIden::Table).col(CollectionIden::Sid).build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl EventCollection {
    /// Batch size for inserting event records
    const BATCH_SIZE: usize = 1000;
    /// Timeout for flushing the batch
    const TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(
        conn: &DbConnection,
        runtime: Arc<Runtime>,
    ) -> Self {
        let (batch_tx, batch_rx) = flume::bounded(1024);
        let collection = Self {
            conn: conn.clone(),
            batch_tx,
            batch_rx,
            runtime,
        };
        collection.watch_batch();
        collection
    }

    fn watch_batch(&self) {
        let rx = self.batch_rx.clone();
        let conn = self.conn.clone();
        self.runtime.spawn(async move {
            let mut batch = Vec::with_capacity(Self::BATCH_SIZE);
            let mut interval = tokio::time::interval(Self::TIMEOUT);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !batch.is_empty() {
                            let items = std::mem::take(&mut batch);
                            Self::batch_events(&conn, items);
                        }
                    }
                    event = rx.recv_async() => {
                        match event {
                            Ok(event) => {
                                batch.push(event);
                                if batch.len() >= Self::BATCH_SIZE {
                                    let items = std::mem::take(&mut batch);
                                    Self::batch_events(&conn, items);
                                    interval.reset();
                                }
                            }
                            Err(_) => {
                                if !batch.is_empty() {
                                    Self::batch_events(&conn, std::mem::take(&mut batch));
                                }
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    fn batch_events(
        conn: &DbConnection,
        items: Vec<data::Event>,
    ) {
        let mut binding = SeaQuery::insert();
        let stmt = binding.into_table(CollectionIden::Table).columns(COLUMNS);

        for item in items {
            if let Err(e) = stmt.values(vec![item.id.into(), item.eid.into(), item.sid.into(), item.name.into(), item.message.into(), item.timestamp.into()]) {
                warn!("failed to bind event record: {}", e);
            }
        }

        let (sql, values) = stmt.build_sqlx(PostgresQueryBuilder);

        if let Err(e) = conn.execute(sql.as_str(), values) {
            error!("failed to insert event records: {}", e);
        }
    }
}
