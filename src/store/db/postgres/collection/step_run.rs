use sea_query::{ColumnDef, Expr as SeaExpr, Func as SeaFunc, Iden, Index, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Error as DbError, Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        DbCollection, PageData, data,
        db::postgres::{DbInit, DbRow},
        query,
    },
};

use super::{DbConnection, map_db_err, query_page};

#[derive(Debug)]
pub struct StepRunCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "step_runs"]
enum CollectionIden {
    Table,

    Id,
    Eid,
    Seq,
    StepIndex,
    Status,
    Result,
    ExecutedAt,
}

const COLUMNS: [CollectionIden; 7] = [
    CollectionIden::Id,
    CollectionIden::Eid,
    CollectionIden::Seq,
    CollectionIden::StepIndex,
    CollectionIden::Status,
    CollectionIden::Result,
    CollectionIden::ExecutedAt,
];

impl DbCollection for StepRunCollection {
    type Item = data::StepRun;

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
        let data = data.clone();
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(CollectionIden::Table)
            .columns(COLUMNS)
            .values([
                data.id.into(),
                data.eid.into(),
                data.seq.into(),
                data.step_index.into(),
                data.status.into(),
                data.result.into(),
                data.executed_at.into(),
            ])
            .map_err(map_db_err)?
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
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
                (CollectionIden::Seq, model.seq.into()),
                (CollectionIden::StepIndex, model.step_index.into()),
                (CollectionIden::Status, model.status.into()),
                (CollectionIden::Result, model.result.into()),
                (CollectionIden::ExecutedAt, model.executed_at.into()),
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

impl DbRow for data::StepRun {
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
            seq: row.try_get("seq")?,
            step_index: row.try_get("step_index")?,
            status: row.try_get("status")?,
            result: row.try_get("result")?,
            executed_at: row.try_get("executed_at")?,
        })
    }
}

impl DbInit for StepRunCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Eid).string().not_null())
                .col(ColumnDef::new(CollectionIden::Seq).big_integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::StepIndex).big_integer().not_null())
                .col(ColumnDef::new(CollectionIden::Status).integer().not_null())
                .col(ColumnDef::new(CollectionIden::Result).text())
                .col(ColumnDef::new(CollectionIden::ExecutedAt).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_step_runs_eid").if_not_exists().table(CollectionIden::Table).col(CollectionIden::Eid).build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl StepRunCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
