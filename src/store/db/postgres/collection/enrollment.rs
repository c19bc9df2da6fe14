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
pub struct EnrollmentCollection {
    conn: DbConnection,
}

#[derive(Iden)]
#[iden = "enrollments"]
enum CollectionIden {
    Table,

    Id,
    Sid,
    LeadId,
    StepIndex,
    Status,
    NextActionAt,
    LastReply,
    LastClassification,
    Err,
    CreateTime,
    UpdateTime,
}

const COLUMNS: [CollectionIden; 11] = [
    CollectionIden::Id,
    CollectionIden::Sid,
    CollectionIden::LeadId,
    CollectionIden::StepIndex,
    CollectionIden::Status,
    CollectionIden::NextActionAt,
    CollectionIden::LastReply,
    CollectionIden::LastClassification,
    CollectionIden::Err,
    CollectionIden::CreateTime,
    CollectionIden::UpdateTime,
];

impl DbCollection for EnrollmentCollection {
    type Item = data::Enrollment;

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
                data.sid.into(),
                data.lead_id.into(),
                data.step_index.into(),
                data.status.into(),
                data.next_action_at.into(),
                data.last_reply.into(),
                data.last_classification.into(),
                data.err.into(),
                data.create_time.into(),
                data.update_time.into(),
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
                (CollectionIden::Sid, model.sid.into()),
                (CollectionIden::LeadId, model.lead_id.into()),
                (CollectionIden::StepIndex, model.step_index.into()),
                (CollectionIden::Status, model.status.into()),
                (CollectionIden::NextActionAt, model.next_action_at.into()),
                (CollectionIden::LastReply, model.last_reply.into()),
                (CollectionIden::LastClassification, model.last_classification.into()),
                (CollectionIden::Err, model.err.into()),
                (CollectionIden::CreateTime, model.create_time.into()),
                (CollectionIden::UpdateTime, model.update_time.into()),
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

impl DbRow for data::Enrollment {
    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &PgRow) -> std::result::Result<Self, DbError>
    where
        Self: Sized,
    {
        Ok(Self {
            id: row.try_get("id")?,
            sid: row.try_get("sid")?,
            lead_id: row.try_get("lead_id")?,
            step_index: row.try_get("step_index")?,
            status: row.try_get("status")?,
            next_action_at: row.try_get("next_action_at")?,
            last_reply: row.try_get("last_reply")?,
            last_classification: row.try_get("last_classification")?,
            err: row.try_get("err")?,
            create_time: row.try_get("create_time")?,
            update_time: row.try_get("update_time")?,
        })
    }
}

impl DbInit for EnrollmentCollection {
    fn init(&self) -> Result<()> {
        let sql = [
            Table::create()
                .table(CollectionIden::Table)
                .if_not_exists()
                .col(ColumnDef::new(CollectionIden::Id).string().not_null().primary_key())
                .col(ColumnDef::new(CollectionIden::Sid).string().not_null())
                .col(ColumnDef::new(CollectionIden::LeadId).string().not_null())
                .col(ColumnDef::new(CollectionIden::StepIndex).big_integer().not_null().default(0))
                .col(ColumnDef::new(CollectionIden::Status).integer().not_null())
                .col(ColumnDef::new(CollectionIden::NextActionAt).big_integer())
                .col(ColumnDef::new(CollectionIden::LastReply).text())
                .col(ColumnDef::new(CollectionIden::LastClassification).string())
                .col(ColumnDef::new(CollectionIden::Err).text())
                .col(ColumnDef::new(CollectionIden::CreateTime).big_integer().default(0))
                .col(ColumnDef::new(CollectionIden::UpdateTime).big_integer().default(0))
                .build(PostgresQueryBuilder),
            Index::create().name("idx_enrollments_sid").if_not_exists().table(CollectionIden::Table).col(CollectionIden::Sid).build(PostgresQueryBuilder),
            Index::create().name("idx_enrollments_lead_id").if_not_exists().table(CollectionIden::Table).col(CollectionIden::LeadId).build(PostgresQueryBuilder),
            Index::create()
                .name("idx_enrollments_due")
                .if_not_exists()
                .table(CollectionIden::Table)
                .col(CollectionIden::Status)
                .col(CollectionIden::NextActionAt)
                .build(PostgresQueryBuilder),
        ];
        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl EnrollmentCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }
}
