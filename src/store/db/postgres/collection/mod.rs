mod enrollment;
mod event;
mod sequence;
mod step_run;

use std::sync::Arc;

use sea_query::{Alias as SeaAlias, Condition, Expr as SeaExpr, Order as SeaOrder, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value as SeaValue};
use sea_query_binder::SqlxBinder;
use serde_json::Value as JsonValue;
use sqlx::Row;

use crate::{
    Result,
    store::{
        PageData,
        db::postgres::{DbRow, synclient::SynClient},
        query::{Expr, Query},
    },
};

pub use enrollment::EnrollmentCollection;
pub use event::EventCollection;
pub use sequence::SequenceCollection;
pub use step_run::StepRunCollection;

use crate::store::map_db_err;

pub type DbConnection = Arc<SynClient>;

/// Translate the query filter into a sea-query condition.
pub fn into_query(q: &Query) -> Condition {
    match q.filter_expr() {
        Some(expr) => into_condition(expr),
        None => Condition::all(),
    }
}

fn into_condition(expr: &Expr) -> Condition {
    match expr {
        Expr::And(items) => items.iter().fold(Condition::all(), |cond, e| cond.add(into_condition(e))),
        Expr::Or(items) => items.iter().fold(Condition::any(), |cond, e| cond.add(into_condition(e))),
        simple => Condition::all().add(into_simple(simple)),
    }
}

fn into_simple(expr: &Expr) -> SimpleExpr {
    let col = |key: &String| SeaExpr::col(SeaAlias::new(key.as_str()));
    match expr {
        Expr::Eq(key, value) => col(key).eq(into_value(value)),
        Expr::Le(key, value) => col(key).lte(into_value(value)),
        Expr::In(key, values) => col(key).is_in(values.iter().map(into_value)),
        Expr::IsNull(key) => col(key).is_null(),
        Expr::And(_) | Expr::Or(_) => into_condition(expr).into(),
    }
}

fn into_value(value: &JsonValue) -> SeaValue {
    match value {
        JsonValue::String(s) => s.as_str().into(),
        JsonValue::Bool(b) => (*b).into(),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        _ => SeaValue::String(None),
    }
}

/// Run a paged select. `query` selects the columns, `count_query` the row count.
fn query_page<T: DbRow>(
    conn: &DbConnection,
    mut query: SelectStatement,
    mut count_query: SelectStatement,
    q: &Query,
) -> Result<PageData<T>> {
    let filter = into_query(q);
    if !filter.is_empty() {
        count_query.cond_where(filter.clone());
        query.cond_where(filter);
    }

    for (order, rev) in q.order_by().iter() {
        query.order_by(
            SeaAlias::new(order.as_str()),
            if *rev {
                SeaOrder::Desc
            } else {
                SeaOrder::Asc
            },
        );
    }
    let (sql, values) = query.limit(q.limit() as u64).build_sqlx(PostgresQueryBuilder);

    let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
    let count = conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
    let rows = conn.query(&sql, values).map_err(map_db_err)?.iter().map(T::from_row).collect::<std::result::Result<Vec<_>, _>>().map_err(map_db_err)?;

    Ok(PageData {
        count,
        page_size: q.limit(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use sea_query::Query as SeaQuery;

    use super::*;

    #[test]
    fn test_into_query_sql() {
        let q = Query::new().filter(Expr::eq("status", 2).and(Expr::is_null("next_action_at")).or(Expr::le("next_action_at", 100).and(Expr::is_in("status", [2, 3, 4]))));

        let sql = SeaQuery::select().column(SeaAlias::new("id")).from(SeaAlias::new("enrollments")).cond_where(into_query(&q)).to_string(PostgresQueryBuilder);
        assert_eq!(
            sql,
            r#"SELECT "id" FROM "enrollments" WHERE ("status" = 2 AND "next_action_at" IS NULL) OR ("next_action_at" <= 100 AND "status" IN (2, 3, 4))"#
        );
    }

    #[test]
    fn test_empty_filter() {
        assert!(into_query(&Query::new()).is_empty());
    }
}
