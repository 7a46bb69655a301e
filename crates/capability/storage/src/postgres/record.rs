//! Postgres 通用记录存储实现
//!
//! 每类实体一张表：`(id bigserial primary key, data jsonb not null)`。
//!
//! 设计要点：
//! - 过滤条件使用 jsonb 包含（`@>`），由 GIN 索引支持
//! - 主键只保存在 id 列，data 中不重复保存
//! - 使用参数化 SQL 防止注入；表名来自编译期常量

use crate::error::StorageError;
use crate::traits::{ListQuery, Record, RecordFilter, RecordStore};
use domain::Id;
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::marker::PhantomData;

pub struct PgRecordStore<R: Record> {
    pub pool: PgPool,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> PgRecordStore<R> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// 建表（已存在时跳过）
    pub async fn ensure_table(&self) -> Result<(), StorageError> {
        let create = format!(
            "create table if not exists {} (id bigserial primary key, data jsonb not null)",
            R::TABLE
        );
        sqlx::query(&create).execute(&self.pool).await?;
        let index = format!(
            "create index if not exists idx_{table}_data on {table} using gin (data jsonb_path_ops)",
            table = R::TABLE
        );
        sqlx::query(&index).execute(&self.pool).await?;
        Ok(())
    }
}

/// 拆出过滤条件：(jsonb 条件, 主键)
fn split_filter<F: RecordFilter>(filter: &F) -> Result<(Value, Option<Id>), StorageError> {
    let mut value = serde_json::to_value(filter)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok((value, filter.id()))
}

fn strip_id(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    value
}

fn row_to_record<R: Record>(row: &sqlx::postgres::PgRow) -> Result<R, StorageError> {
    let id: Id = row.try_get("id")?;
    let data: Value = row.try_get("data")?;
    let mut record: R = serde_json::from_value(data)?;
    record.set_id(id);
    Ok(record)
}

#[async_trait::async_trait]
impl<R: Record> RecordStore<R> for PgRecordStore<R> {
    async fn create(&self, mut record: R) -> Result<R, StorageError> {
        let data = strip_id(serde_json::to_value(&record)?);
        let sql = format!("insert into {} (data) values ($1) returning id", R::TABLE);
        let row = sqlx::query(&sql).bind(data).fetch_one(&self.pool).await?;
        let id: Id = row.try_get("id")?;
        record.set_id(id);
        Ok(record)
    }

    async fn load(&self, filter: &R::Filter) -> Result<Option<R>, StorageError> {
        let (data, id) = split_filter(filter)?;
        let sql = format!(
            "select id, data from {} \
             where data @> $1 and ($2::bigint is null or id = $2) \
             order by id limit 1",
            R::TABLE
        );
        let row = sqlx::query(&sql)
            .bind(data)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_record(&row)?))
    }

    async fn list(&self, query: &ListQuery<R::Filter>) -> Result<Vec<R>, StorageError> {
        let (data, id) = split_filter(&query.filter)?;
        let sql = format!(
            "select id, data from {} \
             where data @> $1 and ($2::bigint is null or id = $2) \
             order by id limit $3 offset coalesce($4, 0)",
            R::TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(data)
            .bind(id)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn update(&self, id: Id, update: &R::Update) -> Result<Option<R>, StorageError> {
        let patch = strip_id(serde_json::to_value(update)?);
        let sql = format!(
            "update {} set data = data || $1 where id = $2 returning id, data",
            R::TABLE
        );
        let row = sqlx::query(&sql)
            .bind(patch)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_record(&row)?))
    }

    async fn remove(&self, id: Id) -> Result<bool, StorageError> {
        let sql = format!("delete from {} where id = $1", R::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
