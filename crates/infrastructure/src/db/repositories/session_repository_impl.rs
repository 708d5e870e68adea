//! session 仓储实现, 按 `id % shards` 分表

use std::sync::Arc;

use application::ports::IdGenerator;
use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::now_ms;
use domain::repositories::session_repository::SessionRepository;
use domain::session::Session;
use sqlx::FromRow;

use crate::db::{db_err, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct DbSession {
    pub id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    #[sqlx(rename = "type")]
    pub session_type: i32,
    pub mute: i32,
    pub ext_data: Option<String>,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

impl From<DbSession> for Session {
    fn from(row: DbSession) -> Self {
        Session {
            id: row.id,
            name: row.name,
            remark: row.remark,
            function_flag: row.function_flag,
            session_type: row.session_type,
            mute: row.mute,
            ext_data: row.ext_data,
            create_time: row.create_time,
            update_time: row.update_time,
            deleted: row.deleted,
        }
    }
}

const COLUMNS: &str =
    "id, name, remark, function_flag, type, mute, ext_data, create_time, update_time, deleted";

pub struct MysqlSessionRepository {
    pool: DbPool,
    plan: ShardPlan,
    id_gen: Arc<dyn IdGenerator>,
}

impl MysqlSessionRepository {
    pub fn new(pool: DbPool, plan: ShardPlan, id_gen: Arc<dyn IdGenerator>) -> Self {
        Self { pool, plan, id_gen }
    }
}

#[async_trait]
impl SessionRepository for MysqlSessionRepository {
    async fn create_empty(
        &self,
        session_type: i32,
        name: &str,
        remark: &str,
        function_flag: i64,
        ext_data: Option<&str>,
    ) -> DomainResult<Session> {
        let id = self.id_gen.next_id();
        let now = now_ms();
        let sql = format!(
            "INSERT INTO {} (id, name, remark, function_flag, type, mute, ext_data, \
             create_time, update_time, deleted) VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, 0)",
            self.plan.table("session", id)
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(remark)
            .bind(function_flag)
            .bind(session_type)
            .bind(ext_data)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Session {
            id,
            name: name.to_string(),
            remark: remark.to_string(),
            function_flag,
            session_type,
            mute: 0,
            ext_data: ext_data.map(|s| s.to_string()),
            create_time: now,
            update_time: now,
            deleted: 0,
        })
    }

    async fn find(&self, session_id: i64) -> DomainResult<Option<Session>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ? AND deleted = 0",
            COLUMNS,
            self.plan.table("session", session_id)
        );
        let row: Option<DbSession> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn update(
        &self,
        session_id: i64,
        name: Option<&str>,
        remark: Option<&str>,
        mute: Option<i32>,
        function_flag: Option<i64>,
        ext_data: Option<&str>,
    ) -> DomainResult<()> {
        let mut sets = Vec::new();
        if name.is_some() {
            sets.push("name = ?");
        }
        if remark.is_some() {
            sets.push("remark = ?");
        }
        if mute.is_some() {
            sets.push("mute = ?");
        }
        if function_flag.is_some() {
            sets.push("function_flag = ?");
        }
        if ext_data.is_some() {
            sets.push("ext_data = ?");
        }
        if sets.is_empty() {
            return Ok(());
        }
        sets.push("update_time = ?");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? AND deleted = 0",
            self.plan.table("session", session_id),
            sets.join(", ")
        );
        let mut query = sqlx::query(&sql);
        if let Some(v) = name {
            query = query.bind(v);
        }
        if let Some(v) = remark {
            query = query.bind(v);
        }
        if let Some(v) = mute {
            query = query.bind(v);
        }
        if let Some(v) = function_flag {
            query = query.bind(v);
        }
        if let Some(v) = ext_data {
            query = query.bind(v);
        }
        query
            .bind(now_ms())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET type = ?, update_time = ? WHERE id = ? AND deleted = 0",
            self.plan.table("session", session_id)
        );
        sqlx::query(&sql)
            .bind(session_type)
            .bind(now_ms())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
