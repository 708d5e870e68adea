//! 媒体对象仓储实现
//!
//! object 按 `id % shards` 分表, session_object 按 `session_id % shards` 分表。
//! find_for_user 先扫绑定分片取候选会话, 再到调用者的 user_session 分片核验成员身份。

use std::collections::HashSet;
use std::sync::Arc;

use application::ports::IdGenerator;
use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::now_ms;
use domain::object::Object;
use domain::repositories::object_repository::{ObjectRepository, SessionObjectRepository};
use sqlx::FromRow;

use crate::db::{db_err, in_placeholders, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
struct DbObject {
    id: i64,
    session_id: i64,
    engine: String,
    key: String,
    create_time: i64,
    update_time: i64,
    deleted: i8,
}

impl From<DbObject> for Object {
    fn from(row: DbObject) -> Self {
        Object {
            id: row.id,
            session_id: row.session_id,
            engine: row.engine,
            key: row.key,
            create_time: row.create_time,
            update_time: row.update_time,
            deleted: row.deleted,
        }
    }
}

const COLUMNS: &str = "id, session_id, engine, `key`, create_time, update_time, deleted";

pub struct MysqlObjectRepository {
    pool: DbPool,
    plan: ShardPlan,
    id_gen: Arc<dyn IdGenerator>,
}

impl MysqlObjectRepository {
    pub fn new(pool: DbPool, plan: ShardPlan, id_gen: Arc<dyn IdGenerator>) -> Self {
        Self { pool, plan, id_gen }
    }

    async fn find_any(&self, object_id: i64) -> DomainResult<Option<Object>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ? AND deleted = 0",
            COLUMNS,
            self.plan.table("object", object_id)
        );
        let row: Option<DbObject> = sqlx::query_as(&sql)
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    /// 对象挂过的全部会话: 原始会话 + 转发克隆出的绑定
    async fn bound_session_ids(&self, object: &Object) -> DomainResult<HashSet<i64>> {
        let mut session_ids = HashSet::new();
        session_ids.insert(object.session_id);
        for shard in 0..self.plan.shards() {
            let sql = format!(
                "SELECT session_id FROM session_object_{} WHERE object_id = ?",
                shard
            );
            let rows: Vec<(i64,)> = sqlx::query_as(&sql)
                .bind(object.id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            session_ids.extend(rows.into_iter().map(|(sid,)| sid));
        }
        Ok(session_ids)
    }
}

#[async_trait]
impl ObjectRepository for MysqlObjectRepository {
    async fn insert(&self, session_id: i64, engine: &str, key: &str) -> DomainResult<i64> {
        let id = self.id_gen.next_id();
        let now = now_ms();
        let sql = format!(
            "INSERT INTO {} (id, session_id, engine, `key`, create_time, update_time, deleted) \
             VALUES (?, ?, ?, ?, ?, ?, 0)",
            self.plan.table("object", id)
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(session_id)
            .bind(engine)
            .bind(key)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    async fn find(&self, object_id: i64) -> DomainResult<Option<Object>> {
        self.find_any(object_id).await
    }

    async fn find_for_user(&self, object_id: i64, user_id: i64) -> DomainResult<Option<Object>> {
        let Some(object) = self.find_any(object_id).await? else {
            return Ok(None);
        };
        let session_ids: Vec<i64> = self.bound_session_ids(&object).await?.into_iter().collect();
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND deleted = 0 AND session_id IN ({})",
            self.plan.table("user_session", user_id),
            in_placeholders(session_ids.len())
        );
        let mut query = sqlx::query_as(&sql).bind(user_id);
        for sid in &session_ids {
            query = query.bind(sid);
        }
        let (count,): (i64,) = query.fetch_one(&self.pool).await.map_err(db_err)?;
        if count > 0 {
            Ok(Some(object))
        } else {
            Ok(None)
        }
    }
}

pub struct MysqlSessionObjectRepository {
    pool: DbPool,
    plan: ShardPlan,
}

impl MysqlSessionObjectRepository {
    pub fn new(pool: DbPool, plan: ShardPlan) -> Self {
        Self { pool, plan }
    }
}

#[async_trait]
impl SessionObjectRepository for MysqlSessionObjectRepository {
    async fn insert(
        &self,
        object_id: i64,
        session_id: i64,
        from_user_id: i64,
        client_id: i64,
    ) -> DomainResult<()> {
        let sql = format!(
            "INSERT IGNORE INTO {} (object_id, session_id, from_user_id, client_id, create_time) \
             VALUES (?, ?, ?, ?, ?)",
            self.plan.table("session_object", session_id)
        );
        sqlx::query(&sql)
            .bind(object_id)
            .bind(session_id)
            .bind(from_user_id)
            .bind(client_id)
            .bind(now_ms())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn clone_for_forward(
        &self,
        src_session_id: i64,
        from_user_ids: &[i64],
        client_ids: &[i64],
        new_from_user_id: i64,
        new_client_id: i64,
        new_session_id: i64,
    ) -> DomainResult<Vec<i64>> {
        if from_user_ids.is_empty() || from_user_ids.len() != client_ids.len() {
            return Ok(Vec::new());
        }
        // (from_user_id, client_id) 逐对匹配源绑定
        let pairs = vec!["(from_user_id = ? AND client_id = ?)"; from_user_ids.len()].join(" OR ");
        let sql = format!(
            "SELECT object_id FROM {} WHERE session_id = ? AND ({})",
            self.plan.table("session_object", src_session_id),
            pairs
        );
        let mut query = sqlx::query_as(&sql).bind(src_session_id);
        for (from_uid, client_id) in from_user_ids.iter().zip(client_ids) {
            query = query.bind(from_uid).bind(client_id);
        }
        let rows: Vec<(i64,)> = query.fetch_all(&self.pool).await.map_err(db_err)?;
        let object_ids: Vec<i64> = rows.into_iter().map(|(id,)| id).collect();

        let insert_sql = format!(
            "INSERT IGNORE INTO {} (object_id, session_id, from_user_id, client_id, create_time) \
             VALUES (?, ?, ?, ?, ?)",
            self.plan.table("session_object", new_session_id)
        );
        let now = now_ms();
        for object_id in &object_ids {
            sqlx::query(&insert_sql)
                .bind(object_id)
                .bind(new_session_id)
                .bind(new_from_user_id)
                .bind(new_client_id)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(object_ids)
    }
}
