//! user_session 仓储实现, 按 `user_id % shards` 分表

use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::now_ms;
use domain::repositories::user_session_repository::{UserSessionRepository, UserSessionUpdate};
use domain::user_session::{MuteUpdate, UserSession};
use sqlx::FromRow;

use crate::db::{db_err, in_placeholders, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct DbUserSession {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub parent_id: i64,
    #[sqlx(rename = "type")]
    pub session_type: i32,
    pub entity_id: i64,
    pub name: String,
    pub remark: String,
    pub function_flag: i64,
    pub ext_data: Option<String>,
    pub top: i64,
    pub role: i32,
    pub mute: i32,
    pub status: i32,
    pub note_name: String,
    pub note_avatar: String,
    pub create_time: i64,
    pub update_time: i64,
    pub deleted: i8,
}

impl From<DbUserSession> for UserSession {
    fn from(row: DbUserSession) -> Self {
        UserSession {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            parent_id: row.parent_id,
            session_type: row.session_type,
            entity_id: row.entity_id,
            name: row.name,
            remark: row.remark,
            function_flag: row.function_flag,
            ext_data: row.ext_data,
            top: row.top,
            role: row.role,
            mute: row.mute,
            status: row.status,
            note_name: row.note_name,
            note_avatar: row.note_avatar,
            create_time: row.create_time,
            update_time: row.update_time,
            deleted: row.deleted,
        }
    }
}

pub(crate) const USER_SESSION_COLUMNS: &str = "id, session_id, user_id, parent_id, type, \
    entity_id, name, remark, function_flag, ext_data, top, role, mute, status, note_name, \
    note_avatar, create_time, update_time, deleted";

pub struct MysqlUserSessionRepository {
    pool: DbPool,
    plan: ShardPlan,
}

impl MysqlUserSessionRepository {
    pub fn new(pool: DbPool, plan: ShardPlan) -> Self {
        Self { pool, plan }
    }
}

#[async_trait]
impl UserSessionRepository for MysqlUserSessionRepository {
    async fn find_by_entity_id(
        &self,
        user_id: i64,
        entity_id: i64,
        session_type: i32,
        include_deleted: bool,
    ) -> DomainResult<Option<UserSession>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND entity_id = ? AND type = ?",
            USER_SESSION_COLUMNS,
            self.plan.table("user_session", user_id)
        );
        if !include_deleted {
            sql.push_str(" AND deleted = 0");
        }
        let row: Option<DbUserSession> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(entity_id)
            .bind(session_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn get(&self, user_id: i64, session_id: i64) -> DomainResult<Option<UserSession>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND session_id = ?",
            USER_SESSION_COLUMNS,
            self.plan.table("user_session", user_id)
        );
        let row: Option<DbUserSession> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn query_latest(
        &self,
        user_id: i64,
        m_time: i64,
        offset: i64,
        count: i64,
        types: &[i32],
    ) -> DomainResult<Vec<UserSession>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND update_time > ?",
            USER_SESSION_COLUMNS,
            self.plan.table("user_session", user_id)
        );
        if !types.is_empty() {
            sql.push_str(&format!(" AND type IN ({})", in_placeholders(types.len())));
        }
        sql.push_str(" ORDER BY update_time ASC LIMIT ?, ?");
        let mut query = sqlx::query_as(&sql).bind(user_id).bind(m_time);
        for t in types {
            query = query.bind(t);
        }
        let rows: Vec<DbUserSession> = query
            .bind(offset)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(
        &self,
        user_ids: &[i64],
        session_id: i64,
        update: &UserSessionUpdate,
    ) -> DomainResult<()> {
        if user_ids.is_empty() || update.is_empty() {
            return Ok(());
        }
        let mut sets = Vec::new();
        if update.name.is_some() {
            sets.push("name = ?");
        }
        if update.remark.is_some() {
            sets.push("remark = ?");
        }
        match update.mute {
            Some(MuteUpdate::Set(_)) => sets.push("mute = mute | ?"),
            Some(MuteUpdate::Clear(_)) => sets.push("mute = mute & ~?"),
            None => {}
        }
        if update.function_flag.is_some() {
            sets.push("function_flag = ?");
        }
        if update.ext_data.is_some() {
            sets.push("ext_data = ?");
        }
        if update.note_name.is_some() {
            sets.push("note_name = ?");
        }
        if update.top.is_some() {
            sets.push("top = ?");
        }
        if update.status.is_some() {
            sets.push("status = ?");
        }
        if update.role.is_some() {
            sets.push("role = ?");
        }
        if update.parent_id.is_some() {
            sets.push("parent_id = ?");
        }
        sets.push("update_time = ?");
        let sets = sets.join(", ");
        let now = now_ms();

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (table, uids) in self.plan.group("user_session", user_ids) {
            let sql = format!(
                "UPDATE {} SET {} WHERE session_id = ? AND user_id IN ({})",
                table,
                sets,
                in_placeholders(uids.len())
            );
            let mut query = sqlx::query(&sql);
            if let Some(v) = &update.name {
                query = query.bind(v);
            }
            if let Some(v) = &update.remark {
                query = query.bind(v);
            }
            match update.mute {
                Some(MuteUpdate::Set(bit)) | Some(MuteUpdate::Clear(bit)) => {
                    query = query.bind(bit);
                }
                None => {}
            }
            if let Some(v) = update.function_flag {
                query = query.bind(v);
            }
            if let Some(v) = &update.ext_data {
                query = query.bind(v);
            }
            if let Some(v) = &update.note_name {
                query = query.bind(v);
            }
            if let Some(v) = update.top {
                query = query.bind(v);
            }
            if let Some(v) = update.status {
                query = query.bind(v);
            }
            if let Some(v) = update.role {
                query = query.bind(v);
            }
            if let Some(v) = update.parent_id {
                query = query.bind(v);
            }
            query = query.bind(now).bind(session_id);
            for uid in &uids {
                query = query.bind(uid);
            }
            query.execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn update_type(
        &self,
        user_ids: &[i64],
        session_id: i64,
        session_type: i32,
    ) -> DomainResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let now = now_ms();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (table, uids) in self.plan.group("user_session", user_ids) {
            let sql = format!(
                "UPDATE {} SET type = ?, update_time = ? WHERE session_id = ? AND user_id IN ({})",
                table,
                in_placeholders(uids.len())
            );
            let mut query = sqlx::query(&sql).bind(session_type).bind(now).bind(session_id);
            for uid in &uids {
                query = query.bind(uid);
            }
            query.execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn touch(&self, user_id: i64, session_id: i64, now_ms: i64) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET update_time = ? WHERE user_id = ? AND session_id = ? AND deleted = 0",
            self.plan.table("user_session", user_id)
        );
        sqlx::query(&sql)
            .bind(now_ms)
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
