//! session_user 仓储实现, 按 `session_id % shards` 分表
//!
//! 成员写路径在同一事务内维护 user_session 配对镜像。

use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use domain::now_ms;
use domain::repositories::session_user_repository::SessionUserRepository;
use domain::session::Session;
use domain::session_user::{NewMember, SessionUser};
use domain::user_session::{MuteUpdate, UserSession};
use sqlx::FromRow;

use crate::db::repositories::user_session_repository_impl::{DbUserSession, USER_SESSION_COLUMNS};
use crate::db::{db_err, in_placeholders, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
struct DbSessionUser {
    id: i64,
    session_id: i64,
    user_id: i64,
    #[sqlx(rename = "type")]
    session_type: i32,
    role: i32,
    mute: i32,
    status: i32,
    note_name: String,
    note_avatar: String,
    create_time: i64,
    update_time: i64,
    deleted: i8,
}

impl From<DbSessionUser> for SessionUser {
    fn from(row: DbSessionUser) -> Self {
        SessionUser {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            session_type: row.session_type,
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

const COLUMNS: &str = "id, session_id, user_id, type, role, mute, status, note_name, \
    note_avatar, create_time, update_time, deleted";

pub struct MysqlSessionUserRepository {
    pool: DbPool,
    plan: ShardPlan,
}

impl MysqlSessionUserRepository {
    pub fn new(pool: DbPool, plan: ShardPlan) -> Self {
        Self { pool, plan }
    }
}

#[async_trait]
impl SessionUserRepository for MysqlSessionUserRepository {
    async fn find_by_m_time(
        &self,
        session_id: i64,
        m_time: i64,
        role: Option<i32>,
        count: i64,
    ) -> DomainResult<Vec<SessionUser>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND update_time >= ? AND deleted = 0",
            COLUMNS,
            self.plan.table("session_user", session_id)
        );
        if role.is_some() {
            sql.push_str(" AND role = ?");
        }
        sql.push_str(" ORDER BY update_time ASC LIMIT ?");
        let mut query = sqlx::query_as(&sql).bind(session_id).bind(m_time);
        if let Some(r) = role {
            query = query.bind(r);
        }
        let rows: Vec<DbSessionUser> = query
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_all(&self, session_id: i64) -> DomainResult<Vec<SessionUser>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ?",
            COLUMNS,
            self.plan.table("session_user", session_id)
        );
        let rows: Vec<DbSessionUser> = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_many(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<Vec<SessionUser>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND deleted = 0 AND user_id IN ({})",
            COLUMNS,
            self.plan.table("session_user", session_id),
            in_placeholders(user_ids.len())
        );
        let mut query = sqlx::query_as(&sql).bind(session_id);
        for uid in user_ids {
            query = query.bind(uid);
        }
        let rows: Vec<DbSessionUser> = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_one(&self, session_id: i64, user_id: i64) -> DomainResult<Option<SessionUser>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND user_id = ? AND deleted = 0",
            COLUMNS,
            self.plan.table("session_user", session_id)
        );
        let row: Option<DbSessionUser> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn count(&self, session_id: i64) -> DomainResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE session_id = ? AND deleted = 0",
            self.plan.table("session_user", session_id)
        );
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count)
    }

    async fn find_receivers(
        &self,
        session_id: i64,
        status_mask: i32,
        user_ids: &[i64],
    ) -> DomainResult<Vec<SessionUser>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND deleted = 0 AND status & ? = 0",
            COLUMNS,
            self.plan.table("session_user", session_id)
        );
        if !user_ids.is_empty() {
            sql.push_str(&format!(
                " AND user_id IN ({})",
                in_placeholders(user_ids.len())
            ));
        }
        let mut query = sqlx::query_as(&sql).bind(session_id).bind(status_mask);
        for uid in user_ids {
            query = query.bind(uid);
        }
        let rows: Vec<DbSessionUser> = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_users(
        &self,
        session: &Session,
        members: &[NewMember],
        max_count: i64,
    ) -> DomainResult<Vec<UserSession>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let session_user_table = self.plan.table("session_user", session.id);
        let now = now_ms();

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // 容量校验在同一事务内, 避免并发加人超限
        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE session_id = ? AND deleted = 0",
            session_user_table
        );
        let (current,): (i64,) = sqlx::query_as(&count_sql)
            .bind(session.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if current + members.len() as i64 > max_count {
            return Err(DomainError::MemberCount);
        }

        let member_sql = format!(
            "INSERT INTO {} (session_id, user_id, type, role, mute, status, note_name, \
             note_avatar, create_time, update_time, deleted) \
             VALUES (?, ?, ?, ?, 0, 0, ?, ?, ?, ?, 0) \
             ON DUPLICATE KEY UPDATE type = VALUES(type), role = VALUES(role), \
             note_name = VALUES(note_name), note_avatar = VALUES(note_avatar), \
             update_time = VALUES(update_time), deleted = 0",
            session_user_table
        );
        for member in members {
            sqlx::query(&member_sql)
                .bind(session.id)
                .bind(member.user_id)
                .bind(session.session_type)
                .bind(member.role)
                .bind(&member.note_name)
                .bind(&member.note_avatar)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

            let mirror_sql = format!(
                "INSERT INTO {} (session_id, user_id, parent_id, type, entity_id, name, remark, \
                 function_flag, ext_data, top, role, mute, status, note_name, note_avatar, \
                 create_time, update_time, deleted) \
                 VALUES (?, ?, 0, ?, ?, ?, ?, ?, ?, 0, ?, 0, 0, ?, ?, ?, ?, 0) \
                 ON DUPLICATE KEY UPDATE type = VALUES(type), entity_id = VALUES(entity_id), \
                 name = VALUES(name), remark = VALUES(remark), \
                 function_flag = VALUES(function_flag), ext_data = VALUES(ext_data), \
                 role = VALUES(role), note_name = VALUES(note_name), \
                 note_avatar = VALUES(note_avatar), update_time = VALUES(update_time), deleted = 0",
                self.plan.table("user_session", member.user_id)
            );
            sqlx::query(&mirror_sql)
                .bind(session.id)
                .bind(member.user_id)
                .bind(session.session_type)
                .bind(member.entity_id)
                .bind(&session.name)
                .bind(&session.remark)
                .bind(session.function_flag)
                .bind(session.ext_data.as_deref())
                .bind(member.role)
                .bind(&member.note_name)
                .bind(&member.note_avatar)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        // 事务提交后按分片回读镜像行返回
        let mut result = Vec::with_capacity(members.len());
        for member in members {
            let sql = format!(
                "SELECT {} FROM {} WHERE user_id = ? AND session_id = ?",
                USER_SESSION_COLUMNS,
                self.plan.table("user_session", member.user_id)
            );
            let row: Option<DbUserSession> = sqlx::query_as(&sql)
                .bind(member.user_id)
                .bind(session.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            if let Some(row) = row {
                result.push(row.into());
            }
        }
        Ok(result)
    }

    async fn del_users(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let now = now_ms();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sql = format!(
            "UPDATE {} SET deleted = 1, update_time = ? WHERE session_id = ? AND user_id IN ({})",
            self.plan.table("session_user", session_id),
            in_placeholders(user_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(now).bind(session_id);
        for uid in user_ids {
            query = query.bind(uid);
        }
        query.execute(&mut *tx).await.map_err(db_err)?;

        for (table, uids) in self.plan.group("user_session", user_ids) {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? WHERE session_id = ? AND user_id IN ({})",
                table,
                in_placeholders(uids.len())
            );
            let mut query = sqlx::query(&sql).bind(now).bind(session_id);
            for uid in &uids {
                query = query.bind(uid);
            }
            query.execute(&mut *tx).await.map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)
    }

    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET type = ?, update_time = ? WHERE session_id = ?",
            self.plan.table("session_user", session_id)
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

    async fn update_users(
        &self,
        session_id: i64,
        user_ids: &[i64],
        role: Option<i32>,
        status: Option<i32>,
        note_name: Option<&str>,
        note_avatar: Option<&str>,
        mute: Option<MuteUpdate>,
    ) -> DomainResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let mut sets = Vec::new();
        if role.is_some() {
            sets.push("role = ?");
        }
        if status.is_some() {
            sets.push("status = ?");
        }
        if note_name.is_some() {
            sets.push("note_name = ?");
        }
        if note_avatar.is_some() {
            sets.push("note_avatar = ?");
        }
        match mute {
            Some(MuteUpdate::Set(_)) => sets.push("mute = mute | ?"),
            Some(MuteUpdate::Clear(_)) => sets.push("mute = mute & ~?"),
            None => {}
        }
        if sets.is_empty() {
            return Ok(());
        }
        sets.push("update_time = ?");
        let sql = format!(
            "UPDATE {} SET {} WHERE session_id = ? AND user_id IN ({}) AND deleted = 0",
            self.plan.table("session_user", session_id),
            sets.join(", "),
            in_placeholders(user_ids.len())
        );
        let mut query = sqlx::query(&sql);
        if let Some(v) = role {
            query = query.bind(v);
        }
        if let Some(v) = status {
            query = query.bind(v);
        }
        if let Some(v) = note_name {
            query = query.bind(v);
        }
        if let Some(v) = note_avatar {
            query = query.bind(v);
        }
        match mute {
            Some(MuteUpdate::Set(bit)) | Some(MuteUpdate::Clear(bit)) => {
                query = query.bind(bit);
            }
            None => {}
        }
        query = query.bind(now_ms()).bind(session_id);
        for uid in user_ids {
            query = query.bind(uid);
        }
        query.execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_session_cascade(&self, session_id: i64) -> DomainResult<()> {
        let session_user_table = self.plan.table("session_user", session_id);
        let now = now_ms();

        let member_sql = format!(
            "SELECT user_id FROM {} WHERE session_id = ? AND deleted = 0",
            session_user_table
        );
        let member_ids: Vec<(i64,)> = sqlx::query_as(&member_sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let member_ids: Vec<i64> = member_ids.into_iter().map(|(uid,)| uid).collect();

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (table, uids) in self.plan.group("user_session", &member_ids) {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? WHERE session_id = ? AND user_id IN ({})",
                table,
                in_placeholders(uids.len())
            );
            let mut query = sqlx::query(&sql).bind(now).bind(session_id);
            for uid in &uids {
                query = query.bind(uid);
            }
            query.execute(&mut *tx).await.map_err(db_err)?;
        }
        let sql = format!(
            "UPDATE {} SET deleted = 1, update_time = ? WHERE session_id = ?",
            session_user_table
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let sql = format!(
            "UPDATE {} SET deleted = 1, update_time = ? WHERE id = ?",
            self.plan.table("session", session_id)
        );
        sqlx::query(&sql)
            .bind(now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }
}
