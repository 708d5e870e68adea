//! session_message 仓储实现(读扩散), 按 `session_id % shards` 分表

use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::message::SessionMessage;
use domain::now_ms;
use domain::repositories::session_message_repository::{
    NewSessionMessage, SessionMessageRepository,
};
use sqlx::FromRow;

use crate::db::{db_err, in_placeholders, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
struct DbSessionMessage {
    id: i64,
    msg_id: i64,
    client_id: i64,
    session_id: i64,
    from_user_id: i64,
    #[sqlx(rename = "type")]
    msg_type: i32,
    content: String,
    at_users: Option<String>,
    reply_msg_id: Option<i64>,
    ext_data: Option<String>,
    create_time: i64,
    update_time: i64,
    deleted: i8,
}

impl From<DbSessionMessage> for SessionMessage {
    fn from(row: DbSessionMessage) -> Self {
        SessionMessage {
            id: row.id,
            msg_id: row.msg_id,
            client_id: row.client_id,
            session_id: row.session_id,
            from_user_id: row.from_user_id,
            msg_type: row.msg_type,
            msg_content: row.content,
            at_users: row.at_users,
            reply_msg_id: row.reply_msg_id,
            ext_data: row.ext_data,
            create_time: row.create_time,
            update_time: row.update_time,
            deleted: row.deleted,
        }
    }
}

const COLUMNS: &str = "id, msg_id, client_id, session_id, from_user_id, type, content, \
    at_users, reply_msg_id, ext_data, create_time, update_time, deleted";

pub struct MysqlSessionMessageRepository {
    pool: DbPool,
    plan: ShardPlan,
}

impl MysqlSessionMessageRepository {
    pub fn new(pool: DbPool, plan: ShardPlan) -> Self {
        Self { pool, plan }
    }
}

#[async_trait]
impl SessionMessageRepository for MysqlSessionMessageRepository {
    async fn insert(&self, message: &NewSessionMessage) -> DomainResult<SessionMessage> {
        let now = now_ms();
        let sql = format!(
            "INSERT INTO {} (msg_id, client_id, session_id, from_user_id, type, content, \
             at_users, reply_msg_id, ext_data, create_time, update_time, deleted) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
            self.plan.table("session_message", message.session_id)
        );
        let result = sqlx::query(&sql)
            .bind(message.msg_id)
            .bind(message.client_id)
            .bind(message.session_id)
            .bind(message.from_user_id)
            .bind(message.msg_type)
            .bind(&message.msg_content)
            .bind(message.at_users.as_deref())
            .bind(message.reply_msg_id)
            .bind(message.ext_data.as_deref())
            .bind(message.create_time)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(SessionMessage {
            id: result.last_insert_id() as i64,
            msg_id: message.msg_id,
            client_id: message.client_id,
            session_id: message.session_id,
            from_user_id: message.from_user_id,
            msg_type: message.msg_type,
            msg_content: message.msg_content.clone(),
            at_users: message.at_users.clone(),
            reply_msg_id: message.reply_msg_id,
            ext_data: message.ext_data.clone(),
            create_time: message.create_time,
            update_time: now,
            deleted: 0,
        })
    }

    async fn find_by_client_id(
        &self,
        session_id: i64,
        client_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND client_id = ? AND from_user_id = ? \
             AND deleted = 0",
            COLUMNS,
            self.plan.table("session_message", session_id)
        );
        let row: Option<DbSessionMessage> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(client_id)
            .bind(from_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND msg_id = ? AND from_user_id = ? \
             AND deleted = 0",
            COLUMNS,
            self.plan.table("session_message", session_id)
        );
        let row: Option<DbSessionMessage> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(msg_id)
            .bind(from_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_any(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND msg_id = ? AND from_user_id = ?",
            COLUMNS,
            self.plan.table("session_message", session_id)
        );
        let row: Option<DbSessionMessage> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(msg_id)
            .bind(from_user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn get_messages(
        &self,
        session_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
        msg_ids: &[i64],
        asc: bool,
    ) -> DomainResult<Vec<SessionMessage>> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE session_id = ? AND deleted = 0",
            COLUMNS,
            self.plan.table("session_message", session_id)
        );
        if asc {
            sql.push_str(" AND create_time >= ?");
        } else {
            sql.push_str(" AND create_time <= ?");
        }
        if !msg_ids.is_empty() {
            sql.push_str(&format!(
                " AND msg_id IN ({})",
                in_placeholders(msg_ids.len())
            ));
        }
        if asc {
            sql.push_str(" ORDER BY create_time ASC LIMIT ?, ?");
        } else {
            sql.push_str(" ORDER BY create_time DESC LIMIT ?, ?");
        }
        let mut query = sqlx::query_as(&sql).bind(session_id).bind(c_time);
        for id in msg_ids {
            query = query.bind(id);
        }
        let rows: Vec<DbSessionMessage> = query
            .bind(offset)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_one(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<u64> {
        let sql = format!(
            "UPDATE {} SET deleted = 1, update_time = ? \
             WHERE session_id = ? AND msg_id = ? AND from_user_id = ? AND deleted = 0",
            self.plan.table("session_message", session_id)
        );
        let result = sqlx::query(&sql)
            .bind(now_ms())
            .bind(session_id)
            .bind(msg_id)
            .bind(from_user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    async fn delete_many(
        &self,
        session_id: i64,
        msg_ids: &[i64],
        time_from: i64,
        time_to: i64,
    ) -> DomainResult<()> {
        let table = self.plan.table("session_message", session_id);
        if msg_ids.is_empty() {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? \
                 WHERE session_id = ? AND create_time >= ? AND create_time <= ? AND deleted = 0",
                table
            );
            sqlx::query(&sql)
                .bind(now_ms())
                .bind(session_id)
                .bind(time_from)
                .bind(time_to)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        } else {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? \
                 WHERE session_id = ? AND msg_id IN ({}) AND deleted = 0",
                table,
                in_placeholders(msg_ids.len())
            );
            let mut query = sqlx::query(&sql).bind(now_ms()).bind(session_id);
            for id in msg_ids {
                query = query.bind(id);
            }
            query.execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }
}
