//! user_message 仓储实现(写扩散), 按 `user_id % shards` 分表

use async_trait::async_trait;
use domain::errors::DomainResult;
use domain::message::UserMessage;
use domain::message::msg_status;
use domain::now_ms;
use domain::repositories::user_message_repository::UserMessageRepository;
use sqlx::FromRow;

use crate::db::{db_err, in_placeholders, DbPool, ShardPlan};

#[derive(Debug, Clone, FromRow)]
struct DbUserMessage {
    id: i64,
    msg_id: i64,
    client_id: i64,
    user_id: i64,
    session_id: i64,
    from_user_id: i64,
    #[sqlx(rename = "type")]
    msg_type: i32,
    content: String,
    reply_msg_id: Option<i64>,
    at_users: Option<String>,
    ext_data: Option<String>,
    status: i32,
    create_time: i64,
    update_time: i64,
    deleted: i8,
}

impl From<DbUserMessage> for UserMessage {
    fn from(row: DbUserMessage) -> Self {
        UserMessage {
            id: row.id,
            msg_id: row.msg_id,
            client_id: row.client_id,
            user_id: row.user_id,
            session_id: row.session_id,
            from_user_id: row.from_user_id,
            msg_type: row.msg_type,
            msg_content: row.content,
            reply_msg_id: row.reply_msg_id,
            at_users: row.at_users,
            ext_data: row.ext_data,
            status: row.status,
            create_time: row.create_time,
            update_time: row.update_time,
            deleted: row.deleted,
        }
    }
}

const COLUMNS: &str = "id, msg_id, client_id, user_id, session_id, from_user_id, type, \
    content, reply_msg_id, at_users, ext_data, status, create_time, update_time, deleted";

pub struct MysqlUserMessageRepository {
    pool: DbPool,
    plan: ShardPlan,
}

impl MysqlUserMessageRepository {
    pub fn new(pool: DbPool, plan: ShardPlan) -> Self {
        Self { pool, plan }
    }
}

#[async_trait]
impl UserMessageRepository for MysqlUserMessageRepository {
    async fn insert(&self, message: &UserMessage) -> DomainResult<()> {
        // 幂等键 (user_id, session_id, from_user_id, client_id) 为唯一索引
        let sql = format!(
            "INSERT IGNORE INTO {} (msg_id, client_id, user_id, session_id, from_user_id, \
             type, content, reply_msg_id, at_users, ext_data, status, create_time, \
             update_time, deleted) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)",
            self.plan.table("user_message", message.user_id)
        );
        sqlx::query(&sql)
            .bind(message.msg_id)
            .bind(message.client_id)
            .bind(message.user_id)
            .bind(message.session_id)
            .bind(message.from_user_id)
            .bind(message.msg_type)
            .bind(&message.msg_content)
            .bind(message.reply_msg_id)
            .bind(message.at_users.as_deref())
            .bind(message.ext_data.as_deref())
            .bind(message.status)
            .bind(message.create_time)
            .bind(message.update_time)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_client_id(
        &self,
        user_id: i64,
        session_id: i64,
        client_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        // 发送方自己的那条记录: from_user_id = user_id
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND session_id = ? AND from_user_id = ? \
             AND client_id = ? AND deleted = 0",
            COLUMNS,
            self.plan.table("user_message", user_id)
        );
        let row: Option<DbUserMessage> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(session_id)
            .bind(user_id)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND session_id = ? AND msg_id = ? \
             AND deleted = 0",
            COLUMNS,
            self.plan.table("user_message", user_id)
        );
        let row: Option<DbUserMessage> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(session_id)
            .bind(msg_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_any(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND session_id = ? AND msg_id = ?",
            COLUMNS,
            self.plan.table("user_message", user_id)
        );
        let row: Option<DbUserMessage> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(session_id)
            .bind(msg_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_many(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
    ) -> DomainResult<Vec<UserMessage>> {
        if msg_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND session_id = ? AND msg_id IN ({}) \
             AND deleted = 0",
            COLUMNS,
            self.plan.table("user_message", user_id),
            in_placeholders(msg_ids.len())
        );
        let mut query = sqlx::query_as(&sql).bind(user_id).bind(session_id);
        for id in msg_ids {
            query = query.bind(id);
        }
        let rows: Vec<DbUserMessage> = query.fetch_all(&self.pool).await.map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ack(&self, user_id: i64, session_id: i64, msg_ids: &[i64]) -> DomainResult<()> {
        self.mark_status(user_id, session_id, msg_ids, msg_status::ACKED)
            .await
    }

    async fn mark_status(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
        status_bits: i32,
    ) -> DomainResult<()> {
        if msg_ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "UPDATE {} SET status = status | ?, update_time = ? \
             WHERE user_id = ? AND session_id = ? AND msg_id IN ({}) AND deleted = 0",
            self.plan.table("user_message", user_id),
            in_placeholders(msg_ids.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(status_bits)
            .bind(now_ms())
            .bind(user_id)
            .bind(session_id);
        for id in msg_ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await.map_err(db_err)?;
        Ok(())
    }

    async fn get_user_messages(
        &self,
        user_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
    ) -> DomainResult<Vec<UserMessage>> {
        // 新消息与未确认消息取并集, 客户端断线重连后不会漏消息
        let sql = format!(
            "SELECT {} FROM {} WHERE user_id = ? AND deleted = 0 \
             AND (create_time > ? OR status = 0) ORDER BY create_time ASC LIMIT ?, ?",
            COLUMNS,
            self.plan.table("user_message", user_id)
        );
        let rows: Vec<DbUserMessage> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(c_time)
            .bind(offset)
            .bind(count)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
        time_from: Option<i64>,
        time_to: Option<i64>,
    ) -> DomainResult<()> {
        let table = self.plan.table("user_message", user_id);
        if !msg_ids.is_empty() {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? \
                 WHERE user_id = ? AND session_id = ? AND msg_id IN ({}) AND deleted = 0",
                table,
                in_placeholders(msg_ids.len())
            );
            let mut query = sqlx::query(&sql).bind(now_ms()).bind(user_id).bind(session_id);
            for id in msg_ids {
                query = query.bind(id);
            }
            query.execute(&self.pool).await.map_err(db_err)?;
        } else if let (Some(from), Some(to)) = (time_from, time_to) {
            let sql = format!(
                "UPDATE {} SET deleted = 1, update_time = ? \
                 WHERE user_id = ? AND session_id = ? AND create_time >= ? AND create_time <= ? \
                 AND deleted = 0",
                table
            );
            sqlx::query(&sql)
                .bind(now_ms())
                .bind(user_id)
                .bind(session_id)
                .bind(from)
                .bind(to)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn delete_by_session(&self, user_id: i64, session_id: i64) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET deleted = 1, update_time = ? \
             WHERE user_id = ? AND session_id = ? AND deleted = 0",
            self.plan.table("user_message", user_id)
        );
        sqlx::query(&sql)
            .bind(now_ms())
            .bind(user_id)
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
