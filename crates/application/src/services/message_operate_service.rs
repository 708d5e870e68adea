//! 消息操作
//!
//! 确认/已读/撤回/重编辑/转发, 挂在 `MessageService` 上。
//! 操作产生的回执都以控制消息走同一条发送管线。

use domain::errors::{DomainError, DomainResult};
use domain::message::{is_control_type, msg_status, MSG_TYPE_READ, MSG_TYPE_REEDIT, MSG_TYPE_REVOKE};
use domain::now_ms;
use domain::session::function_flag;
use tracing::warn;

use crate::dto::{
    AckUserMessagesReq, CheckMessageReq, ForwardUserMessageReq, ReadUserMessageReq,
    ReeditUserMessageReq, RevokeUserMessageReq, SendMessageReq, SendMessageRes,
};
use crate::services::message_service::MessageService;

impl MessageService {
    /// 客户端确认收到消息
    pub async fn ack_user_messages(&self, req: AckUserMessagesReq) -> DomainResult<()> {
        if req.msg_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        self.user_messages
            .ack(req.user_id, req.session_id, &req.msg_ids)
            .await
    }

    /// 已读: 超级群只推进 user_session 的 update_time;
    /// 写扩散置已读位, 并按需向发送者发已读回执
    pub async fn read_user_messages(&self, req: ReadUserMessageReq) -> DomainResult<()> {
        let session = self
            .sessions
            .find(req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if session.is_read_diffusion() {
            return self
                .user_sessions
                .touch(req.user_id, req.session_id, now_ms())
                .await;
        }
        if req.msg_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }

        let messages = self
            .user_messages
            .find_many(req.user_id, req.session_id, &req.msg_ids)
            .await?;
        self.user_messages
            .mark_status(req.user_id, req.session_id, &req.msg_ids, msg_status::READ)
            .await?;
        if session.function_flag & function_flag::READ == 0 {
            return Ok(());
        }
        for message in messages {
            if is_control_type(message.msg_type)
                || message.from_user_id == req.user_id
                || message.status & msg_status::READ != 0
            {
                continue;
            }
            let receipt = SendMessageReq {
                client_id: self.id_gen.next_id(),
                session_id: req.session_id,
                msg_type: MSG_TYPE_READ,
                from_user_id: req.user_id,
                c_time: now_ms(),
                body: message.msg_id.to_string(),
                at_users: None,
                reply_msg_id: Some(message.msg_id),
                ext_data: None,
                receivers: vec![message.from_user_id, req.user_id],
            };
            // 单条回执失败不阻断其余已读
            if let Err(err) = self.send_message(receipt).await {
                warn!(error = %err, msg_id = message.msg_id, "send read receipt failed");
            }
        }
        Ok(())
    }

    /// 撤回自己的消息, 并向会话广播撤回信令
    pub async fn revoke_user_message(&self, req: RevokeUserMessageReq) -> DomainResult<()> {
        let session = self
            .sessions
            .find(req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;

        let affected = if session.is_read_diffusion() {
            let message = self
                .session_messages
                .find_any(req.session_id, req.msg_id, req.user_id)
                .await?
                .ok_or(DomainError::SessionMessageInvalid)?;
            // 已撤回过, 不重复广播
            if message.deleted != 0 {
                return Ok(());
            }
            if is_control_type(message.msg_type) {
                return Err(DomainError::MessageTypeNotSupport);
            }
            self.session_messages
                .delete_one(req.session_id, req.msg_id, req.user_id)
                .await?
        } else {
            let message = self
                .user_messages
                .find_any(req.user_id, req.session_id, req.msg_id)
                .await?
                .ok_or(DomainError::SessionMessageInvalid)?;
            if message.deleted != 0 {
                return Ok(());
            }
            if is_control_type(message.msg_type) {
                return Err(DomainError::MessageTypeNotSupport);
            }
            self.user_messages
                .delete_messages(req.user_id, req.session_id, &[req.msg_id], None, None)
                .await?;
            1
        };
        if affected == 0 {
            return Ok(());
        }

        let signal = SendMessageReq {
            client_id: self.id_gen.next_id(),
            session_id: req.session_id,
            msg_type: MSG_TYPE_REVOKE,
            from_user_id: req.user_id,
            c_time: now_ms(),
            body: req.msg_id.to_string(),
            at_users: None,
            reply_msg_id: Some(req.msg_id),
            ext_data: None,
            receivers: vec![],
        };
        self.send_message(signal).await.map(|_| ())
    }

    /// 重编辑: 校验原消息, 审核新内容, 广播重编辑信令
    pub async fn reedit_user_message(&self, req: ReeditUserMessageReq) -> DomainResult<()> {
        let session = self
            .sessions
            .find(req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;

        let original_type = if session.is_read_diffusion() {
            self.session_messages
                .find(req.session_id, req.msg_id, req.user_id)
                .await?
                .ok_or(DomainError::SessionMessageInvalid)?
                .msg_type
        } else {
            let message = self
                .user_messages
                .find(req.user_id, req.session_id, req.msg_id)
                .await?
                .ok_or(DomainError::SessionMessageInvalid)?;
            self.user_messages
                .mark_status(
                    req.user_id,
                    req.session_id,
                    &[req.msg_id],
                    msg_status::REEDIT,
                )
                .await?;
            message.msg_type
        };
        if is_control_type(original_type) {
            return Err(DomainError::MessageTypeNotSupport);
        }

        if let Some(checker) = &self.checker {
            let entity_id = self
                .user_sessions
                .get(req.user_id, req.session_id)
                .await?
                .map(|us| us.entity_id)
                .unwrap_or_default();
            checker
                .check(&CheckMessageReq {
                    session_type: session.session_type,
                    session_id: session.id,
                    from_user_id: req.user_id,
                    entity_id,
                    message_type: original_type,
                    message_content: req.content.clone(),
                })
                .await?;
        }

        let signal = SendMessageReq {
            client_id: self.id_gen.next_id(),
            session_id: req.session_id,
            msg_type: MSG_TYPE_REEDIT,
            from_user_id: req.user_id,
            c_time: now_ms(),
            body: req.content,
            at_users: None,
            reply_msg_id: Some(req.msg_id),
            ext_data: None,
            receivers: vec![],
        };
        self.send_message(signal).await.map(|_| ())
    }

    /// 转发: 克隆源会话的对象绑定到目标会话后走发送管线
    pub async fn forward_user_message(
        &self,
        req: ForwardUserMessageReq,
    ) -> DomainResult<SendMessageRes> {
        let session = self
            .sessions
            .find(req.message.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if session.function_flag & function_flag::FORWARD == 0 {
            return Err(DomainError::MessageTypeNotSupport);
        }
        if req.fwd_from_user_ids.len() != req.fwd_client_ids.len() {
            return Err(DomainError::ParamsError);
        }
        if !req.fwd_from_user_ids.is_empty() {
            self.session_objects
                .clone_for_forward(
                    req.fwd_session_id,
                    &req.fwd_from_user_ids,
                    &req.fwd_client_ids,
                    req.message.from_user_id,
                    req.message.client_id,
                    req.message.session_id,
                )
                .await?;
        }
        self.send_message(req.message).await
    }
}
