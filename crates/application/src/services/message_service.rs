//! 消息服务
//!
//! 发送管线: 准入 -> 接收方过滤 -> 幂等落库 -> 在线分拣 -> 事件发布。
//! 超级群读扩散只落 session_message; 单聊/群聊写扩散只落发送者
//! 自己的 user_message 行, 接收者的行由落库事件消费方补齐。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain::errors::{DomainError, DomainResult};
use domain::message::{is_control_type, msg_status, MSG_TYPE_REVOKE};
use domain::now_ms;
use domain::repositories::object_repository::SessionObjectRepository;
use domain::repositories::session_message_repository::{
    NewSessionMessage, SessionMessageRepository,
};
use domain::repositories::session_repository::SessionRepository;
use domain::repositories::session_user_repository::SessionUserRepository;
use domain::repositories::user_message_repository::UserMessageRepository;
use domain::repositories::user_session_repository::UserSessionRepository;
use domain::session::Session;
use domain::session_user::{MUTE_ALL_BIT, MUTE_USER_BIT, ROLE_SUPER_ADMIN};
use domain::user_session::STATUS_REJECT_BIT;
use domain::user_session::STATUS_SILENCE_BIT;
use domain::UserMessage;
use tracing::{error, warn};

use crate::dto::{
    CheckMessageReq, DelSessionMessageReq, DeleteUserMessageReq, GetMessageRes, GetUserMessageReq,
    MessageDto, PushMessageReq, PushMessageRes, SendMessageReq, SendMessageRes, SendSysMessageReq,
    SendSysMessageRes,
};
use crate::events;
use crate::ports::{EventPublisher, IdGenerator, MessageChecker, PresenceStore};

pub struct MessageService {
    pub(crate) sessions: Arc<dyn SessionRepository>,
    pub(crate) session_users: Arc<dyn SessionUserRepository>,
    pub(crate) user_sessions: Arc<dyn UserSessionRepository>,
    pub(crate) session_messages: Arc<dyn SessionMessageRepository>,
    pub(crate) user_messages: Arc<dyn UserMessageRepository>,
    pub(crate) session_objects: Arc<dyn SessionObjectRepository>,
    pub(crate) presence: Arc<dyn PresenceStore>,
    pub(crate) push_publisher: Arc<dyn EventPublisher>,
    pub(crate) offline_push_publisher: Arc<dyn EventPublisher>,
    pub(crate) save_publisher: Arc<dyn EventPublisher>,
    pub(crate) checker: Option<Arc<dyn MessageChecker>>,
    pub(crate) id_gen: Arc<dyn IdGenerator>,
}

impl MessageService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        session_users: Arc<dyn SessionUserRepository>,
        user_sessions: Arc<dyn UserSessionRepository>,
        session_messages: Arc<dyn SessionMessageRepository>,
        user_messages: Arc<dyn UserMessageRepository>,
        session_objects: Arc<dyn SessionObjectRepository>,
        presence: Arc<dyn PresenceStore>,
        push_publisher: Arc<dyn EventPublisher>,
        offline_push_publisher: Arc<dyn EventPublisher>,
        save_publisher: Arc<dyn EventPublisher>,
        checker: Option<Arc<dyn MessageChecker>>,
        id_gen: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            sessions,
            session_users,
            user_sessions,
            session_messages,
            user_messages,
            session_objects,
            presence,
            push_publisher,
            offline_push_publisher,
            save_publisher,
            checker,
            id_gen,
        }
    }

    /// 发送消息, 所有用户消息/系统消息/控制消息共用这条管线
    pub async fn send_message(&self, req: SendMessageReq) -> DomainResult<SendMessageRes> {
        let session = self
            .sessions
            .find(req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        self.check_sender(&session, &req).await?;
        let receivers = self.resolve_receivers(&session, &req).await?;
        if receivers.0.is_empty() {
            return Err(DomainError::UserReject);
        }
        let message = self.persist(&session, &req).await?;
        self.deliver(&session, message, &receivers).await
    }

    /// 发送方准入: 系统消息(from=0)与控制消息(type<0)跳过
    async fn check_sender(&self, session: &Session, req: &SendMessageReq) -> DomainResult<()> {
        if req.from_user_id == 0 || is_control_type(req.msg_type) {
            return Ok(());
        }
        let us = self
            .user_sessions
            .get(req.from_user_id, session.id)
            .await?
            .filter(|us| !us.is_deleted())
            .ok_or(DomainError::SessionInvalid)?;
        // 撤回的正文是 msg_id, 不过审核
        if req.msg_type != MSG_TYPE_REVOKE {
            if let Some(checker) = &self.checker {
                checker
                    .check(&CheckMessageReq {
                        session_type: session.session_type,
                        session_id: session.id,
                        from_user_id: req.from_user_id,
                        entity_id: us.entity_id,
                        message_type: req.msg_type,
                        message_content: req.body.clone(),
                    })
                    .await?;
            }
        }
        if us.mute & MUTE_USER_BIT != 0 {
            return Err(DomainError::UserMuted);
        }
        if us.mute & MUTE_ALL_BIT != 0 && us.role < ROLE_SUPER_ADMIN {
            return Err(DomainError::SessionMuted);
        }
        Ok(())
    }

    /// 接收方过滤: 剔除拒收成员; 指定 receivers 时取交集并保持请求顺序
    async fn resolve_receivers(
        &self,
        session: &Session,
        req: &SendMessageReq,
    ) -> DomainResult<(Vec<i64>, HashMap<i64, i32>)> {
        let members = self
            .session_users
            .find_receivers(session.id, STATUS_REJECT_BIT, &req.receivers)
            .await?;
        let status_by_uid: HashMap<i64, i32> =
            members.iter().map(|m| (m.user_id, m.status)).collect();
        let receivers = if req.receivers.is_empty() {
            members.iter().map(|m| m.user_id).collect()
        } else {
            req.receivers
                .iter()
                .copied()
                .filter(|uid| status_by_uid.contains_key(uid))
                .collect()
        };
        Ok((receivers, status_by_uid))
    }

    /// 幂等落库; 返回下发用的统一消息形态
    async fn persist(&self, session: &Session, req: &SendMessageReq) -> DomainResult<MessageDto> {
        if session.is_read_diffusion() {
            if let Some(existing) = self
                .session_messages
                .find_by_client_id(session.id, req.client_id, req.from_user_id)
                .await?
            {
                return Ok(existing.into());
            }
            let inserted = self
                .session_messages
                .insert(&NewSessionMessage {
                    msg_id: self.id_gen.next_id(),
                    client_id: req.client_id,
                    session_id: session.id,
                    from_user_id: req.from_user_id,
                    msg_type: req.msg_type,
                    msg_content: req.body.clone(),
                    at_users: req.at_users.clone(),
                    reply_msg_id: req.reply_msg_id,
                    ext_data: req.ext_data.clone(),
                    create_time: now_ms(),
                })
                .await?;
            return Ok(inserted.into());
        }

        // 系统消息没有发送者侧的写扩散行
        if req.from_user_id == 0 {
            return Ok(synthetic_message(req, self.id_gen.next_id(), now_ms()));
        }
        if let Some(existing) = self
            .user_messages
            .find_by_client_id(req.from_user_id, session.id, req.client_id)
            .await?
        {
            return Ok(existing.into());
        }
        let message = UserMessage {
            id: 0,
            msg_id: self.id_gen.next_id(),
            client_id: req.client_id,
            user_id: req.from_user_id,
            session_id: session.id,
            from_user_id: req.from_user_id,
            msg_type: req.msg_type,
            msg_content: req.body.clone(),
            reply_msg_id: req.reply_msg_id,
            at_users: req.at_users.clone(),
            ext_data: req.ext_data.clone(),
            // 自己发的消息天然已达已读
            status: msg_status::ACKED | msg_status::READ,
            create_time: now_ms(),
            update_time: now_ms(),
            deleted: 0,
        };
        self.user_messages.insert(&message).await?;
        Ok(message.into())
    }

    /// 在线分拣并发布三类事件
    async fn deliver(
        &self,
        session: &Session,
        message: MessageDto,
        receivers: &(Vec<i64>, HashMap<i64, i32>),
    ) -> DomainResult<SendMessageRes> {
        let (receiver_ids, status_by_uid) = receivers;
        let online_set = match self.presence.online_uids(receiver_ids).await {
            Ok(set) => set,
            Err(err) => {
                // 在线状态查不到时按全员离线继续投递
                warn!(error = %err, session_id = session.id, "query online status failed");
                HashSet::new()
            }
        };
        let (online_ids, offline_ids) = partition_receivers(receiver_ids, &online_set);

        let body = serde_json::to_string(&message)
            .map_err(|e| DomainError::internal(e.to_string()))?;
        let key = events::session_partition_key(session.id);
        let push_headers = vec![
            (
                events::PUSH_HEADER_TYPE.to_string(),
                events::SIGNAL_NEW_MESSAGE.to_string(),
            ),
            (events::PUSH_HEADER_BODY.to_string(), body.clone()),
            (
                events::PUSH_HEADER_RECEIVERS.to_string(),
                encode_ids(&online_ids)?,
            ),
        ];
        if let Err(err) = self.push_publisher.publish(&key, push_headers).await {
            error!(error = %err, session_id = session.id, "publish push event failed");
            return Err(DomainError::MessageDeliveryFailed);
        }

        // 免打扰用户不做离线推送
        let offline_push_ids: Vec<i64> = offline_ids
            .iter()
            .copied()
            .filter(|uid| {
                status_by_uid
                    .get(uid)
                    .map(|s| s & STATUS_SILENCE_BIT == 0)
                    .unwrap_or(false)
            })
            .collect();
        if !offline_push_ids.is_empty() {
            let headers = vec![
                (
                    events::PUSH_HEADER_TYPE.to_string(),
                    events::SIGNAL_NEW_MESSAGE.to_string(),
                ),
                (events::PUSH_HEADER_BODY.to_string(), body.clone()),
                (
                    events::PUSH_HEADER_RECEIVERS.to_string(),
                    encode_ids(&offline_push_ids)?,
                ),
            ];
            if let Err(err) = self.offline_push_publisher.publish(&key, headers).await {
                warn!(error = %err, session_id = session.id, "publish offline push event failed");
            }
        }

        // 写扩散的接收者行由落库事件消费方补齐, 超级群无此事件
        if !session.is_read_diffusion() {
            let headers = vec![
                (events::SAVE_HEADER_BODY.to_string(), body),
                (
                    events::SAVE_HEADER_RECEIVERS.to_string(),
                    encode_ids(receiver_ids)?,
                ),
            ];
            if let Err(err) = self.save_publisher.publish(&key, headers).await {
                error!(error = %err, session_id = session.id, "publish save event failed");
                return Err(DomainError::MessageDeliveryFailed);
            }
        }

        Ok(SendMessageRes {
            msg_id: message.msg_id,
            create_time: message.create_time,
            online_ids,
            offline_ids,
        })
    }

    /// 无会话的系统广播: 不落库, 接收者行全部由落库事件消费方写入
    pub async fn send_sys_message(
        &self,
        req: SendSysMessageReq,
    ) -> DomainResult<SendSysMessageRes> {
        if req.receivers.is_empty() {
            return Err(DomainError::ParamsError);
        }
        let msg_id = self.id_gen.next_id();
        let now = now_ms();
        let message = MessageDto {
            client_id: msg_id,
            session_id: 0,
            msg_id,
            from_user_id: 0,
            msg_type: req.msg_type,
            body: req.body,
            at_users: None,
            reply_msg_id: None,
            ext_data: req.ext_data,
            status: None,
            create_time: now,
        };

        let online_set = match self.presence.online_uids(&req.receivers).await {
            Ok(set) => set,
            Err(err) => {
                warn!(error = %err, "query online status failed");
                HashSet::new()
            }
        };
        let (online_ids, offline_ids) = partition_receivers(&req.receivers, &online_set);

        let body = serde_json::to_string(&message)
            .map_err(|e| DomainError::internal(e.to_string()))?;
        let key = events::session_partition_key(0);
        let headers = vec![
            (
                events::PUSH_HEADER_TYPE.to_string(),
                events::SIGNAL_NEW_MESSAGE.to_string(),
            ),
            (events::PUSH_HEADER_BODY.to_string(), body.clone()),
            (
                events::PUSH_HEADER_RECEIVERS.to_string(),
                encode_ids(&online_ids)?,
            ),
        ];
        if let Err(err) = self.push_publisher.publish(&key, headers).await {
            error!(error = %err, "publish push event failed");
            return Err(DomainError::MessageDeliveryFailed);
        }
        if !offline_ids.is_empty() {
            let headers = vec![
                (
                    events::PUSH_HEADER_TYPE.to_string(),
                    events::SIGNAL_NEW_MESSAGE.to_string(),
                ),
                (events::PUSH_HEADER_BODY.to_string(), body.clone()),
                (
                    events::PUSH_HEADER_RECEIVERS.to_string(),
                    encode_ids(&offline_ids)?,
                ),
            ];
            if let Err(err) = self.offline_push_publisher.publish(&key, headers).await {
                warn!(error = %err, "publish offline push event failed");
            }
        }
        let headers = vec![
            (events::SAVE_HEADER_BODY.to_string(), body),
            (
                events::SAVE_HEADER_RECEIVERS.to_string(),
                encode_ids(&req.receivers)?,
            ),
        ];
        if let Err(err) = self.save_publisher.publish(&key, headers).await {
            error!(error = %err, "publish save event failed");
            return Err(DomainError::MessageDeliveryFailed);
        }

        Ok(SendSysMessageRes {
            msg_id,
            create_time: now,
            online_ids,
            offline_ids,
        })
    }

    /// 系统直推信令, 不落库
    pub async fn push_message(&self, req: PushMessageReq) -> DomainResult<PushMessageRes> {
        if req.user_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        let online_set = match self.presence.online_uids(&req.user_ids).await {
            Ok(set) => set,
            Err(err) => {
                warn!(error = %err, "query online status failed");
                HashSet::new()
            }
        };
        let (online_ids, offline_ids) = partition_receivers(&req.user_ids, &online_set);

        let headers = vec![
            (
                events::PUSH_HEADER_TYPE.to_string(),
                req.signal_type.to_string(),
            ),
            (events::PUSH_HEADER_BODY.to_string(), req.body.clone()),
            (
                events::PUSH_HEADER_RECEIVERS.to_string(),
                encode_ids(&online_ids)?,
            ),
        ];
        if let Err(err) = self
            .push_publisher
            .publish(events::PUSH_PARTITION_KEY, headers)
            .await
        {
            error!(error = %err, "publish push event failed");
            return Err(DomainError::MessageDeliveryFailed);
        }
        if req.offline_push && !offline_ids.is_empty() {
            let headers = vec![
                (
                    events::PUSH_HEADER_TYPE.to_string(),
                    req.signal_type.to_string(),
                ),
                (events::PUSH_HEADER_BODY.to_string(), req.body),
                (
                    events::PUSH_HEADER_RECEIVERS.to_string(),
                    encode_ids(&offline_ids)?,
                ),
            ];
            if let Err(err) = self
                .offline_push_publisher
                .publish(events::PUSH_PARTITION_KEY, headers)
                .await
            {
                warn!(error = %err, "publish offline push event failed");
            }
        }
        Ok(PushMessageRes {
            online_ids,
            offline_ids,
        })
    }

    /// 用户增量拉取写扩散消息
    pub async fn get_user_messages(&self, req: GetUserMessageReq) -> DomainResult<GetMessageRes> {
        if req.count <= 0 {
            return Err(DomainError::ParamsError);
        }
        let list = self
            .user_messages
            .get_user_messages(req.user_id, req.c_time, req.offset, req.count)
            .await?;
        Ok(GetMessageRes {
            data: list.into_iter().map(MessageDto::from).collect(),
        })
    }

    /// 超级群历史消息分页
    pub async fn get_session_messages(
        &self,
        session_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
        msg_ids: &[i64],
        asc: bool,
    ) -> DomainResult<GetMessageRes> {
        if count <= 0 {
            return Err(DomainError::ParamsError);
        }
        let list = self
            .session_messages
            .get_messages(session_id, c_time, offset, count, msg_ids, asc)
            .await?;
        Ok(GetMessageRes {
            data: list.into_iter().map(MessageDto::from).collect(),
        })
    }

    /// 管理侧批量删除超级群消息
    pub async fn del_session_messages(
        &self,
        session_id: i64,
        req: DelSessionMessageReq,
    ) -> DomainResult<()> {
        if req.msg_ids.is_empty() && req.time_from >= req.time_to {
            return Err(DomainError::ParamsError);
        }
        self.session_messages
            .delete_many(session_id, &req.msg_ids, req.time_from, req.time_to)
            .await
    }

    /// 用户删除自己的写扩散消息
    pub async fn delete_user_messages(&self, req: DeleteUserMessageReq) -> DomainResult<()> {
        if req.msg_ids.is_empty() && req.time_from.is_none() && req.time_to.is_none() {
            return Err(DomainError::ParamsError);
        }
        self.user_messages
            .delete_messages(
                req.user_id,
                req.session_id,
                &req.msg_ids,
                req.time_from,
                req.time_to,
            )
            .await
    }
}

/// 按接收方原始顺序分拣在线, 离线去重
pub(crate) fn partition_receivers(
    receivers: &[i64],
    online: &HashSet<i64>,
) -> (Vec<i64>, Vec<i64>) {
    let mut online_ids = Vec::new();
    let mut offline_ids = Vec::new();
    let mut seen_offline = HashSet::new();
    for uid in receivers {
        if online.contains(uid) {
            online_ids.push(*uid);
        } else if seen_offline.insert(*uid) {
            offline_ids.push(*uid);
        }
    }
    (online_ids, offline_ids)
}

fn encode_ids(ids: &[i64]) -> DomainResult<String> {
    serde_json::to_string(ids).map_err(|e| DomainError::internal(e.to_string()))
}

/// 系统消息下发体, 无落库行
fn synthetic_message(req: &SendMessageReq, msg_id: i64, create_time: i64) -> MessageDto {
    MessageDto {
        client_id: req.client_id,
        session_id: req.session_id,
        msg_id,
        from_user_id: req.from_user_id,
        msg_type: req.msg_type,
        body: req.body.clone(),
        at_users: req.at_users.clone(),
        reply_msg_id: req.reply_msg_id,
        ext_data: req.ext_data.clone(),
        status: None,
        create_time,
    }
}
