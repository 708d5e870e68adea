//! 服务层测试夹具: 全部仓储与出站端口的内存实现

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use domain::errors::{DomainError, DomainResult};
use domain::message::{msg_status, SessionMessage, UserMessage};
use domain::now_ms;
use domain::object::{Object, SessionObject};
use domain::presence::{Platform, UserOnlineStatus};
use domain::repositories::object_repository::{ObjectRepository, SessionObjectRepository};
use domain::repositories::session_message_repository::{
    NewSessionMessage, SessionMessageRepository,
};
use domain::repositories::session_repository::SessionRepository;
use domain::repositories::session_user_repository::SessionUserRepository;
use domain::repositories::user_message_repository::UserMessageRepository;
use domain::repositories::user_session_repository::{UserSessionRepository, UserSessionUpdate};
use domain::session::Session;
use domain::session_user::{NewMember, SessionUser};
use domain::user_session::UserSession;

use crate::dto::{CheckMessageReq, CreateSessionReq, OnlineStatusNotify, SendMessageReq};
use crate::ports::{
    EventPublisher, IdGenerator, LockGuard, LockManager, MessageChecker, ObjectStorage,
    PresenceStore, UserApi,
};
use crate::services::message_service::MessageService;
use crate::services::object_service::ObjectService;
use crate::services::session_service::SessionService;
use crate::services::user_service::UserService;
use crate::services::ImSettings;

// ---------------- 请求构造 ----------------

pub fn single_create_req(user_id: i64, entity_id: i64) -> CreateSessionReq {
    CreateSessionReq {
        user_id,
        session_type: domain::session::SESSION_TYPE_SINGLE,
        entity_id,
        members: vec![],
        member_names: vec![],
        member_avatars: vec![],
        name: "single".to_string(),
        remark: String::new(),
        function_flag: default_flags(),
        ext_data: None,
    }
}

pub fn group_create_req(user_id: i64, entity_id: i64, members: Vec<i64>) -> CreateSessionReq {
    CreateSessionReq {
        user_id,
        session_type: domain::session::SESSION_TYPE_GROUP,
        entity_id,
        members,
        member_names: vec![],
        member_avatars: vec![],
        name: "group".to_string(),
        remark: String::new(),
        function_flag: default_flags(),
        ext_data: None,
    }
}

pub fn super_group_create_req(user_id: i64, entity_id: i64, members: Vec<i64>) -> CreateSessionReq {
    CreateSessionReq {
        session_type: domain::session::SESSION_TYPE_SUPER_GROUP,
        ..group_create_req(user_id, entity_id, members)
    }
}

pub fn text_message(from_user_id: i64, session_id: i64, client_id: i64) -> SendMessageReq {
    SendMessageReq {
        client_id,
        session_id,
        msg_type: 1,
        from_user_id,
        c_time: now_ms(),
        body: "hello".to_string(),
        at_users: None,
        reply_msg_id: None,
        ext_data: None,
        receivers: vec![],
    }
}

fn default_flags() -> i64 {
    use domain::session::function_flag as ff;
    ff::TEXT | ff::IMAGE | ff::FORWARD | ff::READ
}

// ---------------- 仓储内存实现 ----------------

#[derive(Default)]
pub struct MemSessionRepo {
    rows: Mutex<HashMap<i64, Session>>,
    next_id: AtomicI64,
}

impl MemSessionRepo {
    fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1000),
        }
    }
}

#[async_trait]
impl SessionRepository for MemSessionRepo {
    async fn create_empty(
        &self,
        session_type: i32,
        name: &str,
        remark: &str,
        function_flag: i64,
        ext_data: Option<&str>,
    ) -> DomainResult<Session> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            id,
            name: name.to_string(),
            remark: remark.to_string(),
            function_flag,
            session_type,
            mute: 0,
            ext_data: ext_data.map(|s| s.to_string()),
            create_time: now_ms(),
            update_time: now_ms(),
            deleted: 0,
        };
        self.rows.lock().unwrap().insert(id, session.clone());
        Ok(session)
    }

    async fn find(&self, session_id: i64) -> DomainResult<Option<Session>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&session_id)
            .filter(|s| !s.is_deleted())
            .cloned())
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
        let mut rows = self.rows.lock().unwrap();
        if let Some(s) = rows.get_mut(&session_id) {
            if let Some(v) = name {
                s.name = v.to_string();
            }
            if let Some(v) = remark {
                s.remark = v.to_string();
            }
            if let Some(v) = mute {
                s.mute = v;
            }
            if let Some(v) = function_flag {
                s.function_flag = v;
            }
            if let Some(v) = ext_data {
                s.ext_data = Some(v.to_string());
            }
            s.update_time = now_ms();
        }
        Ok(())
    }

    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        if let Some(s) = self.rows.lock().unwrap().get_mut(&session_id) {
            s.session_type = session_type;
        }
        Ok(())
    }
}

impl MemSessionRepo {
    fn mark_deleted(&self, session_id: i64) {
        if let Some(s) = self.rows.lock().unwrap().get_mut(&session_id) {
            s.deleted = 1;
        }
    }
}

pub struct MemUserSessionRepo {
    rows: Mutex<Vec<UserSession>>,
    next_id: AtomicI64,
}

impl MemUserSessionRepo {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserSessionRepository for MemUserSessionRepo {
    async fn find_by_entity_id(
        &self,
        user_id: i64,
        entity_id: i64,
        session_type: i32,
        include_deleted: bool,
    ) -> DomainResult<Option<UserSession>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|us| {
                us.user_id == user_id
                    && us.entity_id == entity_id
                    && us.session_type == session_type
                    && (include_deleted || !us.is_deleted())
            })
            .cloned())
    }

    async fn get(&self, user_id: i64, session_id: i64) -> DomainResult<Option<UserSession>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|us| us.user_id == user_id && us.session_id == session_id)
            .cloned())
    }

    async fn query_latest(
        &self,
        user_id: i64,
        m_time: i64,
        offset: i64,
        count: i64,
        types: &[i32],
    ) -> DomainResult<Vec<UserSession>> {
        let mut list: Vec<UserSession> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|us| {
                us.user_id == user_id
                    && us.update_time > m_time
                    && (types.is_empty() || types.contains(&us.session_type))
            })
            .cloned()
            .collect();
        list.sort_by_key(|us| us.update_time);
        Ok(list
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .collect())
    }

    async fn update(
        &self,
        user_ids: &[i64],
        session_id: i64,
        update: &UserSessionUpdate,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for us in rows.iter_mut() {
            if us.session_id != session_id || !user_ids.contains(&us.user_id) {
                continue;
            }
            if let Some(v) = &update.name {
                us.name = v.clone();
            }
            if let Some(v) = &update.remark {
                us.remark = v.clone();
            }
            if let Some(v) = update.mute {
                us.mute = v.apply(us.mute);
            }
            if let Some(v) = update.function_flag {
                us.function_flag = v;
            }
            if let Some(v) = &update.ext_data {
                us.ext_data = Some(v.clone());
            }
            if let Some(v) = &update.note_name {
                us.note_name = v.clone();
            }
            if let Some(v) = update.top {
                us.top = v;
            }
            if let Some(v) = update.status {
                us.status = v;
            }
            if let Some(v) = update.role {
                us.role = v;
            }
            if let Some(v) = update.parent_id {
                us.parent_id = v;
            }
            us.update_time = now_ms();
        }
        Ok(())
    }

    async fn update_type(
        &self,
        user_ids: &[i64],
        session_id: i64,
        session_type: i32,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for us in rows.iter_mut() {
            if us.session_id == session_id && user_ids.contains(&us.user_id) {
                us.session_type = session_type;
            }
        }
        Ok(())
    }

    async fn touch(&self, user_id: i64, session_id: i64, now_ms: i64) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for us in rows.iter_mut() {
            if us.session_id == session_id && us.user_id == user_id {
                us.update_time = now_ms;
            }
        }
        Ok(())
    }
}

pub struct MemSessionUserRepo {
    rows: Mutex<Vec<SessionUser>>,
    next_id: AtomicI64,
    user_sessions: Arc<MemUserSessionRepo>,
    sessions: Arc<MemSessionRepo>,
}

impl MemSessionUserRepo {
    fn new(user_sessions: Arc<MemUserSessionRepo>, sessions: Arc<MemSessionRepo>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            user_sessions,
            sessions,
        }
    }
}

#[async_trait]
impl SessionUserRepository for MemSessionUserRepo {
    async fn find_by_m_time(
        &self,
        session_id: i64,
        m_time: i64,
        role: Option<i32>,
        count: i64,
    ) -> DomainResult<Vec<SessionUser>> {
        let mut list: Vec<SessionUser> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|su| {
                su.session_id == session_id
                    && su.update_time >= m_time
                    && role.map(|r| su.role == r).unwrap_or(true)
            })
            .cloned()
            .collect();
        list.sort_by_key(|su| su.update_time);
        Ok(list.into_iter().take(count as usize).collect())
    }

    async fn find_all(&self, session_id: i64) -> DomainResult<Vec<SessionUser>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|su| su.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn find_many(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<Vec<SessionUser>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|su| {
                su.session_id == session_id
                    && user_ids.contains(&su.user_id)
                    && su.deleted == 0
            })
            .cloned()
            .collect())
    }

    async fn find_one(&self, session_id: i64, user_id: i64) -> DomainResult<Option<SessionUser>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|su| su.session_id == session_id && su.user_id == user_id && su.deleted == 0)
            .cloned())
    }

    async fn count(&self, session_id: i64) -> DomainResult<i64> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|su| su.session_id == session_id && su.deleted == 0)
            .count() as i64)
    }

    async fn find_receivers(
        &self,
        session_id: i64,
        status_mask: i32,
        user_ids: &[i64],
    ) -> DomainResult<Vec<SessionUser>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|su| {
                su.session_id == session_id
                    && su.deleted == 0
                    && su.status & status_mask == 0
                    && (user_ids.is_empty() || user_ids.contains(&su.user_id))
            })
            .cloned()
            .collect())
    }

    async fn add_users(
        &self,
        session: &Session,
        members: &[NewMember],
        max_count: i64,
    ) -> DomainResult<Vec<UserSession>> {
        let current = self.count(session.id).await?;
        if current + members.len() as i64 > max_count {
            return Err(DomainError::MemberCount);
        }
        let mut result = Vec::with_capacity(members.len());
        for member in members {
            let now = now_ms();
            {
                let mut rows = self.rows.lock().unwrap();
                match rows
                    .iter_mut()
                    .find(|su| su.session_id == session.id && su.user_id == member.user_id)
                {
                    Some(su) => {
                        su.deleted = 0;
                        su.role = member.role;
                        su.update_time = now;
                    }
                    None => rows.push(SessionUser {
                        id: self.next_id.fetch_add(1, Ordering::SeqCst),
                        session_id: session.id,
                        user_id: member.user_id,
                        session_type: session.session_type,
                        role: member.role,
                        mute: 0,
                        status: 0,
                        note_name: member.note_name.clone(),
                        note_avatar: member.note_avatar.clone(),
                        create_time: now,
                        update_time: now,
                        deleted: 0,
                    }),
                }
            }
            let mut mirrors = self.user_sessions.rows.lock().unwrap();
            let us = match mirrors
                .iter_mut()
                .find(|us| us.session_id == session.id && us.user_id == member.user_id)
            {
                Some(us) => {
                    us.deleted = 0;
                    us.role = member.role;
                    us.update_time = now;
                    us.clone()
                }
                None => {
                    let us = UserSession {
                        id: self.user_sessions.next_id.fetch_add(1, Ordering::SeqCst),
                        session_id: session.id,
                        user_id: member.user_id,
                        parent_id: 0,
                        session_type: session.session_type,
                        entity_id: member.entity_id,
                        name: session.name.clone(),
                        remark: session.remark.clone(),
                        function_flag: session.function_flag,
                        ext_data: session.ext_data.clone(),
                        top: 0,
                        role: member.role,
                        mute: 0,
                        status: 0,
                        note_name: member.note_name.clone(),
                        note_avatar: member.note_avatar.clone(),
                        create_time: now,
                        update_time: now,
                        deleted: 0,
                    };
                    mirrors.push(us.clone());
                    us
                }
            };
            result.push(us);
        }
        Ok(result)
    }

    async fn del_users(&self, session_id: i64, user_ids: &[i64]) -> DomainResult<()> {
        {
            let mut rows = self.rows.lock().unwrap();
            for su in rows.iter_mut() {
                if su.session_id == session_id && user_ids.contains(&su.user_id) {
                    su.deleted = 1;
                }
            }
        }
        let mut mirrors = self.user_sessions.rows.lock().unwrap();
        for us in mirrors.iter_mut() {
            if us.session_id == session_id && user_ids.contains(&us.user_id) {
                us.deleted = 1;
            }
        }
        Ok(())
    }

    async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for su in rows.iter_mut() {
            if su.session_id == session_id {
                su.session_type = session_type;
            }
        }
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
        mute: Option<domain::user_session::MuteUpdate>,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for su in rows.iter_mut() {
            if su.session_id != session_id || !user_ids.contains(&su.user_id) {
                continue;
            }
            if let Some(v) = role {
                su.role = v;
            }
            if let Some(v) = status {
                su.status = v;
            }
            if let Some(v) = note_name {
                su.note_name = v.to_string();
            }
            if let Some(v) = note_avatar {
                su.note_avatar = v.to_string();
            }
            if let Some(v) = mute {
                su.mute = v.apply(su.mute);
            }
            su.update_time = now_ms();
        }
        Ok(())
    }

    async fn delete_session_cascade(&self, session_id: i64) -> DomainResult<()> {
        let user_ids: Vec<i64> = self
            .find_all(session_id)
            .await?
            .into_iter()
            .map(|su| su.user_id)
            .collect();
        self.del_users(session_id, &user_ids).await?;
        self.sessions.mark_deleted(session_id);
        Ok(())
    }
}

pub struct MemSessionMessageRepo {
    rows: Mutex<Vec<SessionMessage>>,
    next_id: AtomicI64,
}

impl MemSessionMessageRepo {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl SessionMessageRepository for MemSessionMessageRepo {
    async fn insert(&self, message: &NewSessionMessage) -> DomainResult<SessionMessage> {
        let row = SessionMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
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
            update_time: message.create_time,
            deleted: 0,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find_by_client_id(
        &self,
        session_id: i64,
        client_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.session_id == session_id
                    && m.client_id == client_id
                    && m.from_user_id == from_user_id
                    && m.deleted == 0
            })
            .cloned())
    }

    async fn find(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.session_id == session_id
                    && m.msg_id == msg_id
                    && m.from_user_id == from_user_id
                    && m.deleted == 0
            })
            .cloned())
    }

    async fn find_any(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<Option<SessionMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.session_id == session_id
                    && m.msg_id == msg_id
                    && m.from_user_id == from_user_id
            })
            .cloned())
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
        let mut list: Vec<SessionMessage> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.session_id == session_id
                    && m.deleted == 0
                    && (msg_ids.is_empty() || msg_ids.contains(&m.msg_id))
                    && if asc {
                        m.create_time >= c_time
                    } else {
                        m.create_time <= c_time
                    }
            })
            .cloned()
            .collect();
        list.sort_by_key(|m| if asc { m.create_time } else { -m.create_time });
        Ok(list
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .collect())
    }

    async fn delete_one(
        &self,
        session_id: i64,
        msg_id: i64,
        from_user_id: i64,
    ) -> DomainResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for m in rows.iter_mut() {
            if m.session_id == session_id
                && m.msg_id == msg_id
                && m.from_user_id == from_user_id
                && m.deleted == 0
            {
                m.deleted = 1;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete_many(
        &self,
        session_id: i64,
        msg_ids: &[i64],
        time_from: i64,
        time_to: i64,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for m in rows.iter_mut() {
            if m.session_id != session_id {
                continue;
            }
            let hit = if msg_ids.is_empty() {
                m.create_time >= time_from && m.create_time <= time_to
            } else {
                msg_ids.contains(&m.msg_id)
            };
            if hit {
                m.deleted = 1;
            }
        }
        Ok(())
    }
}

pub struct MemUserMessageRepo {
    rows: Mutex<Vec<UserMessage>>,
    next_id: AtomicI64,
}

impl MemUserMessageRepo {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl UserMessageRepository for MemUserMessageRepo {
    async fn insert(&self, message: &UserMessage) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let exists = rows.iter().any(|m| {
            m.user_id == message.user_id
                && m.session_id == message.session_id
                && m.from_user_id == message.from_user_id
                && m.client_id == message.client_id
        });
        if !exists {
            let mut row = message.clone();
            row.id = self.next_id.fetch_add(1, Ordering::SeqCst);
            rows.push(row);
        }
        Ok(())
    }

    async fn find_by_client_id(
        &self,
        user_id: i64,
        session_id: i64,
        client_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.user_id == user_id
                    && m.session_id == session_id
                    && m.from_user_id == user_id
                    && m.client_id == client_id
                    && m.deleted == 0
            })
            .cloned())
    }

    async fn find(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.user_id == user_id
                    && m.session_id == session_id
                    && m.msg_id == msg_id
                    && m.deleted == 0
            })
            .cloned())
    }

    async fn find_any(
        &self,
        user_id: i64,
        session_id: i64,
        msg_id: i64,
    ) -> DomainResult<Option<UserMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.session_id == session_id && m.msg_id == msg_id)
            .cloned())
    }

    async fn find_many(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
    ) -> DomainResult<Vec<UserMessage>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.user_id == user_id
                    && m.session_id == session_id
                    && msg_ids.contains(&m.msg_id)
                    && m.deleted == 0
            })
            .cloned()
            .collect())
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
        let mut rows = self.rows.lock().unwrap();
        for m in rows.iter_mut() {
            if m.user_id == user_id && m.session_id == session_id && msg_ids.contains(&m.msg_id) {
                m.status |= status_bits;
                m.update_time = now_ms();
            }
        }
        Ok(())
    }

    async fn get_user_messages(
        &self,
        user_id: i64,
        c_time: i64,
        offset: i64,
        count: i64,
    ) -> DomainResult<Vec<UserMessage>> {
        let mut list: Vec<UserMessage> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.user_id == user_id
                    && m.deleted == 0
                    && (m.create_time > c_time || m.status == msg_status::INIT)
            })
            .cloned()
            .collect();
        list.sort_by_key(|m| m.create_time);
        Ok(list
            .into_iter()
            .skip(offset as usize)
            .take(count as usize)
            .collect())
    }

    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        msg_ids: &[i64],
        time_from: Option<i64>,
        time_to: Option<i64>,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for m in rows.iter_mut() {
            if m.user_id != user_id || m.session_id != session_id {
                continue;
            }
            let by_id = msg_ids.contains(&m.msg_id);
            let by_range = time_from.map(|t| m.create_time >= t).unwrap_or(false)
                && time_to.map(|t| m.create_time <= t).unwrap_or(false);
            if by_id || by_range {
                m.deleted = 1;
            }
        }
        Ok(())
    }

    async fn delete_by_session(&self, user_id: i64, session_id: i64) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        for m in rows.iter_mut() {
            if m.user_id == user_id && m.session_id == session_id {
                m.deleted = 1;
            }
        }
        Ok(())
    }
}

pub struct MemObjectRepo {
    rows: Mutex<Vec<Object>>,
    next_id: AtomicI64,
    session_users: Arc<MemSessionUserRepo>,
    session_objects: Arc<MemSessionObjectRepo>,
}

impl MemObjectRepo {
    fn new(
        session_users: Arc<MemSessionUserRepo>,
        session_objects: Arc<MemSessionObjectRepo>,
    ) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            session_users,
            session_objects,
        }
    }
}

#[async_trait]
impl ObjectRepository for MemObjectRepo {
    async fn insert(&self, session_id: i64, engine: &str, key: &str) -> DomainResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(Object {
            id,
            session_id,
            engine: engine.to_string(),
            key: key.to_string(),
            create_time: now_ms(),
            update_time: now_ms(),
            deleted: 0,
        });
        Ok(id)
    }

    async fn find(&self, object_id: i64) -> DomainResult<Option<Object>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == object_id && o.deleted == 0)
            .cloned())
    }

    async fn find_for_user(&self, object_id: i64, user_id: i64) -> DomainResult<Option<Object>> {
        let object = match self.find(object_id).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let mut session_ids = vec![object.session_id];
        session_ids.extend(
            self.session_objects
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|so| so.object_id == object_id)
                .map(|so| so.session_id),
        );
        for sid in session_ids {
            if self.session_users.find_one(sid, user_id).await?.is_some() {
                return Ok(Some(object));
            }
        }
        Ok(None)
    }
}

pub struct MemSessionObjectRepo {
    rows: Mutex<Vec<SessionObject>>,
    next_id: AtomicI64,
}

impl MemSessionObjectRepo {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl SessionObjectRepository for MemSessionObjectRepo {
    async fn insert(
        &self,
        object_id: i64,
        session_id: i64,
        from_user_id: i64,
        client_id: i64,
    ) -> DomainResult<()> {
        self.rows.lock().unwrap().push(SessionObject {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            object_id,
            session_id,
            from_user_id,
            client_id,
            create_time: now_ms(),
        });
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
        let hits: Vec<i64> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|so| {
                so.session_id == src_session_id
                    && from_user_ids.contains(&so.from_user_id)
                    && client_ids.contains(&so.client_id)
            })
            .map(|so| so.object_id)
            .collect();
        for object_id in &hits {
            self.insert(*object_id, new_session_id, new_from_user_id, new_client_id)
                .await?;
        }
        Ok(hits)
    }
}

// ---------------- 出站端口假实现 ----------------

pub struct FakeLockManager;

struct NoopGuard;

#[async_trait]
impl LockGuard for NoopGuard {
    async fn release(self: Box<Self>) -> DomainResult<bool> {
        Ok(true)
    }
}

#[async_trait]
impl LockManager for FakeLockManager {
    async fn acquire(
        &self,
        _key: &str,
        _wait_ms: u64,
        _ttl_ms: u64,
    ) -> DomainResult<Box<dyn LockGuard>> {
        Ok(Box::new(NoopGuard))
    }
}

#[derive(Default)]
pub struct FakePresence {
    records: Mutex<HashMap<(i64, Platform), UserOnlineStatus>>,
    fail_next: AtomicBool,
}

impl FakePresence {
    pub fn set_online(&self, user_id: i64) {
        self.records.lock().unwrap().insert(
            (user_id, Platform::Android),
            UserOnlineStatus {
                user_id,
                platform: Platform::Android,
                conn_id: 1,
                node_id: 1,
                timestamp_ms: 0,
            },
        );
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PresenceStore for FakePresence {
    async fn set(&self, status: &UserOnlineStatus, _ttl_secs: u64) -> DomainResult<()> {
        self.records
            .lock()
            .unwrap()
            .insert((status.user_id, status.platform), status.clone());
        Ok(())
    }

    async fn get(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> DomainResult<Option<UserOnlineStatus>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(user_id, platform))
            .cloned())
    }

    async fn delete(&self, user_id: i64, platform: Platform) -> DomainResult<()> {
        self.records.lock().unwrap().remove(&(user_id, platform));
        Ok(())
    }

    async fn statuses(&self, user_ids: &[i64]) -> DomainResult<Vec<UserOnlineStatus>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|s| user_ids.contains(&s.user_id))
            .cloned()
            .collect())
    }

    async fn online_uids(&self, user_ids: &[i64]) -> DomainResult<HashSet<i64>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DomainError::cache("connection refused"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(uid, _)| user_ids.contains(uid))
            .map(|(uid, _)| *uid)
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub key: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedEvent {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

#[derive(Default)]
pub struct FakePublisher {
    events: Mutex<Vec<RecordedEvent>>,
    fail_next: AtomicBool,
}

impl FakePublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for FakePublisher {
    async fn publish(&self, key: &str, headers: Vec<(String, String)>) -> DomainResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DomainError::bus("broker unavailable"));
        }
        self.events.lock().unwrap().push(RecordedEvent {
            key: key.to_string(),
            headers,
        });
        Ok(())
    }
}

pub struct RejectingChecker {
    code: i32,
    message: String,
}

#[async_trait]
impl MessageChecker for RejectingChecker {
    async fn check(&self, _req: &CheckMessageReq) -> DomainResult<()> {
        Err(DomainError::Moderation {
            code: self.code,
            message: self.message.clone(),
        })
    }
}

#[derive(Default)]
pub struct FakeUserApi {
    notifies: Mutex<Vec<OnlineStatusNotify>>,
}

impl FakeUserApi {
    pub fn notifies(&self) -> Vec<OnlineStatusNotify> {
        self.notifies.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserApi for FakeUserApi {
    async fn user_id_by_token(&self, _token: &str) -> DomainResult<i64> {
        Ok(1)
    }

    async fn post_online_status(&self, notify: &OnlineStatusNotify) -> DomainResult<()> {
        self.notifies.lock().unwrap().push(notify.clone());
        Ok(())
    }
}

pub struct FakeStorage;

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_params(
        &self,
        key: &str,
    ) -> DomainResult<(String, String, HashMap<String, String>)> {
        let mut params = HashMap::new();
        params.insert("key".to_string(), key.to_string());
        Ok((
            format!("http://minio.local/{}", key),
            "PUT".to_string(),
            params,
        ))
    }

    async fn download_url(&self, key: &str) -> DomainResult<String> {
        Ok(format!("http://minio.local/{}", key))
    }
}

pub struct SeqIdGen {
    next: AtomicI64,
}

impl IdGenerator for SeqIdGen {
    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

// ---------------- 测试环境 ----------------

pub struct TestEnv {
    pub sessions: Arc<MemSessionRepo>,
    pub session_users: Arc<MemSessionUserRepo>,
    pub user_sessions: Arc<MemUserSessionRepo>,
    pub session_messages: Arc<MemSessionMessageRepo>,
    pub user_messages: Arc<MemUserMessageRepo>,
    pub objects: Arc<MemObjectRepo>,
    pub session_objects: Arc<MemSessionObjectRepo>,
    pub presence: Arc<FakePresence>,
    pub push_publisher: Arc<FakePublisher>,
    pub offline_push_publisher: Arc<FakePublisher>,
    pub save_publisher: Arc<FakePublisher>,
    pub user_api: Arc<FakeUserApi>,
    pub id_gen: Arc<SeqIdGen>,
    checker: Option<Arc<dyn MessageChecker>>,
}

impl TestEnv {
    pub fn new() -> Self {
        let sessions = Arc::new(MemSessionRepo::new());
        let user_sessions = Arc::new(MemUserSessionRepo::new());
        let session_users = Arc::new(MemSessionUserRepo::new(
            user_sessions.clone(),
            sessions.clone(),
        ));
        let session_objects = Arc::new(MemSessionObjectRepo::new());
        let objects = Arc::new(MemObjectRepo::new(
            session_users.clone(),
            session_objects.clone(),
        ));
        Self {
            sessions,
            session_users,
            user_sessions,
            session_messages: Arc::new(MemSessionMessageRepo::new()),
            user_messages: Arc::new(MemUserMessageRepo::new()),
            objects,
            session_objects,
            presence: Arc::new(FakePresence::default()),
            push_publisher: Arc::new(FakePublisher::default()),
            offline_push_publisher: Arc::new(FakePublisher::default()),
            save_publisher: Arc::new(FakePublisher::default()),
            user_api: Arc::new(FakeUserApi::default()),
            id_gen: Arc::new(SeqIdGen {
                next: AtomicI64::new(1),
            }),
            checker: None,
        }
    }

    pub fn with_checker(mut self, code: i32, message: &str) -> Self {
        self.checker = Some(Arc::new(RejectingChecker {
            code,
            message: message.to_string(),
        }));
        self
    }

    fn settings(&self) -> ImSettings {
        ImSettings {
            name: "im".to_string(),
            max_group_member: 4,
            max_super_group_member: 8,
        }
    }

    pub fn session_service(&self) -> SessionService {
        SessionService::new(
            self.sessions.clone(),
            self.session_users.clone(),
            self.user_sessions.clone(),
            self.user_messages.clone(),
            Arc::new(FakeLockManager),
            self.settings(),
        )
    }

    pub fn message_service(&self) -> MessageService {
        MessageService::new(
            self.sessions.clone(),
            self.session_users.clone(),
            self.user_sessions.clone(),
            self.session_messages.clone(),
            self.user_messages.clone(),
            self.session_objects.clone(),
            self.presence.clone(),
            self.push_publisher.clone(),
            self.offline_push_publisher.clone(),
            self.save_publisher.clone(),
            self.checker.clone(),
            self.id_gen.clone(),
        )
    }

    pub fn services(&self) -> (SessionService, MessageService) {
        (self.session_service(), self.message_service())
    }

    pub fn object_service(&self) -> ObjectService {
        ObjectService::new(
            self.session_users.clone(),
            self.objects.clone(),
            self.session_objects.clone(),
            Arc::new(FakeStorage),
        )
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(
            self.presence.clone(),
            self.user_api.clone(),
            self.push_publisher.clone(),
            300,
        )
    }

    /// 给接收者补一条写扩散行(模拟落库消费方), 消息来自用户 7
    pub fn seed_user_message(&self, user_id: i64, session_id: i64, msg_id: i64) {
        self.user_messages.rows.lock().unwrap().push(UserMessage {
            id: 0,
            msg_id,
            client_id: msg_id,
            user_id,
            session_id,
            from_user_id: 7,
            msg_type: 1,
            msg_content: "hello".to_string(),
            reply_msg_id: None,
            at_users: None,
            ext_data: None,
            status: msg_status::INIT,
            create_time: now_ms(),
            update_time: now_ms(),
            deleted: 0,
        });
    }

    /// 登记一个对象及其会话绑定, 返回 object_id
    pub fn seed_object(&self, session_id: i64, from_user_id: i64, client_id: i64) -> i64 {
        let id = self.objects.next_id.fetch_add(1, Ordering::SeqCst);
        self.objects.rows.lock().unwrap().push(Object {
            id,
            session_id,
            engine: "minio".to_string(),
            key: format!("session-{}/{}/{}", session_id, from_user_id, client_id),
            create_time: now_ms(),
            update_time: now_ms(),
            deleted: 0,
        });
        self.session_objects
            .rows
            .lock()
            .unwrap()
            .push(SessionObject {
                id,
                object_id: id,
                session_id,
                from_user_id,
                client_id,
                create_time: now_ms(),
            });
        id
    }

    pub fn object_attached_to(&self, object_id: i64, session_id: i64) -> bool {
        self.session_objects
            .rows
            .lock()
            .unwrap()
            .iter()
            .any(|so| so.object_id == object_id && so.session_id == session_id)
    }
}
