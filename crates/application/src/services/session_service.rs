//! 会话服务
//!
//! 建会话、改会话、删会话与用户会话视图的全部用例。
//! 并发入口统一走分布式锁, 锁粒度见 `ports::keys`。

use std::sync::Arc;

use domain::errors::{DomainError, DomainResult};
use domain::repositories::session_repository::SessionRepository;
use domain::repositories::session_user_repository::SessionUserRepository;
use domain::repositories::user_message_repository::UserMessageRepository;
use domain::repositories::user_session_repository::{UserSessionRepository, UserSessionUpdate};
use domain::session::{SESSION_TYPE_GROUP, SESSION_TYPE_SINGLE, SESSION_TYPE_SUPER_GROUP};
use domain::session_user::{NewMember, MUTE_ALL_BIT, ROLE_MEMBER, ROLE_OWNER};
use domain::user_session::{MuteUpdate, UserSession};

use crate::dto::{
    CreateSessionReq, CreateSessionRes, QueryLatestUserSessionReq, UpdateSessionReq,
    UpdateUserSessionReq, UserSessionDto,
};
use crate::ports::{keys, LockManager};
use crate::services::{release_quietly, ImSettings, LOCK_TTL_MS, LOCK_WAIT_MS};

pub struct SessionService {
    pub(crate) sessions: Arc<dyn SessionRepository>,
    pub(crate) session_users: Arc<dyn SessionUserRepository>,
    pub(crate) user_sessions: Arc<dyn UserSessionRepository>,
    pub(crate) user_messages: Arc<dyn UserMessageRepository>,
    pub(crate) locker: Arc<dyn LockManager>,
    pub(crate) settings: ImSettings,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        session_users: Arc<dyn SessionUserRepository>,
        user_sessions: Arc<dyn UserSessionRepository>,
        user_messages: Arc<dyn UserMessageRepository>,
        locker: Arc<dyn LockManager>,
        settings: ImSettings,
    ) -> Self {
        Self {
            sessions,
            session_users,
            user_sessions,
            user_messages,
            locker,
            settings,
        }
    }

    /// 创建会话, 幂等: 同 (创建者, 实体) 命中已有会话时 is_new=false
    pub async fn create(&self, req: CreateSessionReq) -> DomainResult<CreateSessionRes> {
        match req.session_type {
            SESSION_TYPE_SINGLE => {
                // 单聊成员固定为双方
                if !req.members.is_empty() {
                    return Err(DomainError::ParamsError);
                }
            }
            SESSION_TYPE_GROUP | SESSION_TYPE_SUPER_GROUP => {}
            _ => return Err(DomainError::SessionType),
        }
        if req.entity_id <= 0 || req.user_id <= 0 {
            return Err(DomainError::ParamsError);
        }

        let key = keys::session_create(&self.settings.name, req.user_id, req.entity_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.create_locked(&req).await;
        release_quietly(lock).await;
        result
    }

    async fn create_locked(&self, req: &CreateSessionReq) -> DomainResult<CreateSessionRes> {
        let existing = self
            .user_sessions
            .find_by_entity_id(req.user_id, req.entity_id, req.session_type, true)
            .await?;
        match existing {
            Some(us) => self.reopen_existing(req, us).await,
            None => self.create_new(req).await,
        }
    }

    /// 命中已有记录: 单聊已删除走恢复, 群聊已删除不可恢复
    async fn reopen_existing(
        &self,
        req: &CreateSessionReq,
        existing: UserSession,
    ) -> DomainResult<CreateSessionRes> {
        if !existing.is_deleted() {
            return Ok(session_res(existing, false));
        }
        if req.session_type != SESSION_TYPE_SINGLE {
            return Err(DomainError::SessionAlreadyDeleted);
        }
        let session = self
            .sessions
            .find(existing.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        let member = NewMember::new(existing.user_id, existing.entity_id, ROLE_OWNER);
        let mut restored = self.session_users.add_users(&session, &[member], 2).await?;
        let us = restored
            .pop()
            .ok_or_else(|| DomainError::internal("restore single session returned no row"))?;
        Ok(session_res(us, false))
    }

    async fn create_new(&self, req: &CreateSessionReq) -> DomainResult<CreateSessionRes> {
        let (members, max_count) = match req.session_type {
            SESSION_TYPE_SINGLE => {
                // 对端视角的 entity 是创建者本人
                let members = vec![
                    NewMember::new(req.user_id, req.entity_id, ROLE_OWNER),
                    NewMember::new(req.entity_id, req.user_id, ROLE_OWNER),
                ];
                (members, 2)
            }
            SESSION_TYPE_GROUP => (self.group_members(req), self.settings.max_group_member),
            _ => (self.group_members(req), self.settings.max_super_group_member),
        };
        let session = self
            .sessions
            .create_empty(
                req.session_type,
                &req.name,
                &req.remark,
                req.function_flag,
                req.ext_data.as_deref(),
            )
            .await?;
        let created = self
            .session_users
            .add_users(&session, &members, max_count)
            .await?;
        let mine = created
            .into_iter()
            .find(|us| us.user_id == req.user_id)
            .ok_or_else(|| DomainError::internal("creator user_session missing after insert"))?;
        Ok(session_res(mine, true))
    }

    fn group_members(&self, req: &CreateSessionReq) -> Vec<NewMember> {
        let mut members = vec![NewMember::new(req.user_id, req.entity_id, ROLE_OWNER)];
        for (i, uid) in req.members.iter().enumerate() {
            if *uid == req.user_id {
                continue;
            }
            members.push(NewMember {
                user_id: *uid,
                entity_id: req.entity_id,
                role: ROLE_MEMBER,
                note_name: req.member_names.get(i).cloned().unwrap_or_default(),
                note_avatar: req.member_avatars.get(i).cloned().unwrap_or_default(),
            });
        }
        members
    }

    /// 更新会话基础字段并同步到全部成员镜像
    pub async fn update(&self, req: UpdateSessionReq) -> DomainResult<()> {
        if let Some(mute) = req.mute {
            if mute != 0 && mute != 1 {
                return Err(DomainError::ParamsError);
            }
        }
        let key = keys::session_update(&self.settings.name, req.session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.update_locked(&req).await;
        release_quietly(lock).await;
        result
    }

    async fn update_locked(&self, req: &UpdateSessionReq) -> DomainResult<()> {
        self.sessions
            .find(req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        self.sessions
            .update(
                req.session_id,
                req.name.as_deref(),
                req.remark.as_deref(),
                req.mute,
                req.function_flag,
                req.ext_data.as_deref(),
            )
            .await?;

        let members = self.session_users.find_all(req.session_id).await?;
        let user_ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
        if user_ids.is_empty() {
            return Ok(());
        }
        let mute_update = req.mute.map(|m| {
            if m == 0 {
                MuteUpdate::Clear(MUTE_ALL_BIT)
            } else {
                MuteUpdate::Set(MUTE_ALL_BIT)
            }
        });
        let update = UserSessionUpdate {
            name: req.name.clone(),
            remark: req.remark.clone(),
            mute: mute_update,
            function_flag: req.function_flag,
            ext_data: req.ext_data.clone(),
            ..Default::default()
        };
        self.user_sessions
            .update(&user_ids, req.session_id, &update)
            .await?;
        if mute_update.is_some() {
            self.session_users
                .update_users(req.session_id, &user_ids, None, None, None, None, mute_update)
                .await?;
        }
        Ok(())
    }

    /// 修改会话类型, 同步三处记录
    pub async fn update_type(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        if !matches!(
            session_type,
            SESSION_TYPE_SINGLE | SESSION_TYPE_GROUP | SESSION_TYPE_SUPER_GROUP
        ) {
            return Err(DomainError::ParamsError);
        }
        let key = keys::session_update(&self.settings.name, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.update_type_locked(session_id, session_type).await;
        release_quietly(lock).await;
        result
    }

    async fn update_type_locked(&self, session_id: i64, session_type: i32) -> DomainResult<()> {
        self.sessions
            .find(session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        self.sessions.update_type(session_id, session_type).await?;
        let members = self.session_users.find_all(session_id).await?;
        let user_ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
        if !user_ids.is_empty() {
            self.user_sessions
                .update_type(&user_ids, session_id, session_type)
                .await?;
        }
        self.session_users
            .update_type(session_id, session_type)
            .await
    }

    /// 删除会话(级联软删除), 单聊不允许走这条路径
    pub async fn delete(&self, session_id: i64) -> DomainResult<()> {
        let key = keys::session_update(&self.settings.name, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.delete_locked(session_id).await;
        release_quietly(lock).await;
        result
    }

    async fn delete_locked(&self, session_id: i64) -> DomainResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if session.session_type == SESSION_TYPE_SINGLE {
            return Err(DomainError::BadRequest);
        }
        self.session_users.delete_session_cascade(session_id).await
    }

    /// 用户退出会话(软删除成员与镜像, 单聊重开可恢复)
    pub async fn delete_user_session(&self, user_id: i64, session_id: i64) -> DomainResult<()> {
        let key = keys::user_session_update(&self.settings.name, user_id, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.delete_user_session_locked(user_id, session_id).await;
        release_quietly(lock).await;
        result
    }

    async fn delete_user_session_locked(&self, user_id: i64, session_id: i64) -> DomainResult<()> {
        let us = self
            .user_sessions
            .get(user_id, session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if us.is_deleted() {
            return Ok(());
        }
        self.session_users.del_users(session_id, &[user_id]).await
    }

    /// 更新用户侧会话设置(置顶/免打扰/备注等)
    pub async fn update_user_session(&self, req: UpdateUserSessionReq) -> DomainResult<()> {
        let key = keys::user_session_update(&self.settings.name, req.user_id, req.session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.update_user_session_locked(&req).await;
        release_quietly(lock).await;
        result
    }

    async fn update_user_session_locked(&self, req: &UpdateUserSessionReq) -> DomainResult<()> {
        let us = self
            .user_sessions
            .get(req.user_id, req.session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if us.is_deleted() {
            return Err(DomainError::SessionInvalid);
        }
        let update = UserSessionUpdate {
            note_name: req.note_name.clone(),
            top: req.top,
            status: req.status,
            parent_id: req.parent_id,
            ..Default::default()
        };
        if !update.is_empty() {
            self.user_sessions
                .update(&[req.user_id], req.session_id, &update)
                .await?;
        }
        if req.status.is_some() || req.note_name.is_some() || req.note_avatar.is_some() {
            self.session_users
                .update_users(
                    req.session_id,
                    &[req.user_id],
                    None,
                    req.status,
                    req.note_name.as_deref(),
                    req.note_avatar.as_deref(),
                    None,
                )
                .await?;
        }
        Ok(())
    }

    /// 用户增量拉取会话列表
    pub async fn query_latest_user_sessions(
        &self,
        req: QueryLatestUserSessionReq,
    ) -> DomainResult<Vec<UserSessionDto>> {
        if req.count <= 0 {
            return Err(DomainError::ParamsError);
        }
        let list = self
            .user_sessions
            .query_latest(req.user_id, req.m_time, req.offset, req.count, &req.types)
            .await?;
        Ok(list.into_iter().map(UserSessionDto::from).collect())
    }

    pub async fn get_user_session(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> DomainResult<UserSessionDto> {
        let us = self
            .user_sessions
            .get(user_id, session_id)
            .await?
            .filter(|us| !us.is_deleted())
            .ok_or(DomainError::SessionInvalid)?;
        Ok(us.into())
    }

    /// 按业务实体反查用户会话
    pub async fn get_user_session_by_entity_id(
        &self,
        user_id: i64,
        entity_id: i64,
        session_type: i32,
    ) -> DomainResult<UserSessionDto> {
        let us = self
            .user_sessions
            .find_by_entity_id(user_id, entity_id, session_type, false)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        Ok(us.into())
    }
}

fn session_res(us: UserSession, is_new: bool) -> CreateSessionRes {
    CreateSessionRes {
        session_id: us.session_id,
        parent_id: us.parent_id,
        session_type: us.session_type,
        entity_id: us.entity_id,
        name: us.name,
        remark: us.remark,
        function_flag: us.function_flag,
        mute: us.mute,
        role: us.role,
        top: us.top,
        status: us.status,
        note_name: us.note_name,
        note_avatar: us.note_avatar,
        ext_data: us.ext_data,
        create_time: us.create_time,
        update_time: us.update_time,
        is_new,
    }
}
