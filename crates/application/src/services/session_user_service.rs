//! 会话成员操作
//!
//! 加人/踢人/改角色与权限判定, 挂在 `SessionService` 上。
//! 写路径持会话级锁, session_user 与 user_session 的配对写入
//! 由仓储层事务保证。

use domain::errors::{DomainError, DomainResult};
use domain::session::SESSION_TYPE_SINGLE;
use domain::session_user::{role_in_range, NewMember, MUTE_USER_BIT, ROLE_ADMIN};
use domain::user_session::MuteUpdate;
use domain::repositories::user_session_repository::UserSessionUpdate;

use crate::dto::{
    QuerySessionUsersReq, SessionAddUserReq, SessionDelUserReq, SessionUserCountRes,
    SessionUserDto, SessionUserUpdateReq,
};
use crate::ports::keys;
use crate::services::session_service::SessionService;
use crate::services::{release_quietly, LOCK_TTL_MS, LOCK_WAIT_MS};

impl SessionService {
    /// 增量拉取成员列表
    pub async fn query_session_users(
        &self,
        session_id: i64,
        req: QuerySessionUsersReq,
    ) -> DomainResult<Vec<SessionUserDto>> {
        if req.count <= 0 {
            return Err(DomainError::ParamsError);
        }
        if let Some(role) = req.role {
            if !role_in_range(role) {
                return Err(DomainError::ParamsError);
            }
        }
        let list = self
            .session_users
            .find_by_m_time(session_id, req.m_time, req.role, req.count)
            .await?;
        Ok(list.into_iter().map(SessionUserDto::from).collect())
    }

    pub async fn query_session_user(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> DomainResult<SessionUserDto> {
        let su = self
            .session_users
            .find_one(session_id, user_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        Ok(su.into())
    }

    pub async fn query_session_user_count(
        &self,
        session_id: i64,
    ) -> DomainResult<SessionUserCountRes> {
        let count = self.session_users.count(session_id).await?;
        Ok(SessionUserCountRes { count })
    }

    /// 批量加人, 容量校验与配对镜像由仓储层在同一事务内完成
    pub async fn add_session_user(
        &self,
        session_id: i64,
        req: SessionAddUserReq,
    ) -> DomainResult<()> {
        if req.user_ids.is_empty() || !role_in_range(req.role) {
            return Err(DomainError::ParamsError);
        }
        let key = keys::session_update(&self.settings.name, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.add_session_user_locked(session_id, &req).await;
        release_quietly(lock).await;
        result
    }

    async fn add_session_user_locked(
        &self,
        session_id: i64,
        req: &SessionAddUserReq,
    ) -> DomainResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if session.session_type == SESSION_TYPE_SINGLE {
            return Err(DomainError::SessionType);
        }
        let max_count = if session.is_read_diffusion() {
            self.settings.max_super_group_member
        } else {
            self.settings.max_group_member
        };
        let members: Vec<NewMember> = req
            .user_ids
            .iter()
            .enumerate()
            .map(|(i, uid)| NewMember {
                user_id: *uid,
                entity_id: req.entity_id,
                role: req.role,
                note_name: req.note_names.get(i).cloned().unwrap_or_default(),
                note_avatar: req.note_avatars.get(i).cloned().unwrap_or_default(),
            })
            .collect();
        self.session_users
            .add_users(&session, &members, max_count)
            .await?;
        Ok(())
    }

    /// 批量踢人; delete_msg 为真时连同清理被踢用户的会话消息
    pub async fn del_session_user(
        &self,
        session_id: i64,
        delete_msg: bool,
        req: SessionDelUserReq,
    ) -> DomainResult<()> {
        if req.user_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        let key = keys::session_update(&self.settings.name, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self
            .del_session_user_locked(session_id, delete_msg, &req)
            .await;
        release_quietly(lock).await;
        result
    }

    async fn del_session_user_locked(
        &self,
        session_id: i64,
        delete_msg: bool,
        req: &SessionDelUserReq,
    ) -> DomainResult<()> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        if session.session_type == SESSION_TYPE_SINGLE {
            return Err(DomainError::SessionType);
        }
        if delete_msg {
            for uid in &req.user_ids {
                self.user_messages.delete_by_session(*uid, session_id).await?;
            }
        }
        self.session_users.del_users(session_id, &req.user_ids).await
    }

    /// 批量修改成员角色/单人禁言, 同步 user_session 镜像
    pub async fn update_session_user(
        &self,
        session_id: i64,
        req: SessionUserUpdateReq,
    ) -> DomainResult<()> {
        if req.user_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        if let Some(role) = req.role {
            if !role_in_range(role) {
                return Err(DomainError::ParamsError);
            }
        }
        if let Some(mute) = req.mute {
            if mute != 0 && mute != 1 {
                return Err(DomainError::ParamsError);
            }
        }
        let key = keys::session_update(&self.settings.name, session_id);
        let lock = self.locker.acquire(&key, LOCK_WAIT_MS, LOCK_TTL_MS).await?;
        let result = self.update_session_user_locked(session_id, &req).await;
        release_quietly(lock).await;
        result
    }

    async fn update_session_user_locked(
        &self,
        session_id: i64,
        req: &SessionUserUpdateReq,
    ) -> DomainResult<()> {
        self.sessions
            .find(session_id)
            .await?
            .ok_or(DomainError::SessionInvalid)?;
        let mute_update = req.mute.map(|m| {
            if m == 0 {
                MuteUpdate::Clear(MUTE_USER_BIT)
            } else {
                MuteUpdate::Set(MUTE_USER_BIT)
            }
        });
        self.session_users
            .update_users(
                session_id,
                &req.user_ids,
                req.role,
                None,
                None,
                None,
                mute_update,
            )
            .await?;
        let update = UserSessionUpdate {
            role: req.role,
            mute: mute_update,
            ..Default::default()
        };
        if !update.is_empty() {
            self.user_sessions
                .update(&req.user_ids, session_id, &update)
                .await?;
        }
        Ok(())
    }

    /// 读权限: 未删除的成员即可读
    pub async fn can_read(&self, user_id: i64, session_id: i64) -> DomainResult<bool> {
        Ok(self
            .session_users
            .find_one(session_id, user_id)
            .await?
            .is_some())
    }

    /// 写权限: 角色高于管理员, 且高于每个目标成员的角色
    pub async fn can_mutate(
        &self,
        user_id: i64,
        session_id: i64,
        target_user_ids: &[i64],
    ) -> DomainResult<bool> {
        let me = match self.session_users.find_one(session_id, user_id).await? {
            Some(su) => su,
            None => return Ok(false),
        };
        if me.role <= ROLE_ADMIN {
            return Ok(false);
        }
        if target_user_ids.is_empty() {
            return Ok(true);
        }
        let targets = self
            .session_users
            .find_many(session_id, target_user_ids)
            .await?;
        Ok(targets.iter().all(|t| t.role < me.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::UpdateSessionReq;
    use crate::services::test_support::*;
    use domain::repositories::session_user_repository::SessionUserRepository;
    use domain::repositories::user_message_repository::UserMessageRepository;
    use domain::session_user::{ROLE_MEMBER, ROLE_SUPER_ADMIN};

    fn add_req(entity_id: i64, user_ids: Vec<i64>, role: i32) -> SessionAddUserReq {
        SessionAddUserReq {
            user_id: 0,
            entity_id,
            user_ids,
            note_names: vec![],
            note_avatars: vec![],
            role,
        }
    }

    #[tokio::test]
    async fn test_add_user_rejects_single_session() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service.create(single_create_req(7, 9)).await.unwrap();
        assert_eq!(
            service
                .add_session_user(res.session_id, add_req(55, vec![10], ROLE_MEMBER))
                .await
                .unwrap_err(),
            DomainError::SessionType
        );
    }

    #[tokio::test]
    async fn test_add_user_over_capacity() {
        let env = TestEnv::new();
        let service = env.session_service();
        // max_group_member=4
        let res = service
            .create(group_create_req(7, 55, vec![8, 9]))
            .await
            .unwrap();
        service
            .add_session_user(res.session_id, add_req(55, vec![10], ROLE_MEMBER))
            .await
            .unwrap();
        assert_eq!(
            service
                .add_session_user(res.session_id, add_req(55, vec![11], ROLE_MEMBER))
                .await
                .unwrap_err(),
            DomainError::MemberCount
        );
    }

    #[tokio::test]
    async fn test_user_count_excludes_removed_members() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service
            .create(group_create_req(7, 55, vec![8, 9]))
            .await
            .unwrap();
        assert_eq!(
            service
                .query_session_user_count(res.session_id)
                .await
                .unwrap()
                .count,
            3
        );

        service
            .del_session_user(
                res.session_id,
                false,
                SessionDelUserReq {
                    user_id: 0,
                    user_ids: vec![9],
                },
            )
            .await
            .unwrap();
        assert_eq!(
            service
                .query_session_user_count(res.session_id)
                .await
                .unwrap()
                .count,
            2
        );
    }

    #[tokio::test]
    async fn test_del_user_with_message_purge() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();
        env.seed_user_message(8, res.session_id, 1001);

        let req = SessionDelUserReq {
            user_id: 0,
            user_ids: vec![8],
        };
        service
            .del_session_user(res.session_id, true, req)
            .await
            .unwrap();

        assert!(env
            .session_users
            .find_one(res.session_id, 8)
            .await
            .unwrap()
            .is_none());
        assert!(env
            .user_messages
            .find(8, res.session_id, 1001)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_session_user_mute_preserves_all_muted_bit() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();

        // 先全员禁言, 再单独禁言后解除, 全员位不受影响
        service
            .update(UpdateSessionReq {
                user_id: 7,
                session_id: res.session_id,
                name: None,
                remark: None,
                mute: Some(1),
                function_flag: None,
                ext_data: None,
            })
            .await
            .unwrap();
        let req = SessionUserUpdateReq {
            user_id: 0,
            user_ids: vec![8],
            role: None,
            mute: Some(1),
        };
        service
            .update_session_user(res.session_id, req)
            .await
            .unwrap();
        let req = SessionUserUpdateReq {
            user_id: 0,
            user_ids: vec![8],
            role: None,
            mute: Some(0),
        };
        service
            .update_session_user(res.session_id, req)
            .await
            .unwrap();

        let su = env
            .session_users
            .find_one(res.session_id, 8)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(su.mute & MUTE_USER_BIT, 0);
        assert_ne!(su.mute & domain::session_user::MUTE_ALL_BIT, 0);
    }

    #[tokio::test]
    async fn test_can_mutate_requires_higher_role() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service
            .create(group_create_req(7, 55, vec![8, 9]))
            .await
            .unwrap();
        service
            .update_session_user(
                res.session_id,
                SessionUserUpdateReq {
                    user_id: 0,
                    user_ids: vec![8],
                    role: Some(ROLE_SUPER_ADMIN),
                    mute: None,
                },
            )
            .await
            .unwrap();

        // owner 可以动 super admin, 反之不行
        assert!(service.can_mutate(7, res.session_id, &[8]).await.unwrap());
        assert!(!service.can_mutate(8, res.session_id, &[7]).await.unwrap());
        // 普通成员连发起变更的资格都没有
        assert!(!service.can_mutate(9, res.session_id, &[8]).await.unwrap());
        // 非成员
        assert!(!service.can_mutate(42, res.session_id, &[8]).await.unwrap());
    }

    #[tokio::test]
    async fn test_can_read_only_for_members() {
        let env = TestEnv::new();
        let service = env.session_service();
        let res = service
            .create(group_create_req(7, 55, vec![8]))
            .await
            .unwrap();
        assert!(service.can_read(8, res.session_id).await.unwrap());
        assert!(!service.can_read(42, res.session_id).await.unwrap());

        service
            .del_session_user(
                res.session_id,
                false,
                SessionDelUserReq {
                    user_id: 0,
                    user_ids: vec![8],
                },
            )
            .await
            .unwrap();
        assert!(!service.can_read(8, res.session_id).await.unwrap());
    }
}
