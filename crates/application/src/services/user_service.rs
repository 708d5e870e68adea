//! 在线状态服务
//!
//! 心跳续期在线记录并按采样窗口回调用户服务;
//! 下线只在 conn_id 匹配时删除记录, 防止新连接被旧连接的下线冲掉。

use std::collections::HashSet;
use std::sync::Arc;

use domain::errors::{DomainError, DomainResult};
use domain::presence::{Platform, UserOnlineStatus};
use tracing::warn;

use crate::dto::{
    KickUserReq, OnlineStatusNotify, PostUserOnlineReq, QueryUsersOnlineStatusReq,
    QueryUsersOnlineStatusRes,
};
use crate::events;
use crate::ports::{EventPublisher, PresenceStore, UserApi};

pub struct UserService {
    presence: Arc<dyn PresenceStore>,
    user_api: Arc<dyn UserApi>,
    push_publisher: Arc<dyn EventPublisher>,
    online_timeout_secs: u64,
}

impl UserService {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        user_api: Arc<dyn UserApi>,
        push_publisher: Arc<dyn EventPublisher>,
        online_timeout_secs: u64,
    ) -> Self {
        Self {
            presence,
            user_api,
            push_publisher,
            online_timeout_secs,
        }
    }

    /// 网关心跳/断连上报
    pub async fn update_online_status(&self, req: PostUserOnlineReq) -> DomainResult<()> {
        if req.user_id <= 0 {
            return Err(DomainError::ParamsError);
        }
        let platform = Platform::parse(&req.platform).ok_or(DomainError::ParamsError)?;
        let existing = self.presence.get(req.user_id, platform).await?;
        if req.online {
            // login_time 取首次上线时间, 心跳续期不覆盖
            let login_time = existing
                .as_ref()
                .map(|s| s.timestamp_ms)
                .unwrap_or(req.timestamp_ms);
            let status = UserOnlineStatus {
                user_id: req.user_id,
                platform,
                conn_id: req.conn_id,
                node_id: req.node_id,
                timestamp_ms: login_time,
            };
            self.presence.set(&status, self.online_timeout_secs).await?;
            if existing.is_none() || sampled_notify(req.timestamp_ms, login_time) {
                self.notify(&req, platform, true).await;
            }
        } else {
            if let Some(old) = existing {
                if old.conn_id == req.conn_id {
                    self.presence.delete(req.user_id, platform).await?;
                }
            }
            self.notify(&req, platform, false).await;
        }
        Ok(())
    }

    /// 通知失败不阻断心跳
    async fn notify(&self, req: &PostUserOnlineReq, platform: Platform, is_login: bool) {
        let notify = OnlineStatusNotify {
            user_id: req.user_id,
            is_login,
            conn_id: req.conn_id,
            platform,
            timestamp_ms: req.timestamp_ms,
        };
        if let Err(err) = self.user_api.post_online_status(&notify).await {
            warn!(error = %err, user_id = req.user_id, "post online status failed");
        }
    }

    pub async fn query_online_status(
        &self,
        req: QueryUsersOnlineStatusReq,
    ) -> DomainResult<QueryUsersOnlineStatusRes> {
        if req.user_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        let data = self.presence.statuses(&req.user_ids).await?;
        Ok(QueryUsersOnlineStatusRes { data })
    }

    /// 管理侧踢人下线, 经推送通道发踢出信令
    pub async fn kick_users(&self, req: KickUserReq) -> DomainResult<()> {
        if req.user_ids.is_empty() {
            return Err(DomainError::ParamsError);
        }
        let receivers = serde_json::to_string(&req.user_ids)
            .map_err(|e| DomainError::internal(e.to_string()))?;
        let headers = vec![
            (
                events::PUSH_HEADER_TYPE.to_string(),
                events::SIGNAL_KICK_OFF_USER.to_string(),
            ),
            (
                events::PUSH_HEADER_BODY.to_string(),
                events::KICK_OFF_BODY.to_string(),
            ),
            (events::PUSH_HEADER_RECEIVERS.to_string(), receivers),
        ];
        self.push_publisher
            .publish(events::PUSH_PARTITION_KEY, headers)
            .await
            .map_err(|_| DomainError::MessageDeliveryFailed)
    }

    /// 任一平台在线的用户集合
    pub async fn online_uids(&self, user_ids: &[i64]) -> DomainResult<HashSet<i64>> {
        self.presence.online_uids(user_ids).await
    }
}

/// 在线时长整 10 小时窗口的第 5 小时采样上报一次
fn sampled_notify(now_ms: i64, login_time_ms: i64) -> bool {
    ((now_ms - login_time_ms) / (1000 * 3600)) % 10 == 5
}
