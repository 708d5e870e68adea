use std::sync::Arc;

use application::ports::UserApi;
use application::{MessageService, ObjectService, SessionService, UserService};
use config::DeployMode;

#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub message_service: Arc<MessageService>,
    pub user_service: Arc<UserService>,
    /// 未配置对象存储时为 None, 对象接口返回 400
    pub object_service: Option<Arc<ObjectService>>,
    pub user_api: Arc<dyn UserApi>,
    pub deploy_mode: DeployMode,
    pub ip_white_list: Arc<Vec<String>>,
}
