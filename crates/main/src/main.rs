//! 消息服务入口
//!
//! 装配配置、存储、缓存、事件总线与出站客户端后启动 HTTP 服务。

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use application::ports::{
    EventPublisher, IdGenerator, LockManager, MessageChecker, ObjectStorage, PresenceStore,
    UserApi,
};
use application::services::ImSettings;
use application::{MessageService, ObjectService, SessionService, UserService};
use config::{AppConfig, DEFAULT_CONFIG_PATH};
use domain::repositories::object_repository::{ObjectRepository, SessionObjectRepository};
use domain::repositories::session_message_repository::SessionMessageRepository;
use domain::repositories::session_repository::SessionRepository;
use domain::repositories::session_user_repository::SessionUserRepository;
use domain::repositories::user_message_repository::UserMessageRepository;
use domain::repositories::user_session_repository::UserSessionRepository;
use infrastructure::clients::{HttpMessageChecker, HttpObjectStorage, HttpUserApi};
use infrastructure::db::repositories::{
    MysqlObjectRepository, MysqlSessionMessageRepository, MysqlSessionObjectRepository,
    MysqlSessionRepository, MysqlSessionUserRepository, MysqlUserMessageRepository,
    MysqlUserSessionRepository,
};
use infrastructure::db::{bootstrap_tables, create_pool, ShardPlan};
use infrastructure::kafka::KafkaEventPublisher;
use infrastructure::redis::{create_connection, RedisLockManager, RedisPresenceStore};
use infrastructure::SnowflakeGenerator;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path =
        env::var("MSGAPI_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load(&config_path)?;
    tracing::info!(path = %config_path, name = %config.name, "config loaded");

    // 存储
    let pool = create_pool(&config.database).await?;
    bootstrap_tables(&pool, &config.sql_dir, config.database.shards).await?;
    let plan = ShardPlan::new(config.database.shards);
    let id_gen: Arc<dyn IdGenerator> = Arc::new(SnowflakeGenerator::new(config.server.node_id));

    let sessions: Arc<dyn SessionRepository> = Arc::new(MysqlSessionRepository::new(
        pool.clone(),
        plan,
        id_gen.clone(),
    ));
    let session_users: Arc<dyn SessionUserRepository> =
        Arc::new(MysqlSessionUserRepository::new(pool.clone(), plan));
    let user_sessions: Arc<dyn UserSessionRepository> =
        Arc::new(MysqlUserSessionRepository::new(pool.clone(), plan));
    let session_messages: Arc<dyn SessionMessageRepository> =
        Arc::new(MysqlSessionMessageRepository::new(pool.clone(), plan));
    let user_messages: Arc<dyn UserMessageRepository> =
        Arc::new(MysqlUserMessageRepository::new(pool.clone(), plan));
    let objects: Arc<dyn ObjectRepository> = Arc::new(MysqlObjectRepository::new(
        pool.clone(),
        plan,
        id_gen.clone(),
    ));
    let session_objects: Arc<dyn SessionObjectRepository> =
        Arc::new(MysqlSessionObjectRepository::new(pool, plan));

    // 缓存
    let redis_conn = create_connection(&config.redis).await?;
    let locker: Arc<dyn LockManager> = Arc::new(RedisLockManager::new(redis_conn.clone()));
    let presence: Arc<dyn PresenceStore> = Arc::new(RedisPresenceStore::new(
        redis_conn,
        config.name.clone(),
    ));

    // 事件总线, 每个 topic 一个生产者
    let push_publisher: Arc<dyn EventPublisher> = Arc::new(KafkaEventPublisher::new(
        &config.kafka,
        &config.kafka.push_topic,
    )?);
    let offline_push_publisher: Arc<dyn EventPublisher> = Arc::new(KafkaEventPublisher::new(
        &config.kafka,
        &config.kafka.offline_push_topic,
    )?);
    let save_publisher: Arc<dyn EventPublisher> = Arc::new(KafkaEventPublisher::new(
        &config.kafka,
        &config.kafka.save_topic,
    )?);

    // 出站客户端
    let user_api: Arc<dyn UserApi> = Arc::new(HttpUserApi::new(&config.user_api.endpoint)?);
    let checker: Option<Arc<dyn MessageChecker>> = match &config.msg_checker {
        Some(cfg) => Some(Arc::new(HttpMessageChecker::new(&cfg.endpoint)?)),
        None => None,
    };
    let storage: Option<Arc<dyn ObjectStorage>> = match &config.object_storage {
        Some(cfg) => Some(Arc::new(HttpObjectStorage::new(&cfg.endpoint)?)),
        None => None,
    };

    // 应用服务
    let settings = ImSettings {
        name: config.name.clone(),
        max_group_member: config.im.max_group_member,
        max_super_group_member: config.im.max_super_group_member,
    };
    let session_service = Arc::new(SessionService::new(
        sessions.clone(),
        session_users.clone(),
        user_sessions.clone(),
        user_messages.clone(),
        locker,
        settings,
    ));
    let message_service = Arc::new(MessageService::new(
        sessions,
        session_users.clone(),
        user_sessions,
        session_messages,
        user_messages,
        session_objects.clone(),
        presence.clone(),
        push_publisher.clone(),
        offline_push_publisher,
        save_publisher,
        checker,
        id_gen,
    ));
    let user_service = Arc::new(UserService::new(
        presence,
        user_api.clone(),
        push_publisher,
        config.im.online_timeout_secs,
    ));
    let object_service = storage.map(|storage| {
        Arc::new(ObjectService::new(
            session_users,
            objects,
            session_objects,
            storage,
        ))
    });

    let state = AppState {
        session_service,
        message_service,
        user_service,
        object_service,
        user_api,
        deploy_mode: config.deploy_mode,
        ip_white_list: Arc::new(config.ip_white_list.clone()),
    };

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "msg api server started");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
