//! 基础设施层
//!
//! 仓储(MySQL 分表)、分布式锁与在线状态(Redis)、事件发布(Kafka)、
//! 出站 HTTP 客户端与雪花id的具体实现。

pub mod clients;
pub mod db;
pub mod kafka;
pub mod redis;
pub mod snowflake;

pub use snowflake::SnowflakeGenerator;
