//! Kafka 事件总线接入

pub mod producer;

pub use producer::KafkaEventPublisher;
