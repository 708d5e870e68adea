//! Kafka 生产者
//!
//! 载荷放在消息头部, key 用于分区(同会话事件有序)。
//! 发送失败按 100ms * 2^n 指数退避重试。

use application::ports::EventPublisher;
use async_trait::async_trait;
use config::KafkaConfig;
use domain::errors::{DomainError, DomainResult};
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tokio::time::{sleep, Duration};
use tracing::{debug, error};

pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
    retry_count: u32,
    send_timeout: Duration,
}

impl KafkaEventPublisher {
    pub fn new(config: &KafkaConfig, topic: &str) -> DomainResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .set("acks", &config.acks)
            .set("retries", config.retry_count.to_string())
            .create()
            .map_err(|e| DomainError::bus(format!("create producer: {}", e)))?;
        Ok(Self {
            producer,
            topic: topic.to_string(),
            retry_count: config.retry_count,
            send_timeout: Duration::from_millis(config.send_timeout_ms as u64),
        })
    }

    async fn send_with_retry(
        &self,
        key: &str,
        headers: &[(String, String)],
        retry: u32,
    ) -> DomainResult<()> {
        let mut owned = OwnedHeaders::new_with_capacity(headers.len());
        for (name, value) in headers {
            owned = owned.insert(Header {
                key: name,
                value: Some(value.as_str()),
            });
        }
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .payload("")
            .headers(owned);
        match self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(topic = %self.topic, key, partition, offset, "event published");
                Ok(())
            }
            Err((e, _)) => {
                error!(topic = %self.topic, key, error = %e, retry, "publish failed");
                if retry < self.retry_count {
                    let delay = Duration::from_millis(100 * 2_u64.pow(retry));
                    sleep(delay).await;
                    return Box::pin(self.send_with_retry(key, headers, retry + 1)).await;
                }
                Err(DomainError::bus(format!(
                    "publish to {} failed: {}",
                    self.topic, e
                )))
            }
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, key: &str, headers: Vec<(String, String)>) -> DomainResult<()> {
        self.send_with_retry(key, &headers, 0).await
    }
}
