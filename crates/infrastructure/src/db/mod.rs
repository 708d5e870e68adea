//! MySQL 接入与分表方案
//!
//! 逻辑表按固定分片数拆成 `<table>_<n>` 物理表, n = key % shards。
//! 启动时用 sql 目录下的 DDL 模板建表, 模板中 `%s` 为分片号占位。

pub mod repositories;

use std::collections::HashMap;
use std::path::Path;

use config::DatabaseConfig;
use domain::errors::{DomainError, DomainResult};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tracing::info;

pub type DbPool = MySqlPool;

pub async fn create_pool(config: &DatabaseConfig) -> DomainResult<DbPool> {
    MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::database(e.to_string()))
}

/// 分表方案: 由分片数把逻辑表名映射到物理表名
#[derive(Debug, Clone, Copy)]
pub struct ShardPlan {
    shards: i64,
}

impl ShardPlan {
    pub fn new(shards: i64) -> Self {
        assert!(shards > 0, "shards must be positive");
        Self { shards }
    }

    pub fn shards(&self) -> i64 {
        self.shards
    }

    /// key 所在的物理表名
    pub fn table(&self, base: &str, key: i64) -> String {
        format!("{}_{}", base, key.rem_euclid(self.shards))
    }

    /// 按物理表分组一批 key, 跨分片批量写时逐组执行
    pub fn group(&self, base: &str, keys: &[i64]) -> HashMap<String, Vec<i64>> {
        let mut groups: HashMap<String, Vec<i64>> = HashMap::new();
        for key in keys {
            groups.entry(self.table(base, *key)).or_default().push(*key);
        }
        groups
    }
}

/// `IN (?, ?, ...)` 占位串
pub(crate) fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn db_err(e: sqlx::Error) -> DomainError {
    DomainError::database(e.to_string())
}

/// 按 DDL 模板建全部分片表, 幂等(模板使用 IF NOT EXISTS)
pub async fn bootstrap_tables(pool: &DbPool, sql_dir: &str, shards: i64) -> DomainResult<()> {
    let dir = Path::new(sql_dir);
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| DomainError::internal(format!("read sql dir {}: {}", sql_dir, e)))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == "sql").unwrap_or(false))
        .collect();
    entries.sort();

    for path in entries {
        let template = std::fs::read_to_string(&path)
            .map_err(|e| DomainError::internal(format!("read {}: {}", path.display(), e)))?;
        for shard in 0..shards {
            let ddl = template.replace("%s", &shard.to_string());
            for statement in ddl.split(';') {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                sqlx::query(statement).execute(pool).await.map_err(db_err)?;
            }
        }
        info!(file = %path.display(), shards, "sharded tables ready");
    }
    Ok(())
}
