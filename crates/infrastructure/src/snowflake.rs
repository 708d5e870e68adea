//! 雪花id生成器
//!
//! 41 位毫秒时间戳 + 10 位节点号 + 12 位序列号。
//! 时钟回拨时在上一时间戳上自旋等待。

use std::sync::Mutex;

use application::ports::IdGenerator;
use domain::now_ms;

/// 纪元起点: 2020-01-01T00:00:00Z
const EPOCH_MS: i64 = 1_577_836_800_000;
const NODE_BITS: u8 = 10;
const SEQ_BITS: u8 = 12;
const MAX_NODE: i64 = (1 << NODE_BITS) - 1;
const SEQ_MASK: i64 = (1 << SEQ_BITS) - 1;

struct State {
    last_ts: i64,
    seq: i64,
}

pub struct SnowflakeGenerator {
    node_id: i64,
    state: Mutex<State>,
}

impl SnowflakeGenerator {
    pub fn new(node_id: i64) -> Self {
        let node_id = node_id & MAX_NODE;
        Self {
            node_id,
            state: Mutex::new(State { last_ts: 0, seq: 0 }),
        }
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn next_id(&self) -> i64 {
        let mut state = self.state.lock().unwrap();
        let mut ts = now_ms();
        if ts < state.last_ts {
            // 回拨: 停留在已发出的时间戳上继续递增序列
            ts = state.last_ts;
        }
        if ts == state.last_ts {
            state.seq = (state.seq + 1) & SEQ_MASK;
            if state.seq == 0 {
                // 同一毫秒序列耗尽
                while ts <= state.last_ts {
                    ts = now_ms();
                    if ts <= state.last_ts {
                        ts = state.last_ts + 1;
                    }
                }
            }
        } else {
            state.seq = 0;
        }
        state.last_ts = ts;
        ((ts - EPOCH_MS) << (NODE_BITS + SEQ_BITS)) | (self.node_id << SEQ_BITS) | state.seq
    }
}
