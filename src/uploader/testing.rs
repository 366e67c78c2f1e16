// 测试用的传输层与等待实现

use crate::service::{ArtifactError, ChunkTransport, ContentRange, ITEM_PATH_PARAM};
use crate::uploader::RetryDelay;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// 一次分片请求的记录
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub item_path: String,
    pub range: ContentRange,
    pub len: usize,
}

/// 按 (itemPath, 起始偏移) 预设状态码序列的传输层
///
/// 未预设或序列耗尽时返回 201
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<(String, u64), VecDeque<u16>>>,
    holds: Mutex<HashMap<(String, u64), Arc<Notify>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, item_path: &str, start: u64, statuses: &[u16]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert((item_path.to_string(), start), statuses.iter().copied().collect());
        self
    }

    /// 该分片的请求会挂起，直到 Notify 被唤醒
    pub fn hold(self, item_path: &str, start: u64, gate: Arc<Notify>) -> Self {
        self.holds
            .lock()
            .unwrap()
            .insert((item_path.to_string(), start), gate);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, item_path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.item_path == item_path)
            .count()
    }
}

#[async_trait]
impl ChunkTransport for ScriptedTransport {
    async fn put_chunk(
        &self,
        resource_url: &Url,
        data: Vec<u8>,
        range: ContentRange,
    ) -> Result<StatusCode, ArtifactError> {
        let item_path = resource_url
            .query_pairs()
            .find(|(k, _)| k == ITEM_PATH_PARAM)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();

        assert_eq!(data.len() as u64, range.end - range.start + 1);

        self.calls.lock().unwrap().push(RecordedCall {
            item_path: item_path.clone(),
            range,
            len: data.len(),
        });

        let key = (item_path, range.start);
        let gate = self.holds.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let status = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front())
            .unwrap_or(201);

        Ok(StatusCode::from_u16(status).unwrap())
    }
}

/// 只记录、不等待的重试延迟
#[derive(Default)]
pub(crate) struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetryDelay for RecordingDelay {
    async fn wait(&self, delay: Duration) {
        self.waits.lock().unwrap().push(delay);
    }
}
