//! Save Worker - 백그라운드 저장
//!
//! 코디네이터는 게임 스레드에서 스냅샷을 만들어 `SaveSink::request_save`로 넘기기만 합니다.
//! 실제 파일 쓰기는 워커 태스크가 `spawn_blocking`으로 수행하며,
//! 밀린 요청이 여러 개면 가장 최신 스냅샷 하나만 씁니다.
//! 재시도 가능한 쓰기 실패는 짧게 기다린 뒤 다시 시도합니다.

use super::shopkeepers::{ShopkeeperStore, StoredShopkeepers};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 스냅샷 하나당 최대 쓰기 시도 횟수
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// 재시도 간격 (시도 횟수에 비례)
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

// ============================================================================
// SaveSink
// ============================================================================

/// 저장 요청을 받는 쪽
///
/// 호출자는 블로킹되지 않아야 합니다.
pub trait SaveSink: Send + Sync {
    fn request_save(&self, snapshot: StoredShopkeepers);

    /// 지금까지 보낸 요청이 모두 기록되면 완료되는 대기 핸들
    fn barrier(&self) -> SaveBarrier {
        SaveBarrier::ready()
    }
}

/// 아무것도 하지 않는 SaveSink
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSaveSink;

impl SaveSink for NoopSaveSink {
    fn request_save(&self, _snapshot: StoredShopkeepers) {}
}

// ============================================================================
// SaveBarrier
// ============================================================================

/// 저장 완료 대기 핸들
///
/// 게임 스레드는 `try_complete`로 확인만 하고, 비동기 쪽은 `wait`로 기다립니다.
#[derive(Debug)]
pub struct SaveBarrier(Option<oneshot::Receiver<Result<()>>>);

impl SaveBarrier {
    /// 기다릴 것이 없는 핸들
    pub fn ready() -> Self {
        Self(None)
    }

    pub async fn wait(self) -> Result<()> {
        match self.0 {
            Some(rx) => rx
                .await
                .map_err(|_| Error::Storage("Save worker stopped before flush".to_string()))?,
            None => Ok(()),
        }
    }

    /// 이미 끝났으면 결과를, 아직이면 핸들을 그대로 돌려줌
    pub fn try_complete(mut self) -> std::result::Result<Result<()>, SaveBarrier> {
        let Some(rx) = self.0.as_mut() else {
            return Ok(Ok(()));
        };
        match rx.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Closed) => Ok(Err(Error::Storage(
                "Save worker stopped before flush".to_string(),
            ))),
        }
    }
}

// ============================================================================
// SaveStatus
// ============================================================================

/// 워커 상태 (watch 채널로 공유)
#[derive(Debug, Clone, Default)]
pub struct SaveStatus {
    /// 받은 저장 요청 수
    pub requested: u64,
    /// 실제로 수행한 쓰기 수 (병합 후)
    pub completed: u64,
    pub failed: u64,
    /// 재시도한 쓰기 수
    pub retries: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// ============================================================================
// SaveWorker
// ============================================================================

enum SaveCommand {
    Save(StoredShopkeepers),
    Flush(oneshot::Sender<Result<()>>),
    Shutdown,
}

/// 백그라운드 저장 워커
pub struct SaveWorker {
    handle: SaveHandle,
    task: JoinHandle<()>,
}

impl SaveWorker {
    /// 워커 태스크 시작 (tokio 런타임 안에서 호출)
    pub fn spawn(store: ShopkeeperStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SaveStatus::default());

        let task = tokio::spawn(run_worker(store, rx, status_tx));
        info!("Save worker started");

        Self {
            handle: SaveHandle {
                tx,
                status: status_rx,
            },
            task,
        }
    }

    /// 코디네이터에 넘길 핸들
    pub fn handle(&self) -> SaveHandle {
        self.handle.clone()
    }

    /// 남은 요청을 모두 쓰고 종료
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.handle.tx.send(SaveCommand::Shutdown);
        self.task
            .await
            .map_err(|e| Error::Internal(format!("Save worker panicked: {}", e)))?;
        info!("Save worker stopped");
        Ok(())
    }
}

async fn run_worker(
    store: ShopkeeperStore,
    mut rx: mpsc::UnboundedReceiver<SaveCommand>,
    status: watch::Sender<SaveStatus>,
) {
    while let Some(command) = rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut shutdown = false;
        let mut requested = 0u64;

        let mut absorb = |command: SaveCommand| match command {
            SaveCommand::Save(snapshot) => {
                requested += 1;
                latest = Some(snapshot);
            }
            SaveCommand::Flush(waiter) => waiters.push(waiter),
            SaveCommand::Shutdown => shutdown = true,
        };

        absorb(command);
        while let Ok(command) = rx.try_recv() {
            absorb(command);
        }

        status.send_modify(|s| s.requested += requested);
        if requested > 1 {
            debug!(coalesced = requested, "Coalesced pending save requests");
        }

        let result = match latest {
            Some(snapshot) => write_snapshot(&store, snapshot, &status).await,
            None => Ok(()),
        };

        for waiter in waiters {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(Error::Storage(e.to_string())),
            };
            let _ = waiter.send(reply);
        }

        if shutdown {
            break;
        }
    }
}

async fn write_snapshot(
    store: &ShopkeeperStore,
    snapshot: StoredShopkeepers,
    status: &watch::Sender<SaveStatus>,
) -> Result<()> {
    let count = snapshot.len();
    let snapshot = Arc::new(snapshot);
    let mut attempt = 1;

    let result = loop {
        let store = store.clone();
        let data = Arc::clone(&snapshot);
        let result = tokio::task::spawn_blocking(move || store.save(&data))
            .await
            .map_err(|e| Error::Internal(format!("Save task failed: {}", e)))
            .and_then(|r| r);

        match result {
            Err(e) if e.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                warn!(attempt, error = %e, "Saving shopkeeper data failed, retrying");
                status.send_modify(|s| s.retries += 1);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => break other,
        }
    };

    match &result {
        Ok(()) => {
            debug!(count, attempt, "Shopkeeper data written");
            status.send_modify(|s| {
                s.completed += 1;
                s.last_saved_at = Some(Utc::now());
                s.last_error = None;
            });
        }
        Err(e) => {
            error!(error = %e, "Failed to save shopkeeper data");
            status.send_modify(|s| {
                s.failed += 1;
                s.last_error = Some(e.to_string());
            });
        }
    }
    result
}

// ============================================================================
// SaveHandle
// ============================================================================

/// 워커로 저장 요청을 보내는 핸들
#[derive(Clone)]
pub struct SaveHandle {
    tx: mpsc::UnboundedSender<SaveCommand>,
    status: watch::Receiver<SaveStatus>,
}

impl SaveHandle {
    /// 현재 상태
    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// 지금까지 보낸 요청이 모두 기록될 때까지 대기
    pub async fn flush(&self) -> Result<()> {
        self.barrier().wait().await
    }
}

impl SaveSink for SaveHandle {
    fn request_save(&self, snapshot: StoredShopkeepers) {
        if self.tx.send(SaveCommand::Save(snapshot)).is_err() {
            warn!("Save requested after worker stopped, dropping snapshot");
        }
    }

    fn barrier(&self) -> SaveBarrier {
        let (tx, rx) = oneshot::channel();
        // 워커가 멈췄으면 송신측이 버려져 대기 결과가 에러가 됨
        if self.tx.send(SaveCommand::Flush(tx)).is_err() {
            debug!("Save barrier requested after worker stopped");
        }
        SaveBarrier(Some(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BlockPos;
    use crate::storage::{JsonStore, ShopkeeperData};
    use uuid::Uuid;

    fn snapshot(n: usize) -> StoredShopkeepers {
        StoredShopkeepers::new(
            (0..n)
                .map(|i| {
                    ShopkeeperData::new(
                        Uuid::new_v4(),
                        "mob",
                        BlockPos::new("world", i as i32, 64, 0),
                    )
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_save_and_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());
        let handle = worker.handle();

        handle.request_save(snapshot(2));
        handle.flush().await.unwrap();

        assert_eq!(store.load().unwrap().len(), 2);
        let status = handle.status();
        assert!(status.completed >= 1);
        assert!(status.last_saved_at.is_some());

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());
        let handle = worker.handle();

        for n in 1..=5 {
            handle.request_save(snapshot(n));
        }
        handle.flush().await.unwrap();

        assert_eq!(store.load().unwrap().len(), 5);
        assert_eq!(handle.status().requested, 5);

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_writes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());

        worker.handle().request_save(snapshot(3));
        worker.shutdown().await.unwrap();

        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_flush_after_shutdown_fails() {
        let dir = tempfile::tempdir().unwrap();
        let worker = SaveWorker::spawn(ShopkeeperStore::new(JsonStore::new(dir.path())));
        let handle = worker.handle();
        worker.shutdown().await.unwrap();

        assert!(handle.flush().await.is_err());
        // 종료 후 요청은 무시
        handle.request_save(snapshot(1));
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        // 디렉토리 자리에 파일이 있어 쓰기가 항상 실패
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let worker = SaveWorker::spawn(ShopkeeperStore::new(JsonStore::new(&blocker)));
        let handle = worker.handle();

        handle.request_save(snapshot(1));
        assert!(handle.flush().await.is_err());

        let status = handle.status();
        assert_eq!(status.retries, u64::from(MAX_WRITE_ATTEMPTS - 1));
        assert_eq!(status.failed, 1);
        assert_eq!(status.completed, 0);
        assert!(status.last_error.is_some());

        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_barrier_waits_for_pending_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let worker = SaveWorker::spawn(store.clone());
        let handle = worker.handle();

        handle.request_save(snapshot(4));
        let sink: &dyn SaveSink = &handle;
        sink.barrier().wait().await.unwrap();
        assert_eq!(store.load().unwrap().len(), 4);

        worker.shutdown().await.unwrap();
        let stopped = sink.barrier();
        assert!(stopped.wait().await.is_err());
    }

    #[test]
    fn test_noop_barrier_is_ready() {
        let barrier = NoopSaveSink.barrier();
        assert!(matches!(barrier.try_complete(), Ok(Ok(()))));
    }
}
