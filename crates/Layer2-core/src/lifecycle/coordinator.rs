//! Lifecycle Coordinator - 상점 주인 상태 머신
//!
//! 세 인덱스와 로드된 리전 집합을 단독으로 소유하며,
//! 모든 변경은 게임 스레드에서 `&mut self`로만 일어납니다.

use super::collaborators::{NoopUiSessions, UiSessions};
use super::error::{ActivationError, RegistryError};
use super::passes::{LivenessReport, VerifierReport};
use super::scheduler::{DueWork, ScheduledPass, TickScheduler};
use super::spawn_queue::{SpawnQueue, SpawnQueueReport};
use crate::registry::{
    ActivationTracker, Deactivation, IdentityIndex, ShopkeeperRecord, SpatialIndex, SpawnState,
};
use crate::shop_object::ShopObject;
use serde::Serialize;
use shopkeepers_foundation::{
    AddCause, BlockPos, EventBus, NoopSaveSink, ObjectId, PermanentId, RegionKey, RemoveCause,
    SaveSink, SessionId, ShopkeeperEvent, ShopkeepersConfig, StoredShopkeepers, MAX_REGION_SHIFT,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

// ============================================================================
// Outcomes / Reports
// ============================================================================

/// `activate` 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// 새로 활성화됨
    Activated(ObjectId),
    AlreadyActive,
    /// 리전 종속 레코드인데 리전이 로드되지 않음
    RegionNotLoaded,
    /// 월드 저장 중이라 저장이 끝난 뒤 스폰
    AwaitingWorldSave,
}

/// 리전 단위 활성화 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionActivation {
    pub activated: usize,
    pub failed: usize,
    /// 스폰 큐에 넣은 수
    pub queued: usize,
}

impl RegionActivation {
    fn merge(&mut self, other: RegionActivation) {
        self.activated += other.activated;
        self.failed += other.failed;
        self.queued += other.queued;
    }
}

/// 한 틱 동안 실행된 작업
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// 지연 활성화 결과
    pub region_activations: RegionActivation,
    pub world_save_respawns: RegionActivation,
    pub spawn_queue: SpawnQueueReport,
    pub liveness: Option<LivenessReport>,
    pub verifier: Option<VerifierReport>,
}

/// 코디네이터 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub tick: u64,
    pub records: usize,
    pub active: usize,
    pub gated: usize,
    pub spawn_failed: usize,
    pub awaiting_world_save: usize,
    pub queued_spawns: usize,
    pub worlds: usize,
    pub regions: usize,
    pub loaded_regions: usize,
    pub pending_activations: usize,
}

/// 재연결 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Rebind {
    Rebound,
    /// 오브젝트가 사라져 연결만 제거
    Lost,
    /// 새 ID가 다른 레코드와 충돌
    Collided,
}

// ============================================================================
// LifecycleCoordinator
// ============================================================================

/// 상점 주인 라이프사이클 코디네이터
pub struct LifecycleCoordinator {
    pub(super) region_shift: u8,
    pub(super) activation_delay: u64,
    pub(super) identity: IdentityIndex,
    pub(super) spatial: SpatialIndex,
    pub(super) activation: ActivationTracker,
    pub(super) loaded_regions: HashSet<RegionKey>,
    pub(super) scheduler: TickScheduler,
    pub(super) spawn_queue: SpawnQueue,
    ui: Arc<dyn UiSessions>,
    saves: Arc<dyn SaveSink>,
    events: Arc<EventBus>,
}

impl LifecycleCoordinator {
    /// 기본 협력자로 생성
    pub fn new(config: &ShopkeepersConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: &ShopkeepersConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// 레코드 등록
    ///
    /// 리전 종속이 아니거나 리전이 로드되어 있으면 바로 활성화를 시도합니다.
    /// 활성화 실패는 등록 실패가 아닙니다.
    pub fn register(
        &mut self,
        permanent_id: PermanentId,
        position: BlockPos,
        object: Box<dyn ShopObject>,
        cause: AddCause,
    ) -> Result<SessionId, RegistryError> {
        if self.identity.contains_permanent(&permanent_id) {
            warn!(
                permanent_id = %permanent_id,
                position = %position,
                "Rejected shopkeeper with an already registered permanent id"
            );
            return Err(RegistryError::DuplicateIdentity { permanent_id });
        }

        let record = ShopkeeperRecord::new(permanent_id, position, object, self.region_shift);
        let region_key = record.region_key().clone();
        let gated = record.requires_presence_gating();
        let session_id = self.identity.register(record)?;
        self.spatial.insert(&region_key, session_id);

        debug!(
            permanent_id = %permanent_id,
            session_id = %session_id,
            region = %region_key,
            ?cause,
            "Registered shopkeeper"
        );
        self.events.publish(ShopkeeperEvent::Added {
            permanent_id,
            session_id,
            cause,
        });

        if !gated || self.loaded_regions.contains(&region_key) {
            if let Err(e) = self.activate(session_id) {
                debug!(
                    session_id = %session_id,
                    error = %e,
                    "Activation after registration failed, left for reconciliation"
                );
            }
        }

        if cause == AddCause::Created {
            self.request_save();
        }
        Ok(session_id)
    }

    /// 새 영구 ID로 상점 주인 생성
    pub fn create(
        &mut self,
        position: BlockPos,
        object: Box<dyn ShopObject>,
    ) -> Result<SessionId, RegistryError> {
        self.register(Uuid::new_v4(), position, object, AddCause::Created)
    }

    // ========================================================================
    // Activation
    // ========================================================================

    /// 물리 오브젝트 스폰 후 활성화 인덱스에 연결
    pub fn activate(&mut self, session_id: SessionId) -> Result<ActivationOutcome, ActivationError> {
        let record = self
            .identity
            .get_mut(session_id)
            .ok_or(ActivationError::NotRegistered(session_id))?;

        self.spawn_queue.remove(session_id);
        if record.is_active() {
            return Ok(ActivationOutcome::AlreadyActive);
        }
        if record.requires_presence_gating() && !self.loaded_regions.contains(record.region_key()) {
            return Ok(ActivationOutcome::RegionNotLoaded);
        }

        let permanent_id = record.permanent_id();
        if record.despawns_during_world_save()
            && self.scheduler.is_world_saving(&record.position().world)
        {
            record.spawn_state = SpawnState::AwaitingWorldSaveRespawn;
            trace!(
                permanent_id = %permanent_id,
                session_id = %session_id,
                "Skipping spawn while the world is being saved"
            );
            return Ok(ActivationOutcome::AwaitingWorldSave);
        }

        if let Err(e) = record.spawn_object() {
            let reason = e.to_string();
            let attempts = record.mark_spawn_failed(reason.clone());
            warn!(
                permanent_id = %permanent_id,
                session_id = %session_id,
                region = %record.region_key(),
                attempts,
                error = %reason,
                "Failed to spawn shopkeeper"
            );
            return Err(ActivationError::SpawnFailed {
                permanent_id,
                reason,
            });
        }

        let Some(object_id) = record.current_object_id() else {
            record.mark_spawn_failed("spawned without a live object id");
            warn!(
                permanent_id = %permanent_id,
                session_id = %session_id,
                "Shop object reported a successful spawn but has no object id"
            );
            return Err(ActivationError::NotSpawned { permanent_id });
        };

        if let Err(e) = self.activation.activate(object_id.clone(), session_id) {
            record.mark_spawn_failed(e.to_string());
            warn!(
                permanent_id = %permanent_id,
                session_id = %session_id,
                object_id = %object_id,
                error = %e,
                "Object id collides with another shopkeeper, leaving inactive"
            );
            return Err(e);
        }

        record.spawn_state = SpawnState::Active {
            object_id: object_id.clone(),
        };
        debug!(
            permanent_id = %permanent_id,
            session_id = %session_id,
            object_id = %object_id,
            "Activated shopkeeper"
        );
        self.events.publish(ShopkeeperEvent::Activated {
            permanent_id,
            object_id: object_id.clone(),
        });
        Ok(ActivationOutcome::Activated(object_id))
    }

    /// 비활성화
    ///
    /// `close_sessions`가 true면 UI 세션을 닫고, 아니면 활성 상태였을 때만
    /// 비활성화 알림을 보냅니다. 활성 상태였으면 true.
    pub fn deactivate(
        &mut self,
        session_id: SessionId,
        close_sessions: bool,
    ) -> Result<bool, ActivationError> {
        let record = self
            .identity
            .get_mut(session_id)
            .ok_or(ActivationError::NotRegistered(session_id))?;

        let shopkeeper = record.to_ref();
        if close_sessions {
            self.ui.close_sessions(&shopkeeper);
        } else if record.is_active() {
            self.ui.on_shopkeeper_deactivated(&shopkeeper);
        }

        let was_active = match record.live_object_id().cloned() {
            Some(object_id) => {
                match self.activation.deactivate(&object_id, session_id) {
                    Deactivation::Removed => {}
                    Deactivation::Stale { bound_to } => {
                        debug!(
                            session_id = %session_id,
                            object_id = %object_id,
                            bound_to = %bound_to,
                            "Stale deactivation ignored"
                        );
                    }
                    Deactivation::NotBound => {
                        debug!(
                            session_id = %session_id,
                            object_id = %object_id,
                            "Object id was not bound on deactivation"
                        );
                    }
                }
                true
            }
            None => false,
        };

        record.despawn_object();
        if was_active {
            record.spawn_state = SpawnState::Despawned;
            trace!(session_id = %session_id, "Deactivated shopkeeper");
            self.events.publish(ShopkeeperEvent::Deactivated {
                permanent_id: shopkeeper.permanent_id,
            });
        }
        Ok(was_active)
    }

    /// 오브젝트 ID가 바뀐 활성 레코드를 다시 연결
    pub(super) fn rebind(
        &mut self,
        session_id: SessionId,
        old: ObjectId,
        new: Option<ObjectId>,
    ) -> Rebind {
        let Some(record) = self.identity.get_mut(session_id) else {
            self.activation.deactivate(&old, session_id);
            return Rebind::Lost;
        };
        let permanent_id = record.permanent_id();

        match new {
            Some(new_id) => match self.activation.rekey(session_id, &old, new_id.clone()) {
                Ok(_) => {
                    record.spawn_state = SpawnState::Active {
                        object_id: new_id.clone(),
                    };
                    debug!(
                        permanent_id = %permanent_id,
                        old = %old,
                        new = %new_id,
                        "Rebound shopkeeper to respawned object"
                    );
                    self.events.publish(ShopkeeperEvent::Rebound {
                        permanent_id,
                        old,
                        new: new_id,
                    });
                    Rebind::Rebound
                }
                Err(e) => {
                    record.mark_spawn_failed(e.to_string());
                    warn!(
                        permanent_id = %permanent_id,
                        session_id = %session_id,
                        error = %e,
                        "Respawned object id collides with another shopkeeper"
                    );
                    self.events
                        .publish(ShopkeeperEvent::Deactivated { permanent_id });
                    Rebind::Collided
                }
            },
            None => {
                self.activation.deactivate(&old, session_id);
                record.spawn_state = SpawnState::Despawned;
                debug!(
                    permanent_id = %permanent_id,
                    object_id = %old,
                    "Live object is gone, removed stale binding"
                );
                self.events
                    .publish(ShopkeeperEvent::Deactivated { permanent_id });
                Rebind::Lost
            }
        }
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// 영구 삭제
    ///
    /// 이미 삭제된 레코드면 None (에러 아님).
    pub fn delete(&mut self, session_id: SessionId) -> Option<ShopkeeperRecord> {
        let record = self.remove_record(session_id, RemoveCause::Deleted)?;
        self.request_save();
        Some(record)
    }

    pub fn delete_by_permanent(&mut self, permanent_id: &PermanentId) -> Option<ShopkeeperRecord> {
        let session_id = self.identity.session_of(permanent_id)?;
        self.delete(session_id)
    }

    /// 모두 영구 삭제
    pub fn delete_all(&mut self) -> usize {
        let count = self
            .identity
            .session_ids()
            .into_iter()
            .filter_map(|sid| self.remove_record(sid, RemoveCause::Deleted))
            .count();
        if count > 0 {
            info!(count, "Deleted all shopkeepers");
            self.request_save();
        }
        count
    }

    /// 모두 언로드 (저장 데이터는 유지)
    pub fn unload_all(&mut self) -> usize {
        self.identity
            .session_ids()
            .into_iter()
            .filter_map(|sid| self.remove_record(sid, RemoveCause::Unloaded))
            .count()
    }

    fn remove_record(&mut self, session_id: SessionId, cause: RemoveCause) -> Option<ShopkeeperRecord> {
        if !self.identity.contains(session_id) {
            debug!(session_id = %session_id, ?cause, "Shopkeeper already removed");
            return None;
        }

        if let Err(e) = self.deactivate(session_id, true) {
            warn!(session_id = %session_id, error = %e, "Deactivation before removal failed");
        }
        self.spawn_queue.remove(session_id);

        let mut record = self.identity.unregister(session_id)?;
        if !self.spatial.remove(record.region_key(), session_id) {
            warn!(
                permanent_id = %record.permanent_id(),
                region = %record.region_key(),
                "Removed shopkeeper was missing from the spatial index"
            );
        }
        record.valid = false;

        debug!(
            permanent_id = %record.permanent_id(),
            session_id = %session_id,
            ?cause,
            "Removed shopkeeper"
        );
        self.events.publish(ShopkeeperEvent::Removed {
            permanent_id: record.permanent_id(),
            session_id,
            cause,
        });
        Some(record)
    }

    // ========================================================================
    // Move
    // ========================================================================

    /// 위치 이동
    ///
    /// 오브젝트의 이동 훅을 먼저 호출하고, 인덱스를 갱신한 뒤
    /// 리전이 바뀌었으면 활성화 여부를 다시 판단합니다. 리전이 바뀌었으면 true.
    /// 같은 위치로의 이동은 아무것도 하지 않습니다.
    pub fn move_record(
        &mut self,
        session_id: SessionId,
        new_position: BlockPos,
    ) -> Result<bool, ActivationError> {
        let shift = self.region_shift;
        let record = self
            .identity
            .get_mut(session_id)
            .ok_or(ActivationError::NotRegistered(session_id))?;

        if record.position() == &new_position {
            trace!(session_id = %session_id, position = %new_position, "Move to the same position ignored");
            return Ok(false);
        }

        let from = record.position().clone();
        let old_key = record.region_key().clone();
        record.notify_object_moved(&new_position);
        record.set_position(new_position.clone(), shift);

        let permanent_id = record.permanent_id();
        let gated = record.requires_presence_gating();
        let new_key = record.region_key().clone();
        let bound = record.live_object_id().cloned();
        let current = record.current_object_id();

        if let Some(old_id) = bound {
            if current.as_ref() != Some(&old_id) {
                self.rebind(session_id, old_id, current);
            }
        }

        let changed = self.spatial.move_record(session_id, &old_key, &new_key);
        if changed {
            let active = self
                .identity
                .lookup_by_session(session_id)
                .map(ShopkeeperRecord::is_active)
                .unwrap_or(false);
            let loaded = self.loaded_regions.contains(&new_key);

            if gated && !loaded {
                self.spawn_queue.remove(session_id);
            }
            if gated && active && !loaded {
                self.deactivate(session_id, false)?;
            } else if !active && (!gated || loaded) {
                if let Err(e) = self.activate(session_id) {
                    debug!(session_id = %session_id, error = %e, "Activation after move failed");
                }
            }
        }

        debug!(
            permanent_id = %permanent_id,
            from = %from,
            to = %new_position,
            region_changed = changed,
            "Moved shopkeeper"
        );
        self.events.publish(ShopkeeperEvent::Moved {
            permanent_id,
            from,
            to: new_position,
        });
        self.request_save();
        Ok(changed)
    }

    // ========================================================================
    // Region streaming
    // ========================================================================

    /// 리전 로드 알림
    ///
    /// 활성화 지연이 0이고 스폰 큐를 쓰지 않으면 반환 시점에 리전의 모든
    /// 리전 종속 레코드가 활성 상태이거나 실패로 기록되어 있습니다.
    pub fn on_region_loaded(&mut self, key: RegionKey) -> RegionActivation {
        if !self.loaded_regions.insert(key.clone()) {
            trace!(region = %key, "Region already marked loaded");
        }

        if self.activation_delay > 0 {
            if !self.spatial.in_region(&key).is_empty() {
                self.scheduler.schedule_activation(key, self.activation_delay);
            }
            return RegionActivation::default();
        }
        self.activate_region(&key)
    }

    /// 리전의 비활성 리전 종속 레코드 활성화 (스폰 큐가 켜져 있으면 큐에 넣음)
    pub(super) fn activate_region(&mut self, key: &RegionKey) -> RegionActivation {
        let candidates: Vec<SessionId> = self
            .spatial
            .in_region(key)
            .iter()
            .copied()
            .filter(|sid| {
                self.identity
                    .lookup_by_session(*sid)
                    .map(|r| r.requires_presence_gating() && !r.is_active())
                    .unwrap_or(false)
            })
            .collect();

        let mut summary = RegionActivation::default();
        if candidates.is_empty() {
            return summary;
        }

        if self.spawn_queue.is_enabled() {
            summary.queued = candidates
                .into_iter()
                .filter(|sid| self.spawn_queue.push(*sid))
                .count();
            debug!(region = %key, queued = summary.queued, "Queued shopkeepers for spawning");
            return summary;
        }

        for session_id in candidates {
            match self.activate(session_id) {
                Ok(ActivationOutcome::Activated(_)) => summary.activated += 1,
                Ok(_) => {}
                Err(_) => summary.failed += 1,
            }
        }

        debug!(
            region = %key,
            activated = summary.activated,
            failed = summary.failed,
            "Activated shopkeepers in region"
        );
        summary
    }

    /// 리전 언로드 알림 (UI 세션은 닫지 않음)
    ///
    /// 비활성화된 레코드 수를 반환합니다.
    pub fn on_region_unloaded(&mut self, key: &RegionKey) -> usize {
        if !self.loaded_regions.remove(key) {
            trace!(region = %key, "Unloaded region was not marked loaded");
        }
        self.scheduler.cancel_activation(key);

        // 살아있거나 실패로 남은 오브젝트가 있을 수 있는 레코드만
        let mut gated: Vec<SessionId> = Vec::new();
        for &session_id in self.spatial.in_region(key) {
            self.spawn_queue.remove(session_id);
            let live = self
                .identity
                .lookup_by_session(session_id)
                .map(|r| {
                    r.requires_presence_gating()
                        && (r.is_active()
                            || matches!(r.spawn_state(), SpawnState::SpawnFailed { .. }))
                })
                .unwrap_or(false);
            if live {
                gated.push(session_id);
            }
        }

        let mut deactivated = 0;
        for session_id in gated {
            if let Ok(true) = self.deactivate(session_id, false) {
                deactivated += 1;
            }
        }

        if deactivated > 0 {
            debug!(region = %key, deactivated, "Deactivated shopkeepers in unloaded region");
        }
        deactivated
    }

    /// 월드 언로드 - 월드의 모든 로드된 리전을 언로드 처리
    pub fn on_world_unloaded(&mut self, world: &str) -> usize {
        let mut keys: Vec<RegionKey> = self
            .loaded_regions
            .iter()
            .filter(|key| key.is_in_world(world))
            .cloned()
            .collect();
        keys.sort();
        self.scheduler.cancel_world(world);
        if self.scheduler.cancel_world_save(world) {
            self.reset_world_save_waiters(world);
        }

        let deactivated: usize = keys.iter().map(|key| self.on_region_unloaded(key)).sum();
        info!(
            world,
            regions = keys.len(),
            deactivated,
            "World unloaded"
        );
        deactivated
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// 한 틱 진행: 지연 활성화 → 월드 저장 후 재스폰 → 스폰 큐 → 생존 확인 → 스폰 검증
    pub fn tick(&mut self) -> TickReport {
        let work = self.scheduler.advance();
        let mut report = TickReport {
            tick: self.scheduler.current_tick(),
            ..Default::default()
        };

        let mut passes = Vec::new();
        for item in work {
            match item {
                DueWork::ActivateRegion(key) => {
                    if self.loaded_regions.contains(&key) {
                        let summary = self.activate_region(&key);
                        report.region_activations.merge(summary);
                    }
                }
                DueWork::RespawnAfterWorldSave(world) => {
                    let summary = self.respawn_after_world_save(&world);
                    report.world_save_respawns.merge(summary);
                }
                DueWork::Pass(pass) => passes.push(pass),
            }
        }

        report.spawn_queue = self.drain_spawn_queue();

        for pass in passes {
            match pass {
                ScheduledPass::LivenessCheck => {
                    report.liveness = Some(self.run_liveness_check());
                }
                ScheduledPass::SpawnVerifier => {
                    report.verifier = Some(self.run_spawn_verifier());
                }
            }
        }
        report
    }

    /// 스폰 큐에서 이번 틱 몫만큼 스폰
    fn drain_spawn_queue(&mut self) -> SpawnQueueReport {
        let batch = self.spawn_queue.take_batch();
        let mut report = SpawnQueueReport::default();

        for session_id in batch {
            match self.activate(session_id) {
                Ok(ActivationOutcome::Activated(_)) => report.spawned += 1,
                Ok(_) => {}
                Err(ActivationError::NotRegistered(_)) => {}
                Err(_) => report.failed += 1,
            }
        }
        report.remaining = self.spawn_queue.len();

        if report.spawned + report.failed > 0 {
            trace!(
                spawned = report.spawned,
                failed = report.failed,
                remaining = report.remaining,
                "Processed spawn queue"
            );
        }
        report
    }

    // ========================================================================
    // World saves
    // ========================================================================

    /// 월드 저장 알림
    ///
    /// 저장 중 제거해야 하는 오브젝트를 제거하고 다음 틱에 다시 스폰합니다.
    /// 같은 월드의 저장을 이미 처리 중이면 무시합니다. 제거한 수를 반환합니다.
    pub fn on_world_saved(&mut self, world: &str) -> usize {
        if !self.scheduler.schedule_world_save_respawn(world) {
            debug!(world, "World save already in progress, ignoring");
            return 0;
        }

        let affected: Vec<SessionId> = self
            .spatial
            .in_world(world, |_| true)
            .into_iter()
            .filter(|sid| {
                self.identity
                    .lookup_by_session(*sid)
                    .map(|r| {
                        r.despawns_during_world_save()
                            && (r.is_active() || self.spawn_queue.contains(*sid))
                    })
                    .unwrap_or(false)
            })
            .collect();

        let mut despawned = 0;
        for session_id in affected {
            self.spawn_queue.remove(session_id);
            match self.deactivate(session_id, false) {
                Ok(was_active) => despawned += usize::from(was_active),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Could not despawn for world save");
                    continue;
                }
            }
            if let Some(record) = self.identity.get_mut(session_id) {
                record.spawn_state = SpawnState::AwaitingWorldSaveRespawn;
            }
        }

        debug!(world, despawned, "Despawned shopkeepers for world save");
        despawned
    }

    /// 저장이 끝난 월드의 대기 레코드를 즉시 다시 스폰
    fn respawn_after_world_save(&mut self, world: &str) -> RegionActivation {
        let waiting: Vec<SessionId> = self
            .spatial
            .in_world(world, |_| true)
            .into_iter()
            .filter(|sid| {
                self.identity
                    .lookup_by_session(*sid)
                    .map(ShopkeeperRecord::is_awaiting_world_save)
                    .unwrap_or(false)
            })
            .collect();

        let mut summary = RegionActivation::default();
        for session_id in waiting {
            match self.activate(session_id) {
                Ok(ActivationOutcome::Activated(_)) => summary.activated += 1,
                Ok(ActivationOutcome::RegionNotLoaded) => {
                    if let Some(record) = self.identity.get_mut(session_id) {
                        record.spawn_state = SpawnState::Despawned;
                    }
                }
                Ok(_) => {}
                Err(_) => summary.failed += 1,
            }
        }

        if summary.activated + summary.failed > 0 {
            debug!(
                world,
                activated = summary.activated,
                failed = summary.failed,
                "Respawned shopkeepers after world save"
            );
        }
        summary
    }

    /// 취소된 월드 저장의 대기 상태 해제
    fn reset_world_save_waiters(&mut self, world: &str) {
        for session_id in self.spatial.in_world(world, |_| true) {
            if let Some(record) = self.identity.get_mut(session_id) {
                if record.is_awaiting_world_save() {
                    record.spawn_state = SpawnState::Despawned;
                }
            }
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// 종료: 예약 작업 중단, 모든 레코드 언로드, 인덱스 비우기
    pub fn on_disable(&mut self) -> usize {
        self.scheduler.cancel_all();
        self.spawn_queue.clear();
        let unloaded = self.unload_all();
        self.loaded_regions.clear();

        let leftover = self.spatial.clear() + self.activation.clear() + self.identity.clear();
        if leftover > 0 {
            warn!(leftover, "Index entries were left after unloading all shopkeepers");
        }
        info!(unloaded, "Shopkeeper registry shut down");
        unloaded
    }

    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn lookup_by_permanent(&self, permanent_id: &PermanentId) -> Option<&ShopkeeperRecord> {
        self.identity.lookup_by_permanent(permanent_id)
    }

    pub fn lookup_by_session(&self, session_id: SessionId) -> Option<&ShopkeeperRecord> {
        self.identity.lookup_by_session(session_id)
    }

    /// 살아있는 물리 오브젝트로 조회
    pub fn lookup_by_object(&self, object_id: &ObjectId) -> Option<&ShopkeeperRecord> {
        self.activation
            .lookup(object_id)
            .and_then(|sid| self.identity.lookup_by_session(sid))
    }

    /// 블록 형태 오브젝트가 점유한 블록으로 조회
    pub fn lookup_by_anchor_block(&self, position: &BlockPos) -> Option<&ShopkeeperRecord> {
        self.lookup_by_object(&ObjectId::Block(position.clone()))
    }

    pub fn records_in_region(&self, key: &RegionKey) -> Vec<&ShopkeeperRecord> {
        self.resolve(self.spatial.in_region(key).iter().copied())
    }

    pub fn records_in_world(&self, world: &str, only_loaded: bool) -> Vec<&ShopkeeperRecord> {
        let sessions = self
            .spatial
            .in_world(world, |key| !only_loaded || self.loaded_regions.contains(key));
        self.resolve(sessions)
    }

    /// 리전별 레코드 (리전 키 순)
    pub fn records_by_region(&self, world: &str) -> Vec<(&RegionKey, Vec<&ShopkeeperRecord>)> {
        self.spatial
            .regions_in_world(world)
            .into_iter()
            .map(|key| (key, self.records_in_region(key)))
            .collect()
    }

    /// 정확히 해당 위치에 있는 레코드
    pub fn records_at(&self, position: &BlockPos) -> Vec<&ShopkeeperRecord> {
        self.records_in_region(&position.region(self.region_shift))
            .into_iter()
            .filter(|r| r.position() == position)
            .collect()
    }

    /// 모든 레코드 (등록 순서)
    pub fn all_records(&self) -> Vec<&ShopkeeperRecord> {
        self.identity.records().collect()
    }

    pub fn all_active_records(&self) -> Vec<&ShopkeeperRecord> {
        self.identity.records().filter(|r| r.is_active()).collect()
    }

    pub fn worlds_with_records(&self) -> Vec<&str> {
        self.spatial.worlds()
    }

    pub fn is_region_loaded(&self, key: &RegionKey) -> bool {
        self.loaded_regions.contains(key)
    }

    /// 월드의 로드된 리전 (정렬됨)
    pub fn loaded_regions(&self, world: &str) -> Vec<&RegionKey> {
        let mut keys: Vec<&RegionKey> = self
            .loaded_regions
            .iter()
            .filter(|key| key.is_in_world(world))
            .collect();
        keys.sort();
        keys
    }

    pub fn record_count(&self) -> usize {
        self.identity.len()
    }

    pub fn active_count(&self) -> usize {
        self.activation.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.scheduler.current_tick()
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn spawn_queue(&self) -> &SpawnQueue {
        &self.spawn_queue
    }

    pub fn region_shift(&self) -> u8 {
        self.region_shift
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn stats(&self) -> CoordinatorStats {
        let (gated, spawn_failed, awaiting) =
            self.identity.records().fold((0, 0, 0), |(g, f, w), r| {
                (
                    g + usize::from(r.requires_presence_gating()),
                    f + usize::from(matches!(r.spawn_state(), SpawnState::SpawnFailed { .. })),
                    w + usize::from(r.is_awaiting_world_save()),
                )
            });

        CoordinatorStats {
            tick: self.scheduler.current_tick(),
            records: self.identity.len(),
            active: self.activation.len(),
            gated,
            spawn_failed,
            awaiting_world_save: awaiting,
            queued_spawns: self.spawn_queue.len(),
            worlds: self.spatial.worlds().len(),
            regions: self.spatial.region_count(),
            loaded_regions: self.loaded_regions.len(),
            pending_activations: self.scheduler.pending_activations(),
        }
    }

    /// 저장용 스냅샷 (등록 순서)
    pub fn snapshot_data(&self) -> StoredShopkeepers {
        StoredShopkeepers::new(self.identity.records().map(ShopkeeperRecord::to_data).collect())
    }

    /// 백그라운드 저장 요청 (기다리지 않음)
    pub(super) fn request_save(&self) {
        self.saves.request_save(self.snapshot_data());
    }

    fn resolve(&self, sessions: impl IntoIterator<Item = SessionId>) -> Vec<&ShopkeeperRecord> {
        sessions
            .into_iter()
            .filter_map(|sid| self.identity.lookup_by_session(sid))
            .collect()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// LifecycleCoordinator 빌더
pub struct CoordinatorBuilder {
    region_shift: u8,
    spawns_per_tick: usize,
    liveness_period: u64,
    verifier_period: u64,
    activation_delay: u64,
    ui: Arc<dyn UiSessions>,
    saves: Arc<dyn SaveSink>,
    events: Arc<EventBus>,
}

impl CoordinatorBuilder {
    /// 범위를 벗어난 리전 시프트는 최대값으로 맞춥니다.
    pub fn new(config: &ShopkeepersConfig) -> Self {
        let region_shift = if config.region_shift > MAX_REGION_SHIFT {
            warn!(
                region_shift = config.region_shift,
                max = MAX_REGION_SHIFT,
                "Region shift out of range, clamping"
            );
            MAX_REGION_SHIFT
        } else {
            config.region_shift
        };

        Self {
            region_shift,
            spawns_per_tick: config.spawns_per_tick,
            liveness_period: config.liveness_check_period_ticks,
            verifier_period: config.spawn_verifier_period_ticks,
            activation_delay: config.region_activation_delay_ticks,
            ui: Arc::new(NoopUiSessions),
            saves: Arc::new(NoopSaveSink),
            events: Arc::new(EventBus::new()),
        }
    }

    /// UI 세션 협력자 설정
    pub fn ui_sessions(mut self, ui: Arc<dyn UiSessions>) -> Self {
        self.ui = ui;
        self
    }

    /// 저장 요청 대상 설정
    pub fn save_sink(mut self, saves: Arc<dyn SaveSink>) -> Self {
        self.saves = saves;
        self
    }

    pub fn event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> LifecycleCoordinator {
        LifecycleCoordinator {
            region_shift: self.region_shift,
            activation_delay: self.activation_delay,
            identity: IdentityIndex::new(),
            spatial: SpatialIndex::new(),
            activation: ActivationTracker::new(),
            loaded_regions: HashSet::new(),
            scheduler: TickScheduler::new(self.liveness_period, self.verifier_period),
            spawn_queue: SpawnQueue::new(self.spawns_per_tick),
            ui: self.ui,
            saves: self.saves,
            events: self.events,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
