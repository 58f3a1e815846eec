//! Tick Scheduler - 틱 단위 반복 작업
//!
//! 코디네이터가 소유하며 게임 스레드의 틱 경계에서만 작업을 꺼내 줍니다.

use serde::Serialize;
use shopkeepers_foundation::RegionKey;
use std::collections::HashMap;
use tracing::debug;

/// 반복 실행되는 재조정 패스
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledPass {
    LivenessCheck,
    SpawnVerifier,
}

impl ScheduledPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LivenessCheck => "liveness_check",
            Self::SpawnVerifier => "spawn_verifier",
        }
    }
}

/// 이번 틱에 실행할 작업
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueWork {
    /// 지연된 리전 활성화
    ActivateRegion(RegionKey),
    /// 월드 저장이 끝난 뒤 재스폰
    RespawnAfterWorldSave(String),
    Pass(ScheduledPass),
}

#[derive(Debug)]
struct RecurringTask {
    pass: ScheduledPass,
    period: u64,
    next_due: u64,
}

/// 틱 스케줄러
#[derive(Debug)]
pub struct TickScheduler {
    current_tick: u64,
    recurring: Vec<RecurringTask>,
    pending_activations: HashMap<RegionKey, u64>,
    /// 저장 중인 월드 → 재스폰 틱
    world_saves: HashMap<String, u64>,
    cancelled: bool,
}

impl TickScheduler {
    /// 두 패스를 주기와 함께 등록 (첫 실행은 한 주기 뒤)
    pub fn new(liveness_period: u64, verifier_period: u64) -> Self {
        let recurring = [
            (ScheduledPass::LivenessCheck, liveness_period),
            (ScheduledPass::SpawnVerifier, verifier_period),
        ]
        .into_iter()
        .map(|(pass, period)| {
            let period = period.max(1);
            RecurringTask {
                pass,
                period,
                next_due: period,
            }
        })
        .collect();

        Self {
            current_tick: 0,
            recurring,
            pending_activations: HashMap::new(),
            world_saves: HashMap::new(),
            cancelled: false,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// 한 틱 진행하고 실행할 작업 반환
    ///
    /// 순서: 지연 활성화 (리전 키 순) → 월드 저장 후 재스폰 (월드 이름 순) → 생존 확인 → 스폰 검증
    pub fn advance(&mut self) -> Vec<DueWork> {
        if self.cancelled {
            return Vec::new();
        }
        self.current_tick += 1;
        let now = self.current_tick;

        let mut due_regions: Vec<RegionKey> = self
            .pending_activations
            .iter()
            .filter(|(_, due)| **due <= now)
            .map(|(key, _)| key.clone())
            .collect();
        due_regions.sort();
        for key in &due_regions {
            self.pending_activations.remove(key);
        }

        let mut due_worlds: Vec<String> = self
            .world_saves
            .iter()
            .filter(|(_, due)| **due <= now)
            .map(|(world, _)| world.clone())
            .collect();
        due_worlds.sort();
        for world in &due_worlds {
            self.world_saves.remove(world);
        }

        let mut work: Vec<DueWork> = due_regions.into_iter().map(DueWork::ActivateRegion).collect();
        work.extend(due_worlds.into_iter().map(DueWork::RespawnAfterWorldSave));

        for task in &mut self.recurring {
            if task.next_due <= now {
                task.next_due = now + task.period;
                work.push(DueWork::Pass(task.pass));
            }
        }
        work
    }

    /// 리전 활성화 예약 (이미 있으면 교체)
    pub fn schedule_activation(&mut self, key: RegionKey, delay: u64) {
        if self.cancelled {
            return;
        }
        let due = self.current_tick + delay;
        debug!(region = %key, due, "Scheduled delayed region activation");
        self.pending_activations.insert(key, due);
    }

    pub fn cancel_activation(&mut self, key: &RegionKey) -> bool {
        self.pending_activations.remove(key).is_some()
    }

    /// 월드의 예약 활성화 모두 취소
    pub fn cancel_world(&mut self, world: &str) -> usize {
        let before = self.pending_activations.len();
        self.pending_activations.retain(|key, _| !key.is_in_world(world));
        before - self.pending_activations.len()
    }

    /// 월드 저장 후 재스폰 예약 (다음 틱)
    ///
    /// 같은 월드의 저장을 이미 처리 중이면 false.
    pub fn schedule_world_save_respawn(&mut self, world: &str) -> bool {
        if self.cancelled || self.world_saves.contains_key(world) {
            return false;
        }
        let due = self.current_tick + 1;
        debug!(world, due, "Scheduled respawn after world save");
        self.world_saves.insert(world.to_string(), due);
        true
    }

    pub fn cancel_world_save(&mut self, world: &str) -> bool {
        self.world_saves.remove(world).is_some()
    }

    /// 월드가 저장 중인지 (재스폰이 아직 실행되지 않음)
    pub fn is_world_saving(&self, world: &str) -> bool {
        self.world_saves.contains_key(world)
    }

    pub fn pending_world_saves(&self) -> usize {
        self.world_saves.len()
    }

    pub fn is_pending(&self, key: &RegionKey) -> bool {
        self.pending_activations.contains_key(key)
    }

    pub fn pending_activations(&self) -> usize {
        self.pending_activations.len()
    }

    /// 다음 실행 틱
    pub fn next_due(&self, pass: ScheduledPass) -> Option<u64> {
        if self.cancelled {
            return None;
        }
        self.recurring
            .iter()
            .find(|task| task.pass == pass)
            .map(|task| task.next_due)
    }

    /// 모든 예약 중단 (이후 다시 실행되지 않음)
    pub fn cancel_all(&mut self) {
        self.cancelled = true;
        self.pending_activations.clear();
        self.world_saves.clear();
        debug!(tick = self.current_tick, "Tick scheduler cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
