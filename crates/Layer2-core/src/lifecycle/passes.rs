//! Reconciliation Passes - 주기적 드리프트 복구
//!
//! - 생존 확인: 활성 레코드의 오브젝트를 점검하고 바뀐 ID를 한꺼번에 다시 연결
//! - 스폰 검증: 로드된 리전의 비활성 레코드를 재활성화

use super::coordinator::{ActivationOutcome, LifecycleCoordinator, Rebind};
use serde::Serialize;
use shopkeepers_foundation::{ObjectId, RegionKey, SessionId};
use tracing::{debug, info, warn};

/// 생존 확인 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub checked: usize,
    /// 오브젝트가 스스로 복구(재스폰)한 수
    pub repaired: usize,
    pub rebound: usize,
    /// 오브젝트가 사라져 비활성화된 수
    pub lost: usize,
    /// 새 ID가 충돌한 수
    pub collided: usize,
}

impl LivenessReport {
    pub fn rekeyed(&self) -> usize {
        self.rebound + self.lost + self.collided
    }
}

/// 스폰 검증 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifierReport {
    pub candidates: usize,
    pub repaired: usize,
    pub failed: usize,
}

impl LifecycleCoordinator {
    /// 생존 확인 패스
    ///
    /// 스캔 도중에는 활성화 인덱스를 건드리지 않고, 바뀐 ID는 스캔이 끝난 뒤 일괄 처리합니다.
    pub fn run_liveness_check(&mut self) -> LivenessReport {
        let active: Vec<SessionId> = self
            .identity
            .records()
            .filter(|r| r.is_active())
            .map(|r| r.session_id())
            .collect();

        let mut report = LivenessReport {
            checked: active.len(),
            ..Default::default()
        };
        let mut rekeys: Vec<(SessionId, ObjectId, Option<ObjectId>)> = Vec::new();

        for session_id in active {
            let Some(record) = self.identity.get_mut(session_id) else {
                continue;
            };
            let Some(bound) = record.live_object_id().cloned() else {
                continue;
            };

            if record.check_object() {
                report.repaired += 1;
            }
            let current = record.current_object_id();
            if current.as_ref() != Some(&bound) {
                rekeys.push((session_id, bound, current));
            }
        }

        for (session_id, old, new) in rekeys {
            match self.rebind(session_id, old, new) {
                Rebind::Rebound => report.rebound += 1,
                Rebind::Lost => report.lost += 1,
                Rebind::Collided => report.collided += 1,
            }
        }

        if report.rekeyed() > 0 {
            debug!(
                checked = report.checked,
                rebound = report.rebound,
                lost = report.lost,
                collided = report.collided,
                "Liveness check re-keyed shopkeepers"
            );
            self.request_save();
        }
        report
    }

    /// 스폰 검증 패스
    ///
    /// 로드된 리전의 비활성 리전 종속 레코드와 모든 비활성 비종속 레코드를
    /// 비활성화 후 다시 활성화합니다. 스폰 큐나 월드 저장을 기다리는 레코드는 건너뜁니다.
    pub fn run_spawn_verifier(&mut self) -> VerifierReport {
        let mut regions: Vec<RegionKey> = self.loaded_regions.iter().cloned().collect();
        regions.sort();

        let mut candidates: Vec<SessionId> = Vec::new();
        for key in &regions {
            candidates.extend(self.spatial.in_region(key).iter().copied().filter(|sid| {
                self.identity
                    .lookup_by_session(*sid)
                    .map(|r| r.requires_presence_gating() && !r.is_active())
                    .unwrap_or(false)
            }));
        }
        candidates.extend(
            self.identity
                .records()
                .filter(|r| !r.requires_presence_gating() && !r.is_active())
                .map(|r| r.session_id()),
        );
        candidates.retain(|sid| {
            !self.spawn_queue.contains(*sid)
                && !self
                    .identity
                    .lookup_by_session(*sid)
                    .map(|r| r.is_awaiting_world_save())
                    .unwrap_or(false)
        });

        let mut report = VerifierReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        for session_id in candidates {
            if let Err(e) = self.deactivate(session_id, false) {
                warn!(session_id = %session_id, error = %e, "Spawn verifier could not reset shopkeeper");
                continue;
            }
            match self.activate(session_id) {
                Ok(ActivationOutcome::Activated(_)) => report.repaired += 1,
                Ok(_) => {}
                Err(_) => report.failed += 1,
            }
        }

        if report.repaired > 0 {
            info!(repaired = report.repaired, "Spawn verifier respawned shopkeepers");
            self.request_save();
        }
        if report.failed > 0 {
            warn!(failed = report.failed, "Spawn verifier could not spawn shopkeepers");
        }
        report
    }
}
