//! Integrity Check - 인덱스 간 일관성 검사

use super::coordinator::LifecycleCoordinator;
use shopkeepers_foundation::{ObjectId, PermanentId, RegionKey, SessionId};
use std::collections::HashSet;
use thiserror::Error;

/// 인덱스 불일치
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("identity indices differ in size ({by_session} sessions, {by_permanent} permanent ids)")]
    IdentitySizeMismatch { by_session: usize, by_permanent: usize },

    #[error("permanent id {permanent_id} points at session {session_id} which does not hold it")]
    IdentityMismatch {
        permanent_id: PermanentId,
        session_id: SessionId,
    },

    #[error("permanent id {permanent_id} is held by more than one record")]
    DuplicatePermanentId { permanent_id: PermanentId },

    #[error("session {session_id} is indexed but marked invalid")]
    InvalidRecordIndexed { session_id: SessionId },

    #[error("session {session_id} is missing from its region {region}")]
    MissingFromRegion {
        session_id: SessionId,
        region: RegionKey,
    },

    #[error("region {region} lists session {session_id} which does not belong there")]
    StrayRegionEntry {
        region: RegionKey,
        session_id: SessionId,
    },

    #[error("region {0} is indexed but empty")]
    EmptyRegion(RegionKey),

    #[error("active session {session_id} has object {object_id} which is not bound to it")]
    UnboundObject {
        session_id: SessionId,
        object_id: ObjectId,
    },

    #[error("object {object_id} is bound to session {session_id} which does not own it")]
    StaleBinding {
        object_id: ObjectId,
        session_id: SessionId,
    },

    #[error("gated session {session_id} is active in unloaded region {region}")]
    ActiveInUnloadedRegion {
        session_id: SessionId,
        region: RegionKey,
    },

    /// 스폰 큐에는 등록된 비활성 레코드만
    #[error("spawn queue holds session {session_id} which is unregistered or already active")]
    StaleQueueEntry { session_id: SessionId },
}

impl LifecycleCoordinator {
    /// 모든 인덱스의 일관성 검사 (위반이 없으면 빈 Vec)
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        // 영구 ID / 세션 ID
        let by_permanent = self.identity.permanent_entries().count();
        if by_permanent != self.identity.len() {
            violations.push(InvariantViolation::IdentitySizeMismatch {
                by_session: self.identity.len(),
                by_permanent,
            });
        }
        for (permanent_id, session_id) in self.identity.permanent_entries() {
            let holds = self
                .identity
                .lookup_by_session(*session_id)
                .map(|r| r.permanent_id() == *permanent_id)
                .unwrap_or(false);
            if !holds {
                violations.push(InvariantViolation::IdentityMismatch {
                    permanent_id: *permanent_id,
                    session_id: *session_id,
                });
            }
        }

        let mut seen = HashSet::new();
        for record in self.identity.records() {
            let session_id = record.session_id();
            if !seen.insert(record.permanent_id()) {
                violations.push(InvariantViolation::DuplicatePermanentId {
                    permanent_id: record.permanent_id(),
                });
            }
            if !record.is_valid() {
                violations.push(InvariantViolation::InvalidRecordIndexed { session_id });
            }
            if !self.spatial.contains(record.region_key(), session_id) {
                violations.push(InvariantViolation::MissingFromRegion {
                    session_id,
                    region: record.region_key().clone(),
                });
            }

            if let Some(object_id) = record.live_object_id() {
                if self.activation.lookup(object_id) != Some(session_id) {
                    violations.push(InvariantViolation::UnboundObject {
                        session_id,
                        object_id: object_id.clone(),
                    });
                }
                if record.requires_presence_gating()
                    && !self.loaded_regions.contains(record.region_key())
                {
                    violations.push(InvariantViolation::ActiveInUnloadedRegion {
                        session_id,
                        region: record.region_key().clone(),
                    });
                }
            }
        }

        // 공간 인덱스
        for (region, sessions) in self.spatial.iter() {
            if sessions.is_empty() {
                violations.push(InvariantViolation::EmptyRegion(region.clone()));
            }
            for session_id in sessions {
                let belongs = self
                    .identity
                    .lookup_by_session(*session_id)
                    .map(|r| r.region_key() == region)
                    .unwrap_or(false);
                if !belongs {
                    violations.push(InvariantViolation::StrayRegionEntry {
                        region: region.clone(),
                        session_id: *session_id,
                    });
                }
            }
        }

        // 활성화 인덱스
        for (object_id, session_id) in self.activation.iter() {
            let owns = self
                .identity
                .lookup_by_session(*session_id)
                .and_then(|r| r.live_object_id())
                .map(|id| id == object_id)
                .unwrap_or(false);
            if !owns {
                violations.push(InvariantViolation::StaleBinding {
                    object_id: object_id.clone(),
                    session_id: *session_id,
                });
            }
        }

        // 스폰 큐
        for session_id in self.spawn_queue.iter() {
            let waiting = self
                .identity
                .lookup_by_session(session_id)
                .map(|r| !r.is_active())
                .unwrap_or(false);
            if !waiting {
                violations.push(InvariantViolation::StaleQueueEntry { session_id });
            }
        }

        violations
    }
}
