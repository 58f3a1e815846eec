//! Shopkeeper 영구 데이터
//!
//! 세션 ID, 활성화 상태, 물리 오브젝트 ID는 런타임 전용이므로 저장하지 않습니다.

use super::json::JsonStore;
use crate::core::{BlockPos, PermanentId};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 데이터 파일명
pub const SHOPKEEPERS_FILE: &str = "shopkeepers.json";

/// 현재 데이터 포맷 버전
const DATA_VERSION: u32 = 1;

/// 저장되는 상점 주인 한 명
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopkeeperData {
    pub unique_id: PermanentId,
    /// 오브젝트 타입 ID ("mob", "block", "npc" 등)
    pub object_type: String,
    pub position: BlockPos,
}

impl ShopkeeperData {
    pub fn new(unique_id: PermanentId, object_type: impl Into<String>, position: BlockPos) -> Self {
        Self {
            unique_id,
            object_type: object_type.into(),
            position,
        }
    }
}

/// 데이터 파일 전체
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredShopkeepers {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub shopkeepers: Vec<ShopkeeperData>,
}

impl Default for StoredShopkeepers {
    fn default() -> Self {
        Self {
            version: DATA_VERSION,
            shopkeepers: Vec::new(),
        }
    }
}

impl StoredShopkeepers {
    pub fn new(shopkeepers: Vec<ShopkeeperData>) -> Self {
        Self {
            version: DATA_VERSION,
            shopkeepers,
        }
    }

    pub fn len(&self) -> usize {
        self.shopkeepers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shopkeepers.is_empty()
    }
}

fn default_version() -> u32 {
    DATA_VERSION
}

// ============================================================================
// ShopkeeperStore
// ============================================================================

/// `shopkeepers.json` 파일 저장소
#[derive(Debug, Clone)]
pub struct ShopkeeperStore {
    store: JsonStore,
}

impl ShopkeeperStore {
    pub fn new(store: JsonStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    /// 데이터 로드 (파일이 없으면 빈 데이터)
    pub fn load(&self) -> Result<StoredShopkeepers> {
        match self.store.load_optional::<StoredShopkeepers>(SHOPKEEPERS_FILE)? {
            Some(data) => {
                info!(
                    count = data.len(),
                    path = %self.store.file_path(SHOPKEEPERS_FILE).display(),
                    "Loaded shopkeeper data"
                );
                Ok(data)
            }
            None => {
                debug!("No shopkeeper data file, starting empty");
                Ok(StoredShopkeepers::default())
            }
        }
    }

    /// 데이터 저장
    pub fn save(&self, data: &StoredShopkeepers) -> Result<()> {
        self.store.save(SHOPKEEPERS_FILE, data)?;
        debug!(count = data.len(), "Saved shopkeeper data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let data = store.load().unwrap();
        assert!(data.is_empty());
        assert_eq!(data.version, 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ShopkeeperStore::new(JsonStore::new(dir.path()));
        let id = Uuid::new_v4();
        let data = StoredShopkeepers::new(vec![ShopkeeperData::new(
            id,
            "mob",
            BlockPos::new("world", 10, 64, -3),
        )]);

        store.save(&data).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_camel_case_fields() {
        let data = ShopkeeperData::new(Uuid::nil(), "block", BlockPos::new("world", 0, 0, 0));
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("uniqueId"));
        assert!(json.contains("objectType"));
    }
}
