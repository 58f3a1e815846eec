//! ShopObject Types - 저장 데이터에서 오브젝트를 만드는 팩토리 레지스트리

use super::traits::ShopObject;
use crate::lifecycle::RegistryError;
use shopkeepers_foundation::ShopkeeperData;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 저장 데이터로부터 ShopObject를 생성하는 팩토리
pub type ShopObjectFactory = Box<dyn Fn(&ShopkeeperData) -> Box<dyn ShopObject> + Send + Sync>;

/// 오브젝트 타입 ID → 팩토리
pub struct ShopObjectTypes {
    factories: HashMap<String, ShopObjectFactory>,
}

impl ShopObjectTypes {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 타입 등록 (이미 있으면 false)
    pub fn register<F>(&mut self, type_id: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&ShopkeeperData) -> Box<dyn ShopObject> + Send + Sync + 'static,
    {
        let type_id = type_id.into();
        if self.factories.contains_key(&type_id) {
            warn!("Shop object type {} is already registered", type_id);
            return false;
        }
        debug!("Registered shop object type: {}", type_id);
        self.factories.insert(type_id, Box::new(factory));
        true
    }

    /// 저장 데이터에 맞는 오브젝트 생성
    pub fn create(&self, data: &ShopkeeperData) -> Result<Box<dyn ShopObject>, RegistryError> {
        self.factories
            .get(&data.object_type)
            .map(|factory| factory(data))
            .ok_or_else(|| RegistryError::UnknownObjectType(data.object_type.clone()))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }

    /// 등록된 타입 ID (정렬됨)
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for ShopObjectTypes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop_object::{VirtualKind, VirtualWorld};
    use shopkeepers_foundation::BlockPos;
    use uuid::Uuid;

    #[test]
    fn test_create_registered_type() {
        let world = VirtualWorld::new();
        let types = world.object_types();

        let data = ShopkeeperData::new(Uuid::new_v4(), "block", BlockPos::new("world", 0, 64, 0));
        let object = types.create(&data).unwrap();
        assert_eq!(object.type_id(), "block");
        assert!(object.requires_presence_gating());
        assert_eq!(types.type_ids(), vec!["block", "mob", "npc"]);
    }

    #[test]
    fn test_unknown_type() {
        let types = ShopObjectTypes::new();
        let data = ShopkeeperData::new(Uuid::new_v4(), "citizen", BlockPos::new("world", 0, 0, 0));
        let err = types.create(&data).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownObjectType(t) if t == "citizen"));
    }

    #[test]
    fn test_duplicate_registration() {
        let world = VirtualWorld::new();
        let mut types = ShopObjectTypes::new();
        let w = world.clone();
        assert!(types.register("mob", move |_| Box::new(w.create_object(VirtualKind::Mob))));
        let w = world.clone();
        assert!(!types.register("mob", move |_| Box::new(w.create_object(VirtualKind::Mob))));
        assert_eq!(types.len(), 1);
    }
}
