use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::component::Component;

/// Dense key of a registered component type. Usable directly as an index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

type Constructor = fn() -> Box<dyn Component>;

fn construct_default<T: Component + Default>() -> Box<dyn Component> {
    Box::new(T::default())
}

struct TypeInfo {
    type_id: TypeId,
    name: &'static str,
    /// Builds a pristine instance for type-erased attachment.
    constructor: Option<Constructor>,
}

/// Assigns a stable key to each component type.
///
/// Keys are handed out in registration order and never change for the lifetime of
/// the registry.
#[derive(Default)]
pub struct ComponentTypeRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    infos: Vec<TypeInfo>,
}

impl ComponentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its key. Idempotent.
    pub fn register<T: Component>(&mut self) -> ComponentTypeId {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.by_type.get(&type_id) {
            return id;
        }
        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(TypeInfo {
            type_id,
            name: type_name::<T>(),
            constructor: None,
        });
        self.by_type.insert(type_id, id);
        id
    }

    /// Register `T` together with its `Default` prototype so it can be constructed
    /// from its key alone.
    pub fn register_default<T: Component + Default>(&mut self) -> ComponentTypeId {
        let id = self.register::<T>();
        self.infos[id.index()].constructor = Some(construct_default::<T>);
        id
    }

    /// Look up the key for `T` without registering it.
    pub fn get<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// The key for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn id_of<T: Component>(&self) -> ComponentTypeId {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "component type `{}` is not registered",
                type_name::<T>()
            )
        })
    }

    /// Whether `id` belongs to type `T`.
    pub fn is<T: Component>(&self, id: ComponentTypeId) -> bool {
        self.infos
            .get(id.index())
            .is_some_and(|info| info.type_id == TypeId::of::<T>())
    }

    /// Full type name of a registered type.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this registry.
    pub fn name(&self, id: ComponentTypeId) -> &'static str {
        self.info(id).name
    }

    /// Build a fresh instance of the type behind `id` from its prototype.
    ///
    /// # Panics
    ///
    /// Panics if the type was registered without a prototype.
    pub fn construct(&self, id: ComponentTypeId) -> Box<dyn Component> {
        let info = self.info(id);
        let constructor = info.constructor.unwrap_or_else(|| {
            panic!(
                "component type `{}` has no default prototype; register it with register_default",
                info.name
            )
        });
        constructor()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn info(&self, id: ComponentTypeId) -> &TypeInfo {
        self.infos
            .get(id.index())
            .unwrap_or_else(|| panic!("{id:?} is not registered"))
    }
}
