//! Class descriptors and the process-wide type registry.
//!
//! Each concrete type gets exactly one [`Class`] descriptor, created
//! lazily the first time [`class_of`] is called for it and kept for the
//! life of the process. Creation is double-checked: an unlocked read,
//! then the write lock, then a re-check before the descriptor is built.
//! Descendant checks walk the static parent chain recorded at
//! registration.

use hashbrown::HashMap;
use spin::RwLock;

use alloc::boxed::Box;

/// Singleton descriptor of one concrete type.
#[derive(Debug)]
pub struct Class {
    name: &'static str,
    parent: Option<&'static Class>,
}

impl Class {
    /// The type's registered name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parent type's descriptor, if any.
    pub fn parent(&self) -> Option<&'static Class> {
        self.parent
    }

    /// Exact-type equality.
    pub fn is_a(&self, other: &Class) -> bool {
        core::ptr::eq(self, other)
    }

    /// True if `candidate` is this type or any ancestor of it, walking
    /// the parent chain up to the root.
    pub fn is_descendant_of(&self, candidate: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.is_a(candidate) {
                return true;
            }
            current = class.parent;
        }
        false
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self, other)
    }
}

impl Eq for Class {}

impl core::fmt::Display for Class {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}

/// A type that participates in the class registry.
pub trait RttiType {
    /// Registered type name, unique process-wide.
    const TYPE_NAME: &'static str;

    /// The parent type's descriptor. The root returns None.
    fn parent_class() -> Option<&'static Class> {
        None
    }
}

/// Object-safe runtime-type access, for types held behind trait objects.
pub trait RttiObject {
    /// This instance's concrete type descriptor.
    fn type_class(&self) -> &'static Class;

    /// This instance's concrete type name.
    fn type_name(&self) -> &'static str {
        self.type_class().name()
    }
}

static REGISTRY: RwLock<Option<HashMap<&'static str, &'static Class>>> = RwLock::new(None);

/// The singleton descriptor for `T`, registering it on first call.
pub fn class_of<T: RttiType + ?Sized>() -> &'static Class {
    if let Some(registry) = REGISTRY.read().as_ref() {
        if let Some(class) = registry.get(T::TYPE_NAME).copied() {
            return class;
        }
    }

    // Resolve the parent before taking the write lock; the parent's own
    // registration may need it.
    let parent = T::parent_class();

    let mut guard = REGISTRY.write();
    let registry = guard.get_or_insert_with(HashMap::new);
    if let Some(class) = registry.get(T::TYPE_NAME).copied() {
        return class;
    }
    let class: &'static Class = Box::leak(Box::new(Class {
        name: T::TYPE_NAME,
        parent,
    }));
    registry.insert(T::TYPE_NAME, class);
    log::debug!("[Object Rtti] Registered class '{}'", T::TYPE_NAME);
    class
}

/// Look up a descriptor by registered name.
pub fn class_by_name(name: &str) -> Option<&'static Class> {
    REGISTRY.read().as_ref()?.get(name).copied()
}

/// Number of registered descriptors.
pub fn registered_count() -> usize {
    REGISTRY.read().as_ref().map_or(0, |r| r.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Base;
    impl RttiType for Base {
        const TYPE_NAME: &'static str = "Rtti.Base";
    }

    struct Middle;
    impl RttiType for Middle {
        const TYPE_NAME: &'static str = "Rtti.Middle";
        fn parent_class() -> Option<&'static Class> {
            Some(class_of::<Base>())
        }
    }

    struct Leaf;
    impl RttiType for Leaf {
        const TYPE_NAME: &'static str = "Rtti.Leaf";
        fn parent_class() -> Option<&'static Class> {
            Some(class_of::<Middle>())
        }
    }

    struct Stranger;
    impl RttiType for Stranger {
        const TYPE_NAME: &'static str = "Rtti.Stranger";
    }

    #[test]
    fn test_descriptor_is_singleton() {
        let a = class_of::<Base>();
        let b = class_of::<Base>();
        assert!(core::ptr::eq(a, b));
        assert_eq!(a.name(), "Rtti.Base");
    }

    #[test]
    fn test_parent_chain() {
        let leaf = class_of::<Leaf>();
        let middle = class_of::<Middle>();
        let base = class_of::<Base>();

        assert!(leaf.is_a(leaf));
        assert!(!leaf.is_a(middle));

        assert!(leaf.is_descendant_of(leaf));
        assert!(leaf.is_descendant_of(middle));
        assert!(leaf.is_descendant_of(base));
        assert!(!base.is_descendant_of(leaf));
        assert!(!leaf.is_descendant_of(class_of::<Stranger>()));
    }

    #[test]
    fn test_lookup_by_name() {
        class_of::<Base>();
        let found = class_by_name("Rtti.Base").unwrap();
        assert!(found.is_a(class_of::<Base>()));
        assert!(class_by_name("Rtti.Nowhere").is_none());
    }

    #[test]
    fn test_concurrent_first_access_registers_once() {
        struct Contested;
        impl RttiType for Contested {
            const TYPE_NAME: &'static str = "Rtti.Contested";
        }

        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| class_of::<Contested>() as *const Class as usize))
            .collect();
        let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // Every thread saw the same singleton
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }
}
