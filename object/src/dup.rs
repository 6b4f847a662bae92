//! Polymorphic duplication.
//!
//! Collections holding heterogeneous elements behind a base trait need
//! to copy an element without knowing its concrete type. [`Duplicable`]
//! centralizes the copy, and [`test_can_dup_to`] centralizes the
//! narrowing check every such call site would otherwise reinvent.

use alloc::boxed::Box;
use core::any::Any;

use crate::class::{class_of, Class, RttiObject, RttiType};
use crate::error::{ObjResult, ObjectError};

/// A type that can produce a heap-allocated deep copy of its concrete
/// runtime self through a base reference.
pub trait Duplicable: RttiObject {
    /// Deep-copy the concrete instance.
    fn duplicate(&self) -> Box<dyn Duplicable>;

    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Verify that a duplicated object received through a narrower expected
/// type is actually usable as that type. Fails on a null source or when
/// the source's runtime type is not a descendant of `expected`.
pub fn test_can_dup_to(source: Option<&dyn Duplicable>, expected: &Class) -> ObjResult<()> {
    let source = source.ok_or(ObjectError::NullSource)?;
    if !source.type_class().is_descendant_of(expected) {
        return Err(ObjectError::BadCast {
            expected: expected.name(),
            actual: source.type_name(),
        });
    }
    Ok(())
}

/// Downcast a duplicated object to its exact concrete type, reporting
/// both type names on mismatch.
pub fn downcast_dup<T: RttiType + 'static>(source: Box<dyn Duplicable>) -> ObjResult<Box<T>> {
    let actual = source.type_name();
    source.into_any().downcast::<T>().map_err(|_| ObjectError::BadCast {
        expected: class_of::<T>().name(),
        actual,
    })
}
