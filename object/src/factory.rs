//! Dynamic type factory and polymorphic streaming.
//!
//! Deserializers that find a type name in a stream need to turn it back
//! into a live instance of the right concrete type. Types register a
//! zero-argument factory keyed by their name; framed streaming writes
//! the name ahead of the payload and uses the registry to rebuild the
//! object on the way back in.

use alloc::boxed::Box;
use alloc::string::ToString;
use hashbrown::HashMap;
use spin::RwLock;

use crate::class::{class_of, RttiObject, RttiType};
use crate::error::{ObjResult, ObjectError};
use crate::stream::{BinInStream, BinOutStream, StreamMarker, Streamable};

/// An object that can be streamed polymorphically: typed at runtime and
/// able to read or write itself.
pub trait PolyStream: RttiObject + Streamable {
    fn as_any(&self) -> &dyn core::any::Any;
}

impl<T: RttiObject + Streamable + 'static> PolyStream for T {
    fn as_any(&self) -> &dyn core::any::Any {
        self
    }
}

impl core::fmt::Debug for dyn PolyStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PolyStream({})", self.type_name())
    }
}

type Factory = fn() -> Box<dyn PolyStream>;

static FACTORIES: RwLock<Option<HashMap<&'static str, Factory>>> = RwLock::new(None);

fn make_instance<T>() -> Box<dyn PolyStream>
where
    T: PolyStream + Default + 'static,
{
    Box::new(T::default())
}

/// Register `T`'s factory under its type name. Re-registration is a
/// no-op. Also forces the type's class descriptor into the registry.
pub fn register<T>()
where
    T: PolyStream + RttiType + Default + 'static,
{
    class_of::<T>();
    let mut guard = FACTORIES.write();
    let factories = guard.get_or_insert_with(HashMap::new);
    if factories
        .insert(T::TYPE_NAME, make_instance::<T> as Factory)
        .is_none()
    {
        log::debug!("[Object Factory] Registered factory for '{}'", T::TYPE_NAME);
    }
}

/// Build a default instance of the type registered under `name`.
pub fn make_new(name: &str) -> ObjResult<Box<dyn PolyStream>> {
    let factory = FACTORIES
        .read()
        .as_ref()
        .and_then(|f| f.get(name).copied())
        .ok_or_else(|| ObjectError::UnknownType(name.to_string()))?;
    Ok(factory())
}

/// Whether a factory is registered under `name`.
pub fn is_registered(name: &str) -> bool {
    FACTORIES
        .read()
        .as_ref()
        .is_some_and(|f| f.contains_key(name))
}

/// Write an object with a type-name frame so it can be rebuilt without
/// knowing its concrete type.
pub fn stream_poly_to(object: &dyn PolyStream, out: &mut BinOutStream) {
    out.write_marker(StreamMarker::Frame);
    out.write_string(object.type_name());
    object.stream_to(out);
}

/// Read back a framed object, using the factory registry to instantiate
/// the concrete type named in the frame.
pub fn stream_poly_from(input: &mut BinInStream<'_>) -> ObjResult<Box<dyn PolyStream>> {
    input.check_marker(StreamMarker::Frame)?;
    let name = input.read_string()?;
    let mut object = make_new(&name)?;
    object.stream_from(input)?;
    Ok(object)
}
