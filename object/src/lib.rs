//! Ferrox object runtime.
//!
//! The framework-level object model layered over the platform crate:
//! lazy singleton class descriptors with descendant checks, a dynamic
//! type factory for rebuilding polymorphic instances from streamed type
//! names, a polymorphic duplication contract with narrowing-cast
//! verification, bracketed versioned binary streaming, and a manual
//! reference-counting mixin.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod class;
pub mod dup;
pub mod error;
pub mod factory;
pub mod refcnt;
pub mod stream;

pub use class::{class_by_name, class_of, registered_count, Class, RttiObject, RttiType};
pub use dup::{downcast_dup, test_can_dup_to, Duplicable};
pub use error::{ObjResult, ObjectError};
pub use factory::{is_registered, make_new, register, stream_poly_from, stream_poly_to, PolyStream};
pub use refcnt::RefCount;
pub use stream::{BinInStream, BinOutStream, StreamError, StreamMarker, Streamable};
