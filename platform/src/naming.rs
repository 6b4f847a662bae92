//! Named-resource naming scheme.
//!
//! All cross-process named resources funnel their names through one
//! abstraction: a (company, subsystem, resource) triple, optionally
//! qualified by an owning process id, from which a platform-legal full
//! name is derived per resource type. Two processes naming the same
//! triple reach the same underlying object; the per-type cache keeps
//! repeated derivations O(1).

use alloc::string::{String, ToString};
use alloc::format;
use spin::Mutex;

use crate::error::{KernelError, Result};

/// The resource kinds a name can be derived for. The kind affects the
/// derived full-name suffix so an event and a mutex built from the same
/// triple never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    /// Event semaphore.
    Event,
    /// Mutex semaphore.
    Mutex,
    /// Counting semaphore.
    Semaphore,
    /// Shared memory region.
    Memory,
}

impl ResourceType {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            ResourceType::Event => 0,
            ResourceType::Mutex => 1,
            ResourceType::Semaphore => 2,
            ResourceType::Memory => 3,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ResourceType::Event => "Evt",
            ResourceType::Mutex => "Mtx",
            ResourceType::Semaphore => "Sem",
            ResourceType::Memory => "Mem",
        }
    }
}

/// A logical resource name: (company, subsystem, resource) plus an
/// optional owning process id.
///
/// Equality is defined over the triple and process id, never over the
/// cached derived strings.
pub struct ResourceName {
    company: String,
    subsystem: String,
    resource: String,
    process_id: Option<u64>,
    /// Raw platform name this object wraps, if constructed from one.
    raw: Option<String>,
    /// Derived full names, cached per resource type.
    cache: Mutex<[Option<String>; ResourceType::COUNT]>,
}

impl ResourceName {
    /// Build and validate a name from its triple.
    pub fn new(company: &str, subsystem: &str, resource: &str) -> Result<Self> {
        Self::with_process(company, subsystem, resource, None)
    }

    /// Build and validate a name from its triple plus an owning process id.
    pub fn with_process(
        company: &str,
        subsystem: &str,
        resource: &str,
        process_id: Option<u64>,
    ) -> Result<Self> {
        validate_component(company)?;
        validate_component(subsystem)?;
        validate_component(resource)?;
        Ok(ResourceName {
            company: company.to_string(),
            subsystem: subsystem.to_string(),
            resource: resource.to_string(),
            process_id,
            raw: None,
            cache: Mutex::new([None, None, None, None]),
        })
    }

    /// Wrap an existing raw platform name. No derivation happens; the raw
    /// string is handed back for every resource type.
    pub fn from_raw(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(KernelError::bad_parms());
        }
        Ok(ResourceName {
            company: String::new(),
            subsystem: String::new(),
            resource: String::new(),
            process_id: None,
            raw: Some(raw.to_string()),
            cache: Mutex::new([None, None, None, None]),
        })
    }

    /// Replace the triple, revalidating and dropping any cached strings.
    pub fn set_name(
        &mut self,
        company: &str,
        subsystem: &str,
        resource: &str,
        process_id: Option<u64>,
    ) -> Result<()> {
        validate_component(company)?;
        validate_component(subsystem)?;
        validate_component(resource)?;
        self.company = company.to_string();
        self.subsystem = subsystem.to_string();
        self.resource = resource.to_string();
        self.process_id = process_id;
        self.raw = None;
        *self.cache.lock() = [None, None, None, None];
        Ok(())
    }

    /// The platform-legal full name for the given resource type. Derived
    /// once per type and cached.
    pub fn full_name(&self, res_type: ResourceType) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut cache = self.cache.lock();
        let slot = &mut cache[res_type.index()];
        if let Some(name) = slot {
            return name.clone();
        }
        let derived = match self.process_id {
            Some(pid) => format!(
                "{}.{}.{}.{}.{}",
                self.company,
                self.subsystem,
                self.resource,
                res_type.suffix(),
                pid
            ),
            None => format!(
                "{}.{}.{}.{}",
                self.company, self.subsystem, self.resource,
                res_type.suffix()
            ),
        };
        *slot = Some(derived.clone());
        derived
    }

    /// Company component of the triple.
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Subsystem component of the triple.
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// Resource component of the triple.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Owning process id, if any.
    pub fn process_id(&self) -> Option<u64> {
        self.process_id
    }
}

impl PartialEq for ResourceName {
    fn eq(&self, other: &Self) -> bool {
        self.company == other.company
            && self.subsystem == other.subsystem
            && self.resource == other.resource
            && self.process_id == other.process_id
            && self.raw == other.raw
    }
}

impl Eq for ResourceName {}

impl Clone for ResourceName {
    fn clone(&self) -> Self {
        // Cached derivations are cheap to redo, so they are not carried
        ResourceName {
            company: self.company.clone(),
            subsystem: self.subsystem.clone(),
            resource: self.resource.clone(),
            process_id: self.process_id,
            raw: self.raw.clone(),
            cache: Mutex::new([None, None, None, None]),
        }
    }
}

impl core::fmt::Debug for ResourceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.raw {
            Some(raw) => write!(f, "ResourceName(raw: {})", raw),
            None => write!(
                f,
                "ResourceName({}.{}.{})",
                self.company, self.subsystem, self.resource
            ),
        }
    }
}

/// Components must be non-empty and restricted to characters every
/// supported platform accepts in an object name.
fn validate_component(component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(KernelError::bad_parms());
    }
    let legal = component
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !legal {
        return Err(KernelError::bad_parms());
    }
    Ok(())
}
