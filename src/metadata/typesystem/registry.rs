//! Staged type registry.
//!
//! Staging happens in two phases. [`StagedRegistry::stage`] creates the record of a type and
//! its shape (name, attributes, base type, interfaces) through the type chain of the
//! [`crate::filter::FilterHost`], and caches it before anything else happens.
//! [`StagedRegistry::materialize`] then populates the members through the member chain,
//! exactly once.
//!
//! Member population resolves member types through [`crate::Context::resolve_type`], which
//! only ever stages. A type A with a property of type B and a type B with a property of type A
//! therefore stage each other's shape and terminate: nothing calls `materialize` from within
//! `stage`. Re-entrant staging of a name that is still being staged (a base-type cycle) and
//! re-entrant population of a record are rejected with
//! [`crate::Error::CyclicMaterialization`], never queued.
//!
//! `stage` and `materialize` are serialized across threads by one coarse lock. The lock is
//! re-entrant for its owning thread, so only re-entry from the same call stack counts as a
//! cycle; other threads wait for it.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, RwLock,
    },
    thread::{self, ThreadId},
};

use log::debug;

use crate::{
    context::Context,
    metadata::typesystem::{TypeDefinition, TypeReference},
    Error::{CyclicMaterialization, LockError, SymbolNotFound},
    Result,
};

/// Reference to a `TypeInformation`
pub type TypeInformationRc = Arc<TypeInformation>;

/// The staging record of one type
pub struct TypeInformation {
    /// Canonical name, the registry key
    pub full_name: String,
    /// Scope the original was loaded from
    pub source_scope: String,
    /// The original definition, never mutated
    pub original: TypeDefinition,
    /// The staged definition: the shape after staging, the complete type once built
    staged: RwLock<TypeDefinition>,
    /// Member population has completed
    built: AtomicBool,
    /// Member population is running
    populating: AtomicBool,
}

impl TypeInformation {
    /// Returns `true` once the members have been populated
    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    /// A copy of the current staged definition
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the definition lock is poisoned
    pub fn staged(&self) -> Result<TypeDefinition> {
        Ok(read_lock!(self.staged).clone())
    }
}

/// Coarse lock owned by one thread at a time, re-entrant for its owner
#[derive(Default)]
struct StagingLock {
    /// Owning thread and its nesting depth
    owner: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl StagingLock {
    fn acquire(&self) -> Result<StagingGuard<'_>> {
        let current = thread::current().id();
        let mut owner = self.owner.lock().map_err(|_| LockError)?;
        while matches!(*owner, Some((thread, _)) if thread != current) {
            owner = self.released.wait(owner).map_err(|_| LockError)?;
        }
        let depth = owner.map_or(0, |(_, depth)| depth);
        *owner = Some((current, depth + 1));
        Ok(StagingGuard { lock: self })
    }
}

struct StagingGuard<'a> {
    lock: &'a StagingLock,
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut owner) = self.lock.owner.lock() {
            *owner = match *owner {
                Some((thread, depth)) if depth > 1 => Some((thread, depth - 1)),
                _ => None,
            };
            if owner.is_none() {
                self.lock.released.notify_all();
            }
        }
    }
}

/// Memoized, cycle-safe staging of types across module boundaries.
///
/// At most one record exists per canonical name; records persist for the lifetime of the
/// owning [`Context`].
#[derive(Default)]
pub struct StagedRegistry {
    /// All records, keyed by canonical name
    records: RwLock<HashMap<String, TypeInformationRc>>,
    /// Canonical names in staging order
    order: RwLock<Vec<String>>,
    /// Names whose staging is in progress
    staging: RwLock<HashSet<String>>,
    /// Serializes `stage` and `materialize`
    serial: StagingLock,
}

impl StagedRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the registry lock is poisoned
    pub fn len(&self) -> Result<usize> {
        Ok(read_lock!(self.records).len())
    }

    /// Returns `true` if no type was staged yet
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the registry lock is poisoned
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_lock!(self.records).is_empty())
    }

    /// Returns `true` if a record for `full_name` exists
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the registry lock is poisoned
    pub fn contains(&self, full_name: &str) -> Result<bool> {
        Ok(read_lock!(self.records).contains_key(full_name))
    }

    /// The record for `full_name`, if one exists
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the registry lock is poisoned
    pub fn get(&self, full_name: &str) -> Result<Option<TypeInformationRc>> {
        Ok(read_lock!(self.records).get(full_name).cloned())
    }

    /// Returns `true` while the staging of `full_name` is in progress
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the registry lock is poisoned
    pub fn is_staging(&self, full_name: &str) -> Result<bool> {
        Ok(read_lock!(self.staging).contains(full_name))
    }

    /// All records in staging order
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a registry lock is poisoned
    pub fn records(&self) -> Result<Vec<TypeInformationRc>> {
        let order = read_lock!(self.order).clone();
        let records = read_lock!(self.records);
        Ok(order
            .iter()
            .filter_map(|name| records.get(name).cloned())
            .collect())
    }

    /// Stage the type named by `reference`, or return its existing record.
    ///
    /// The owning module is located through the assembly cache of `ctx`, the shape is built
    /// by the type chain of its filter host. A failure inserts nothing.
    ///
    /// # Errors
    /// - [`crate::Error::SymbolNotFound`] if the owning module or the type cannot be located
    /// - [`crate::Error::CyclicMaterialization`] if the type is already being staged
    /// - any error of the type chain
    pub fn stage(&self, reference: &TypeReference, ctx: &Context) -> Result<TypeInformationRc> {
        let _serial = self.serial.acquire()?;
        let element = reference.element();
        let name = element
            .type_name()
            .ok_or_else(|| SymbolNotFound(reference.full_name()))?;
        let full_name = name.full_name();

        if let Some(record) = self.get(&full_name)? {
            return Ok(record);
        }

        if !write_lock!(self.staging).insert(full_name.clone()) {
            return Err(CyclicMaterialization(full_name));
        }

        let staged = ctx
            .cache()
            .get_module(&name.scope)
            .and_then(|module| module.find_type(&full_name).cloned())
            .ok_or_else(|| SymbolNotFound(full_name.clone()))
            .and_then(|original| {
                let shape = ctx.filters().create_type(&original, &name.scope, ctx)?;
                Ok((original, shape))
            });

        write_lock!(self.staging).remove(&full_name);
        let (original, shape) = staged?;

        debug!("staged {} from {}", full_name, name.scope);
        let record = Arc::new(TypeInformation {
            full_name: full_name.clone(),
            source_scope: name.scope.clone(),
            original,
            staged: RwLock::new(shape),
            built: AtomicBool::new(false),
            populating: AtomicBool::new(false),
        });

        write_lock!(self.records).insert(full_name.clone(), record.clone());
        write_lock!(self.order).push(full_name);
        Ok(record)
    }

    /// Stage the type named by `reference` and populate its members, once.
    ///
    /// Repeated calls return the same record without running the member chain again.
    ///
    /// # Errors
    /// - any error of [`StagedRegistry::stage`]
    /// - [`crate::Error::CyclicMaterialization`] if the members of this record are being
    ///   populated already
    /// - any error of the member chain, in which case the record stays unbuilt
    pub fn materialize(
        &self,
        reference: &TypeReference,
        ctx: &Context,
    ) -> Result<TypeInformationRc> {
        let _serial = self.serial.acquire()?;
        let record = self.stage(reference, ctx)?;
        if record.is_built() {
            return Ok(record);
        }

        // Staged verbatim, members included
        if ctx.config().is_passthrough(&record.source_scope) {
            record.built.store(true, Ordering::Release);
            return Ok(record);
        }

        if record.populating.swap(true, Ordering::AcqRel) {
            return Err(CyclicMaterialization(record.full_name.clone()));
        }

        let populated = record
            .staged()
            .and_then(|shape| ctx.filters().create_members(shape, &record.original, ctx));
        record.populating.store(false, Ordering::Release);
        let populated = populated?;

        *write_lock!(record.staged) = populated;
        record.built.store(true, Ordering::Release);
        debug!("materialized {}", record.full_name);
        Ok(record)
    }

    /// Names of all records whose members were not populated yet, in staging order
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if a registry lock is poisoned
    pub fn unbuilt(&self) -> Result<Vec<TypeInformationRc>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|record| !record.is_built())
            .collect())
    }
}
