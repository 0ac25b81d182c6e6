//! Object registry keyed by LWM2M object id.
//!
//! The registry owns one [`ObjectDispatcher`] per registered object type.
//! It is created with the client, filled at startup, and consulted by the
//! dispatcher for every resource operation. Iteration follows registration
//! order, which is also the order objects are advertised in.
//!
//! # Example
//!
//! ```ignore
//! use iotdm_client::object::{ObjectDescriptor, ObjectRegistry};
//!
//! let mut registry = ObjectRegistry::new();
//! registry.register(ObjectDescriptor::<Server>::new(1).with_instance(server))?;
//! registry.register(ObjectDescriptor::<Device>::new(3).with_instance(device))?;
//!
//! assert!(registry.mandatory_objects_exist());
//! ```

use super::descriptor::{ObjectDispatcher, Operation, ResourcePath};
use super::table::{ObjectInstance, ObjectTable};
use super::ObjectDescriptor;
use crate::codec::DataType;
use crate::error::{DmError, Result};

/// Well-known LWM2M object ids.
pub mod object_ids {
    pub const SECURITY: u16 = 0;
    pub const SERVER: u16 = 1;
    pub const ACCESS_CONTROL: u16 = 2;
    pub const DEVICE: u16 = 3;
    pub const CONNECTIVITY_MONITORING: u16 = 4;
    pub const FIRMWARE: u16 = 5;
    pub const LOCATION: u16 = 6;
    pub const CONNECTIVITY_STATISTICS: u16 = 7;
}

/// Registry mapping object ids to their dispatchers.
pub struct ObjectRegistry {
    objects: ObjectTable<Box<dyn ObjectDispatcher>>,
}

impl ObjectRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            objects: ObjectTable::new(),
        }
    }

    /// Register an object type.
    ///
    /// Registering an id that is already present succeeds without changing
    /// the registry.
    pub fn register<T>(&mut self, descriptor: ObjectDescriptor<T>) -> Result<()>
    where
        T: ObjectInstance + Send + 'static,
    {
        self.register_dispatcher(Box::new(descriptor))
    }

    /// Register a type-erased dispatcher.
    pub fn register_dispatcher(&mut self, dispatcher: Box<dyn ObjectDispatcher>) -> Result<()> {
        self.insert(dispatcher);
        Ok(())
    }

    /// Insert a dispatcher unless its object id is taken.
    pub(crate) fn insert(&mut self, dispatcher: Box<dyn ObjectDispatcher>) -> bool {
        let object_id = dispatcher.object_id();
        let inserted = self.objects.insert(object_id, dispatcher);
        if inserted {
            tracing::debug!("Registered object {}", object_id);
        } else {
            tracing::debug!("Object {} already registered", object_id);
        }
        inserted
    }

    /// Get the dispatcher for an object.
    pub fn lookup(&self, object_id: u16) -> Option<&dyn ObjectDispatcher> {
        self.objects.get(object_id).map(|d| d.as_ref())
    }

    pub(crate) fn lookup_mut(&mut self, object_id: u16) -> Option<&mut Box<dyn ObjectDispatcher>> {
        self.objects.get_mut(object_id)
    }

    /// Check if an object is registered.
    pub fn contains(&self, object_id: u16) -> bool {
        self.objects.contains(object_id)
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registered object ids in registration order.
    pub fn object_ids(&self) -> Vec<u16> {
        self.objects.ids().collect()
    }

    /// Visit every object id in registration order.
    ///
    /// Stops at and returns `false` on the first `false` from `visit`;
    /// returns `true` otherwise, including for an empty registry.
    pub fn for_each_object<F>(&self, mut visit: F) -> bool
    where
        F: FnMut(u16) -> bool,
    {
        self.objects.ids().all(|object_id| visit(object_id))
    }

    /// Get a typed instance.
    ///
    /// Fails with `NotFound` if the object or instance is missing, or if
    /// the object was registered with a different instance type.
    pub fn instance<T: ObjectInstance + Send + 'static>(
        &self,
        object_id: u16,
        instance_id: u16,
    ) -> Result<&T> {
        self.descriptor::<T>(object_id)
            .and_then(|d| d.instance(instance_id))
            .ok_or(DmError::NotFound)
    }

    /// Get a mutable typed instance.
    pub fn instance_mut<T: ObjectInstance + Send + 'static>(
        &mut self,
        object_id: u16,
        instance_id: u16,
    ) -> Result<&mut T> {
        self.descriptor_mut::<T>(object_id)
            .and_then(|d| d.instance_mut(instance_id))
            .ok_or(DmError::NotFound)
    }

    /// Add an instance to a registered object.
    pub fn add_instance<T: ObjectInstance + Send + 'static>(
        &mut self,
        object_id: u16,
        instance: T,
    ) -> Result<()> {
        let descriptor = self
            .descriptor_mut::<T>(object_id)
            .ok_or(DmError::NotFound)?;
        let instance_id = instance.instance_id();
        if descriptor.add_instance(instance) {
            Ok(())
        } else {
            Err(DmError::InvalidArgument(format!(
                "instance /{}/{} already exists",
                object_id, instance_id
            )))
        }
    }

    fn descriptor<T: ObjectInstance + Send + 'static>(
        &self,
        object_id: u16,
    ) -> Option<&ObjectDescriptor<T>> {
        self.objects
            .get(object_id)?
            .as_any()
            .downcast_ref::<ObjectDescriptor<T>>()
    }

    fn descriptor_mut<T: ObjectInstance + Send + 'static>(
        &mut self,
        object_id: u16,
    ) -> Option<&mut ObjectDescriptor<T>> {
        self.objects
            .get_mut(object_id)?
            .as_any_mut()
            .downcast_mut::<ObjectDescriptor<T>>()
    }

    /// Number of properties of an object that permit `op`.
    ///
    /// `None` if the object is not registered.
    pub fn property_count(&self, object_id: u16, op: Operation) -> Option<u16> {
        let dispatcher = self.lookup(object_id)?;
        let count = dispatcher
            .allowed_operations()
            .iter()
            .filter(|entry| entry.permits(op))
            .count();
        Some(u16::try_from(count).unwrap_or(u16::MAX))
    }

    /// Id of the `index`-th property permitting `op`, in declaration order.
    pub fn property_at(&self, object_id: u16, op: Operation, index: usize) -> Option<u16> {
        self.lookup(object_id)?
            .allowed_operations()
            .iter()
            .filter(|entry| entry.permits(op))
            .nth(index)
            .map(|entry| entry.property_id)
    }

    /// Declared type of a property, `Undefined` if unknown.
    pub fn property_type(&self, object_id: u16, property_id: u16) -> DataType {
        self.lookup(object_id)
            .and_then(|d| {
                d.allowed_operations()
                    .iter()
                    .find(|entry| entry.property_id == property_id)
            })
            .map(|entry| entry.data_type)
            .unwrap_or(DataType::Undefined)
    }

    /// Poll the change signaller of every instance of every object.
    pub fn signal_all_resource_changes(&mut self) -> Vec<ResourcePath> {
        let mut changed = Vec::new();
        for (_, dispatcher) in self.objects.iter_mut() {
            changed.extend(dispatcher.signal_changes());
        }
        if !changed.is_empty() {
            tracing::debug!("{} resources changed", changed.len());
        }
        changed
    }

    /// Check that the LWM2M Server and Device objects are registered.
    pub fn mandatory_objects_exist(&self) -> bool {
        [object_ids::SERVER, object_ids::DEVICE]
            .iter()
            .all(|&object_id| self.contains(object_id))
    }

    /// Drop every object and its instances.
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
