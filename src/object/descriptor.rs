//! Declarative object definitions.
//!
//! An [`ObjectDescriptor`] lists the properties of one LWM2M object type,
//! the operations each permits, and the typed callbacks that serve them.
//! It owns the object's instance table and, once registered, is driven by
//! the registry through the type-erased [`ObjectDispatcher`] trait.
//!
//! # Example
//!
//! ```
//! use iotdm_client::codec::Time;
//! use iotdm_client::object::{ObjectDescriptor, ObjectDispatcher, ObjectInstance};
//!
//! struct Device {
//!     id: u16,
//!     battery: i64,
//!     clock: i64,
//! }
//!
//! impl ObjectInstance for Device {
//!     fn instance_id(&self) -> u16 {
//!         self.id
//!     }
//! }
//!
//! let device = ObjectDescriptor::<Device>::new(3)
//!     .readable(9, |d| Ok(d.battery))
//!     .read_write(
//!         13,
//!         |d| Ok(Time(d.clock)),
//!         |d, t: Time| {
//!             d.clock = t.0;
//!             Ok(())
//!         },
//!     )
//!     .executable(4, |_d| Ok(()))
//!     .with_instance(Device { id: 0, battery: 100, clock: 0 });
//!
//! assert_eq!(device.allowed_operations().len(), 3);
//! ```

use std::any::Any;
use std::collections::HashMap;

use super::table::{ObjectInstance, ObjectTable};
use crate::codec::{DataType, Marshal, Value};
use crate::error::{CallbackError, CallbackResult};
use crate::protocol::StatusCode;

/// Permission bits for a property.
pub mod ops {
    pub const NONE: u8 = 0b0000_0000;
    pub const READ: u8 = 0b0000_0001;
    pub const WRITE: u8 = 0b0000_0010;
    pub const EXECUTE: u8 = 0b0000_0100;

    pub const READ_WRITE: u8 = READ | WRITE;

    /// Check if a specific bit is set.
    #[inline]
    pub fn has_flag(mask: u8, flag: u8) -> bool {
        mask & flag != 0
    }
}

/// A resource operation requested by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
    Execute,
}

impl Operation {
    /// The permission bit guarding this operation.
    pub fn flag(self) -> u8 {
        match self {
            Operation::Read => ops::READ,
            Operation::Write => ops::WRITE,
            Operation::Execute => ops::EXECUTE,
        }
    }

    /// Status reported when the callback succeeds.
    pub fn success_status(self) -> StatusCode {
        match self {
            Operation::Read => StatusCode::Content,
            Operation::Write | Operation::Execute => StatusCode::Changed,
        }
    }
}

/// One entry of an object's permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedOperation {
    pub property_id: u16,
    /// Bitmask of [`ops`] flags.
    pub ops: u8,
    pub data_type: DataType,
}

impl AllowedOperation {
    pub fn permits(&self, op: Operation) -> bool {
        ops::has_flag(self.ops, op.flag())
    }
}

/// Address of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourcePath {
    pub object_id: u16,
    pub instance_id: u16,
    pub resource_id: u16,
}

impl ResourcePath {
    pub fn new(object_id: u16, instance_id: u16, resource_id: u16) -> Self {
        Self {
            object_id,
            instance_id,
            resource_id,
        }
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/{}/{}/{}",
            self.object_id, self.instance_id, self.resource_id
        )
    }
}

type ReadFn<T> = Box<dyn Fn(&T) -> CallbackResult<Value> + Send>;
type WriteFn<T> = Box<dyn Fn(&mut T, &Value) -> CallbackResult<()> + Send>;
type ExecFn<T> = Box<dyn Fn(&mut T) -> CallbackResult<()> + Send>;
type ChangeFn<T> = Box<dyn Fn(&mut T) -> Vec<u16> + Send>;

/// Builder and runtime table for one object type.
pub struct ObjectDescriptor<T> {
    object_id: u16,
    allowed: Vec<AllowedOperation>,
    readers: HashMap<u16, ReadFn<T>>,
    writers: HashMap<u16, WriteFn<T>>,
    executors: HashMap<u16, ExecFn<T>>,
    on_change: Option<ChangeFn<T>>,
    instances: ObjectTable<T>,
}

impl<T: ObjectInstance + Send + 'static> ObjectDescriptor<T> {
    /// Start describing the object with the given id.
    pub fn new(object_id: u16) -> Self {
        Self {
            object_id,
            allowed: Vec::new(),
            readers: HashMap::new(),
            writers: HashMap::new(),
            executors: HashMap::new(),
            on_change: None,
            instances: ObjectTable::new(),
        }
    }

    /// Declare permission bits for a property without attaching callbacks.
    ///
    /// Operations declared here but never given a callback answer
    /// `NotImplemented`. Declaring the same property again adds bits; the
    /// first declared type is kept.
    pub fn declare(mut self, property_id: u16, op_mask: u8, data_type: DataType) -> Self {
        self.allow(property_id, op_mask, data_type);
        self
    }

    fn allow(&mut self, property_id: u16, op_mask: u8, data_type: DataType) {
        match self
            .allowed
            .iter_mut()
            .find(|entry| entry.property_id == property_id)
        {
            Some(entry) => entry.ops |= op_mask,
            None => self.allowed.push(AllowedOperation {
                property_id,
                ops: op_mask,
                data_type,
            }),
        }
    }

    /// Add a read-only property served by `getter`.
    pub fn readable<V, F>(mut self, property_id: u16, getter: F) -> Self
    where
        V: Marshal + 'static,
        F: Fn(&T) -> CallbackResult<V> + Send + 'static,
    {
        self.allow(property_id, ops::READ, V::DATA_TYPE);
        self.readers.insert(
            property_id,
            Box::new(move |instance: &T| getter(instance).map(Marshal::into_value)),
        );
        self
    }

    /// Add a write-only property served by `setter`.
    ///
    /// The setter only runs when the incoming value parses as `V`.
    pub fn writable<V, F>(mut self, property_id: u16, setter: F) -> Self
    where
        V: Marshal + 'static,
        F: Fn(&mut T, V) -> CallbackResult<()> + Send + 'static,
    {
        self.allow(property_id, ops::WRITE, V::DATA_TYPE);
        self.writers.insert(
            property_id,
            Box::new(move |instance: &mut T, value: &Value| {
                let parsed = V::from_value(value)?;
                setter(instance, parsed)
            }),
        );
        self
    }

    /// Add a property that can be both read and written.
    pub fn read_write<V, G, S>(self, property_id: u16, getter: G, setter: S) -> Self
    where
        V: Marshal + 'static,
        G: Fn(&T) -> CallbackResult<V> + Send + 'static,
        S: Fn(&mut T, V) -> CallbackResult<()> + Send + 'static,
    {
        self.readable(property_id, getter)
            .writable(property_id, setter)
    }

    /// Add an executable property.
    pub fn executable<F>(mut self, property_id: u16, action: F) -> Self
    where
        F: Fn(&mut T) -> CallbackResult<()> + Send + 'static,
    {
        self.allow(property_id, ops::EXECUTE, DataType::Undefined);
        self.executors.insert(property_id, Box::new(action));
        self
    }

    /// Set the change signaller, polled once per work cycle for every
    /// instance. It returns the ids of properties whose value changed.
    pub fn on_change<F>(mut self, signal: F) -> Self
    where
        F: Fn(&mut T) -> Vec<u16> + Send + 'static,
    {
        self.on_change = Some(Box::new(signal));
        self
    }

    /// Add an instance. An instance whose id is already present is dropped.
    pub fn with_instance(mut self, instance: T) -> Self {
        self.add_instance(instance);
        self
    }

    /// Add an instance to an existing descriptor.
    pub fn add_instance(&mut self, instance: T) -> bool {
        let id = instance.instance_id();
        let added = self.instances.insert_instance(instance);
        if !added {
            tracing::warn!("Object {} already has instance {}", self.object_id, id);
        }
        added
    }

    pub fn instance(&self, instance_id: u16) -> Option<&T> {
        self.instances.get(instance_id)
    }

    pub fn instance_mut(&mut self, instance_id: u16) -> Option<&mut T> {
        self.instances.get_mut(instance_id)
    }

    pub fn instances(&self) -> &ObjectTable<T> {
        &self.instances
    }
}

/// Type-erased view of an [`ObjectDescriptor`] used by the registry.
///
/// Callers are expected to have checked the instance and permission table;
/// the callback methods only resolve the callback itself.
pub trait ObjectDispatcher: Send {
    fn object_id(&self) -> u16;

    /// Permission table in declaration order.
    fn allowed_operations(&self) -> &[AllowedOperation];

    fn has_instance(&self, instance_id: u16) -> bool;

    fn instance_ids(&self) -> Vec<u16>;

    /// Invoke the read callback. A property with no callback is `NotImplemented`.
    fn read(&self, instance_id: u16, property_id: u16) -> CallbackResult<Value>;

    fn write(&mut self, instance_id: u16, property_id: u16, value: &Value) -> CallbackResult<()>;

    fn execute(&mut self, instance_id: u16, property_id: u16) -> CallbackResult<()>;

    /// Poll the change signaller on every instance.
    fn signal_changes(&mut self) -> Vec<ResourcePath>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn missing_instance(object_id: u16, instance_id: u16) -> CallbackError {
    CallbackError::Failed(format!("instance /{}/{} vanished", object_id, instance_id))
}

impl<T: ObjectInstance + Send + 'static> ObjectDispatcher for ObjectDescriptor<T> {
    fn object_id(&self) -> u16 {
        self.object_id
    }

    fn allowed_operations(&self) -> &[AllowedOperation] {
        &self.allowed
    }

    fn has_instance(&self, instance_id: u16) -> bool {
        self.instances.contains(instance_id)
    }

    fn instance_ids(&self) -> Vec<u16> {
        self.instances.ids().collect()
    }

    fn read(&self, instance_id: u16, property_id: u16) -> CallbackResult<Value> {
        let reader = self
            .readers
            .get(&property_id)
            .ok_or(CallbackError::NotImplemented)?;
        let instance = self
            .instances
            .get(instance_id)
            .ok_or_else(|| missing_instance(self.object_id, instance_id))?;
        reader(instance)
    }

    fn write(&mut self, instance_id: u16, property_id: u16, value: &Value) -> CallbackResult<()> {
        let writer = self
            .writers
            .get(&property_id)
            .ok_or(CallbackError::NotImplemented)?;
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| missing_instance(self.object_id, instance_id))?;
        writer(instance, value)
    }

    fn execute(&mut self, instance_id: u16, property_id: u16) -> CallbackResult<()> {
        let action = self
            .executors
            .get(&property_id)
            .ok_or(CallbackError::NotImplemented)?;
        let instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| missing_instance(self.object_id, instance_id))?;
        action(instance)
    }

    fn signal_changes(&mut self) -> Vec<ResourcePath> {
        let Some(signal) = &self.on_change else {
            return Vec::new();
        };

        let object_id = self.object_id;
        let mut changed = Vec::new();
        for (instance_id, instance) in self.instances.iter_mut() {
            changed.extend(
                signal(instance)
                    .into_iter()
                    .map(|resource_id| ResourcePath::new(object_id, instance_id, resource_id)),
            );
        }
        changed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
