//! Resource operation dispatch.
//!
//! Every operation follows the same path:
//! 1. Resolve the object, else 4.04
//! 2. Resolve the instance, else 4.04
//! 3. Find the property in the permission table, else 4.04; if the
//!    operation bit is unset, 4.05
//! 4. Invoke the typed callback
//! 5. Map the callback result to a status code
//!
//! Dispatch never panics; every failure is reported as a [`StatusCode`].

use super::descriptor::{AllowedOperation, ObjectDispatcher, Operation};
use super::ObjectRegistry;
use crate::codec::Value;
use crate::error::CallbackError;
use crate::protocol::StatusCode;

/// Result of a single dispatch: the success payload or the failure status.
pub type DispatchResult<T> = std::result::Result<T, StatusCode>;

/// Results of a multi-property operation.
///
/// Processing stops at the first failure. `results` holds everything that
/// succeeded before it and `status` reports the failure, or the success
/// status if every property was processed.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResult<T> {
    pub results: Vec<T>,
    pub status: StatusCode,
}

impl<T> BulkResult<T> {
    /// True if every requested property succeeded.
    pub fn is_complete(&self) -> bool {
        self.status.is_success()
    }
}

fn resolve<'a>(
    dispatcher: &'a dyn ObjectDispatcher,
    instance_id: u16,
    property_id: u16,
    op: Operation,
) -> DispatchResult<&'a AllowedOperation> {
    if !dispatcher.has_instance(instance_id) {
        return Err(StatusCode::NotFound);
    }

    let entry = dispatcher
        .allowed_operations()
        .iter()
        .find(|entry| entry.property_id == property_id)
        .ok_or(StatusCode::NotFound)?;

    if entry.permits(op) {
        Ok(entry)
    } else {
        Err(StatusCode::MethodNotAllowed)
    }
}

fn map_callback<T>(
    path: (u16, u16, u16),
    op: Operation,
    result: Result<T, CallbackError>,
) -> DispatchResult<T> {
    result.map_err(|err| {
        let status = StatusCode::from(&err);
        tracing::debug!(
            "{:?} /{}/{}/{} failed: {} ({})",
            op,
            path.0,
            path.1,
            path.2,
            err,
            status
        );
        status
    })
}

impl ObjectRegistry {
    /// Read one resource. Success is 2.05 Content with the value.
    pub fn read(
        &self,
        object_id: u16,
        instance_id: u16,
        property_id: u16,
    ) -> DispatchResult<Value> {
        let dispatcher = self.lookup(object_id).ok_or(StatusCode::NotFound)?;
        resolve(dispatcher, instance_id, property_id, Operation::Read)?;

        map_callback(
            (object_id, instance_id, property_id),
            Operation::Read,
            dispatcher.read(instance_id, property_id),
        )
    }

    /// Write one resource. Success is 2.04 Changed.
    ///
    /// A value that does not parse as the property's type is 4.00 and the
    /// setter is never called.
    pub fn write(
        &mut self,
        object_id: u16,
        instance_id: u16,
        property_id: u16,
        value: &Value,
    ) -> DispatchResult<()> {
        let dispatcher = self.lookup_mut(object_id).ok_or(StatusCode::NotFound)?;
        resolve(&**dispatcher, instance_id, property_id, Operation::Write)?;

        map_callback(
            (object_id, instance_id, property_id),
            Operation::Write,
            dispatcher.write(instance_id, property_id, value),
        )
    }

    /// Execute one resource. Success is 2.04 Changed.
    pub fn execute(
        &mut self,
        object_id: u16,
        instance_id: u16,
        property_id: u16,
    ) -> DispatchResult<()> {
        let dispatcher = self.lookup_mut(object_id).ok_or(StatusCode::NotFound)?;
        resolve(&**dispatcher, instance_id, property_id, Operation::Execute)?;

        map_callback(
            (object_id, instance_id, property_id),
            Operation::Execute,
            dispatcher.execute(instance_id, property_id),
        )
    }

    /// Status code for a single dispatch outcome.
    pub fn status_of<T>(op: Operation, result: &DispatchResult<T>) -> StatusCode {
        match result {
            Ok(_) => op.success_status(),
            Err(status) => *status,
        }
    }

    /// Read several resources of one instance in order.
    pub fn read_many(
        &self,
        object_id: u16,
        instance_id: u16,
        property_ids: &[u16],
    ) -> BulkResult<(u16, Value)> {
        let mut results = Vec::with_capacity(property_ids.len());
        for &property_id in property_ids {
            match self.read(object_id, instance_id, property_id) {
                Ok(value) => results.push((property_id, value)),
                Err(status) => return BulkResult { results, status },
            }
        }
        BulkResult {
            results,
            status: StatusCode::Content,
        }
    }

    /// Read every readable resource of an instance, in declaration order.
    pub fn read_instance(&self, object_id: u16, instance_id: u16) -> BulkResult<(u16, Value)> {
        let Some(dispatcher) = self.lookup(object_id) else {
            return BulkResult {
                results: Vec::new(),
                status: StatusCode::NotFound,
            };
        };
        if !dispatcher.has_instance(instance_id) {
            return BulkResult {
                results: Vec::new(),
                status: StatusCode::NotFound,
            };
        }

        let readable: Vec<u16> = dispatcher
            .allowed_operations()
            .iter()
            .filter(|entry| entry.permits(Operation::Read))
            .map(|entry| entry.property_id)
            .collect();
        self.read_many(object_id, instance_id, &readable)
    }

    /// Write several resources of one instance in order.
    ///
    /// `results` lists the property ids written before the first failure.
    pub fn write_many(
        &mut self,
        object_id: u16,
        instance_id: u16,
        values: &[(u16, Value)],
    ) -> BulkResult<u16> {
        let mut results = Vec::with_capacity(values.len());
        for (property_id, value) in values {
            match self.write(object_id, instance_id, *property_id, value) {
                Ok(()) => results.push(*property_id),
                Err(status) => return BulkResult { results, status },
            }
        }
        BulkResult {
            results,
            status: StatusCode::Changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DataType, Opaque, Time};
    use crate::error::CallbackResult;
    use crate::object::{ops, ObjectDescriptor, ObjectInstance};

    const OID_READONLY: u16 = 1001;
    const OID_WRITEEXEC: u16 = 1002;
    const OID_UNREGISTERED: u16 = 2002;
    const PID_MISSING: u16 = 999;

    #[derive(Default)]
    struct Fake {
        id: u16,
        string: String,
        integer: i64,
        float: f64,
        time: i64,
        opaque: Vec<u8>,
        boolean: bool,
        executed: u32,
        setter_calls: u32,
    }

    impl ObjectInstance for Fake {
        fn instance_id(&self) -> u16 {
            self.id
        }
    }

    fn invalid<T>(_: &Fake) -> CallbackResult<T> {
        Err(CallbackError::InvalidArgument)
    }

    fn read_only() -> ObjectDescriptor<Fake> {
        ObjectDescriptor::new(OID_READONLY)
            .readable(101, |_: &Fake| Ok("valid string".to_string()))
            .readable(201, |_: &Fake| Ok(0x8675309i64))
            .readable(301, |_: &Fake| Ok(867.5307f64))
            .readable(401, |_: &Fake| Ok(Time(1311379200)))
            .readable(501, |_: &Fake| Ok(Opaque::from(vec![0xDEu8, 0xAD])))
            .readable(601, |_: &Fake| Ok(true))
            .declare(701, ops::READ, DataType::Integer)
            .readable(801, invalid::<i64>)
            .with_instance(Fake {
                id: 42,
                ..Default::default()
            })
    }

    fn write_exec() -> ObjectDescriptor<Fake> {
        ObjectDescriptor::new(OID_WRITEEXEC)
            .writable(102, |f: &mut Fake, v: String| {
                f.string = v;
                Ok(())
            })
            .writable(202, |f: &mut Fake, v: i64| {
                f.setter_calls += 1;
                f.integer = v;
                Ok(())
            })
            .writable(302, |f: &mut Fake, v: f64| {
                f.setter_calls += 1;
                f.float = v;
                Ok(())
            })
            .writable(402, |f: &mut Fake, v: Time| {
                f.setter_calls += 1;
                f.time = v.0;
                Ok(())
            })
            .writable(502, |f: &mut Fake, v: Opaque| {
                f.opaque = v.as_slice().to_vec();
                Ok(())
            })
            .writable(602, |f: &mut Fake, v: bool| {
                f.setter_calls += 1;
                f.boolean = v;
                Ok(())
            })
            .executable(702, |f: &mut Fake| {
                f.executed += 1;
                Ok(())
            })
            .executable(802, |_: &mut Fake| Err(CallbackError::InvalidArgument))
            .declare(902, ops::EXECUTE, DataType::Undefined)
            .declare(1002, ops::WRITE, DataType::Integer)
            .writable(1102, |_: &mut Fake, _: i64| Err(CallbackError::InvalidArgument))
            .executable(1202, |_: &mut Fake| Err(CallbackError::Failed("boom".into())))
            .with_instance(Fake {
                id: 43,
                ..Default::default()
            })
    }

    fn registry() -> ObjectRegistry {
        let mut registry = ObjectRegistry::new();
        registry.register(read_only()).unwrap();
        registry.register(write_exec()).unwrap();
        registry
    }

    fn fake(registry: &ObjectRegistry) -> &Fake {
        registry.instance::<Fake>(OID_WRITEEXEC, 43).unwrap()
    }

    #[test]
    fn test_read_typed_values() {
        let registry = registry();

        assert_eq!(
            registry.read(OID_READONLY, 42, 101),
            Ok(Value::text("valid string"))
        );
        assert_eq!(registry.read(OID_READONLY, 42, 201), Ok(Value::Integer(0x8675309)));
        assert_eq!(registry.read(OID_READONLY, 42, 301), Ok(Value::Float(867.5307)));
        assert_eq!(registry.read(OID_READONLY, 42, 401), Ok(Value::Integer(1311379200)));
        assert_eq!(
            registry.read(OID_READONLY, 42, 501),
            Ok(Value::opaque(vec![0xDEu8, 0xAD]))
        );
        assert_eq!(registry.read(OID_READONLY, 42, 601), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_read_status_mapping() {
        let registry = registry();

        let ok = registry.read(OID_READONLY, 42, 201);
        assert_eq!(ObjectRegistry::status_of(Operation::Read, &ok), StatusCode::Content);

        assert_eq!(
            registry.read(OID_READONLY, 42, 701),
            Err(StatusCode::NotImplemented)
        );
        assert_eq!(registry.read(OID_READONLY, 42, 801), Err(StatusCode::BadRequest));
    }

    #[test]
    fn test_unregistered_object_is_not_found() {
        let mut registry = registry();

        assert_eq!(registry.read(OID_UNREGISTERED, 0, 101), Err(StatusCode::NotFound));
        assert_eq!(
            registry.write(OID_UNREGISTERED, 0, 102, &Value::Integer(1)),
            Err(StatusCode::NotFound)
        );
        assert_eq!(
            registry.execute(OID_UNREGISTERED, 0, 702),
            Err(StatusCode::NotFound)
        );
    }

    #[test]
    fn test_missing_instance_is_not_found() {
        let mut registry = registry();

        assert_eq!(registry.read(OID_READONLY, 7, 201), Err(StatusCode::NotFound));
        assert_eq!(registry.execute(OID_WRITEEXEC, 7, 702), Err(StatusCode::NotFound));
    }

    #[test]
    fn test_missing_property_is_not_found() {
        let mut registry = registry();

        assert_eq!(
            registry.read(OID_READONLY, 42, PID_MISSING),
            Err(StatusCode::NotFound)
        );
        assert_eq!(
            registry.write(OID_WRITEEXEC, 43, PID_MISSING, &Value::Integer(1)),
            Err(StatusCode::NotFound)
        );
        assert_eq!(
            registry.execute(OID_WRITEEXEC, 43, PID_MISSING),
            Err(StatusCode::NotFound)
        );
    }

    #[test]
    fn test_operation_not_permitted() {
        let mut registry = registry();

        // Write and execute on read-only properties
        assert_eq!(
            registry.write(OID_READONLY, 42, 201, &Value::Integer(1)),
            Err(StatusCode::MethodNotAllowed)
        );
        assert_eq!(
            registry.execute(OID_READONLY, 42, 101),
            Err(StatusCode::MethodNotAllowed)
        );
        // Read on write-only and executable properties
        assert_eq!(
            registry.read(OID_WRITEEXEC, 43, 202),
            Err(StatusCode::MethodNotAllowed)
        );
        assert_eq!(
            registry.read(OID_WRITEEXEC, 43, 702),
            Err(StatusCode::MethodNotAllowed)
        );
        // Execute on a writable property
        assert_eq!(
            registry.execute(OID_WRITEEXEC, 43, 202),
            Err(StatusCode::MethodNotAllowed)
        );
    }

    #[test]
    fn test_write_typed_values() {
        let mut registry = registry();

        registry
            .write(OID_WRITEEXEC, 43, 102, &Value::text("valid string"))
            .unwrap();
        registry
            .write(OID_WRITEEXEC, 43, 202, &Value::Integer(0x8675309))
            .unwrap();
        registry
            .write(OID_WRITEEXEC, 43, 302, &Value::text("867.5307"))
            .unwrap();
        registry
            .write(OID_WRITEEXEC, 43, 402, &Value::Integer(1311379200))
            .unwrap();
        registry
            .write(OID_WRITEEXEC, 43, 502, &Value::opaque(vec![1u8, 2, 3]))
            .unwrap();
        registry
            .write(OID_WRITEEXEC, 43, 602, &Value::Boolean(true))
            .unwrap();

        let f = fake(&registry);
        assert_eq!(f.string, "valid string");
        assert_eq!(f.integer, 0x8675309);
        assert_eq!(f.float, 867.5307);
        assert_eq!(f.time, 1311379200);
        assert_eq!(f.opaque, vec![1, 2, 3]);
        assert!(f.boolean);
    }

    #[test]
    fn test_write_success_status() {
        let mut registry = registry();
        let result = registry.write(OID_WRITEEXEC, 43, 202, &Value::text("42"));
        assert_eq!(
            ObjectRegistry::status_of(Operation::Write, &result),
            StatusCode::Changed
        );
    }

    #[test]
    fn test_unparsable_write_never_calls_setter() {
        let mut registry = registry();

        for (pid, bad) in [
            (202u16, Value::text("not a number")),
            (302, Value::text("not a float")),
            (402, Value::text("yesterday")),
            (602, Value::text("maybe")),
        ] {
            assert_eq!(
                registry.write(OID_WRITEEXEC, 43, pid, &bad),
                Err(StatusCode::BadRequest),
                "property {}",
                pid
            );
        }

        assert_eq!(fake(&registry).setter_calls, 0);
    }

    #[test]
    fn test_write_callback_errors() {
        let mut registry = registry();

        assert_eq!(
            registry.write(OID_WRITEEXEC, 43, 1002, &Value::Integer(1)),
            Err(StatusCode::NotImplemented)
        );
        assert_eq!(
            registry.write(OID_WRITEEXEC, 43, 1102, &Value::Integer(1)),
            Err(StatusCode::BadRequest)
        );
    }

    #[test]
    fn test_execute() {
        let mut registry = registry();

        let result = registry.execute(OID_WRITEEXEC, 43, 702);
        assert_eq!(
            ObjectRegistry::status_of(Operation::Execute, &result),
            StatusCode::Changed
        );
        assert_eq!(fake(&registry).executed, 1);

        assert_eq!(
            registry.execute(OID_WRITEEXEC, 43, 802),
            Err(StatusCode::BadRequest)
        );
        assert_eq!(
            registry.execute(OID_WRITEEXEC, 43, 902),
            Err(StatusCode::NotImplemented)
        );
        assert_eq!(
            registry.execute(OID_WRITEEXEC, 43, 1202),
            Err(StatusCode::InternalServerError)
        );
    }

    #[test]
    fn test_read_many_stops_at_first_failure() {
        let registry = registry();

        let bulk = registry.read_many(OID_READONLY, 42, &[101, 201, 701, 301]);

        assert_eq!(bulk.status, StatusCode::NotImplemented);
        assert!(!bulk.is_complete());
        assert_eq!(
            bulk.results,
            vec![
                (101, Value::text("valid string")),
                (201, Value::Integer(0x8675309)),
            ]
        );
    }

    #[test]
    fn test_read_many_complete() {
        let registry = registry();
        let bulk = registry.read_many(OID_READONLY, 42, &[601, 401]);

        assert!(bulk.is_complete());
        assert_eq!(bulk.status, StatusCode::Content);
        assert_eq!(bulk.results.len(), 2);
    }

    #[test]
    fn test_read_instance() {
        let registry = registry();

        // 701 is declared without a getter, so the walk stops there
        let bulk = registry.read_instance(OID_READONLY, 42);
        assert_eq!(bulk.status, StatusCode::NotImplemented);
        assert_eq!(
            bulk.results.iter().map(|(pid, _)| *pid).collect::<Vec<_>>(),
            vec![101, 201, 301, 401, 501, 601]
        );

        assert_eq!(
            registry.read_instance(OID_UNREGISTERED, 0).status,
            StatusCode::NotFound
        );
        assert_eq!(registry.read_instance(OID_READONLY, 0).status, StatusCode::NotFound);
    }

    #[test]
    fn test_write_many_keeps_earlier_writes() {
        let mut registry = registry();

        let bulk = registry.write_many(
            OID_WRITEEXEC,
            43,
            &[
                (202, Value::Integer(5)),
                (602, Value::Boolean(true)),
                (302, Value::text("bogus")),
                (102, Value::text("never written")),
            ],
        );

        assert_eq!(bulk.status, StatusCode::BadRequest);
        assert_eq!(bulk.results, vec![202, 602]);

        let f = fake(&registry);
        assert_eq!(f.integer, 5);
        assert!(f.boolean);
        assert!(f.string.is_empty());
    }
}
