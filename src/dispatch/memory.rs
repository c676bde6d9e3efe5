//! In-memory dispatcher for testing collectors without a real sink.

use std::cell::Cell;

use super::{DataSet, DispatchError, Dispatcher, TypesDb, ValueList};

/// Records every dispatched observation and counts schema lookups.
#[derive(Debug)]
pub struct MemoryDispatcher {
    types: TypesDb,
    lookups: Cell<usize>,
    /// Observations in dispatch order.
    pub dispatched: Vec<ValueList>,
}

impl MemoryDispatcher {
    /// Creates a dispatcher backed by the built-in schemas.
    pub fn new() -> Self {
        Self::with_types(TypesDb::builtin())
    }

    pub fn with_types(types: TypesDb) -> Self {
        Self {
            types,
            lookups: Cell::new(0),
            dispatched: Vec::new(),
        }
    }

    /// Number of `data_set` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    /// Finds the first observation with the given type and type instance.
    pub fn find(&self, type_: &str, type_instance: Option<&str>) -> Option<&ValueList> {
        self.dispatched
            .iter()
            .find(|vl| vl.type_ == type_ && vl.type_instance.as_deref() == type_instance)
    }
}

impl Default for MemoryDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for MemoryDispatcher {
    fn data_set(&self, type_name: &str) -> Option<&DataSet> {
        self.lookups.set(self.lookups.get() + 1);
        self.types.get(type_name)
    }

    fn dispatch(&mut self, vl: &ValueList) -> Result<(), DispatchError> {
        self.dispatched.push(vl.clone());
        Ok(())
    }
}
