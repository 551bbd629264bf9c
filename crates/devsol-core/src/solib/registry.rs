//! Per-process device module lists.
//!
//! The registry owns one ordered list of device modules per debugged process.
//! Lists are never patched: every refresh throws the old entries away and
//! rebuilds from what the device runtime reports right now.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::target::{AttributeValue, CodeObjectAttribute, DeviceIntrospection};
use crate::types::{CodeObjectId, LoadedModule, ProcessId};

/// Device modules of every live debugged process.
#[derive(Debug, Default)]
pub struct ModuleRegistry
{
    lists: HashMap<ProcessId, Vec<LoadedModule>>,
}

impl ModuleRegistry
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Device modules currently recorded for `pid`, in device enumeration order.
    #[must_use]
    pub fn modules(&self, pid: ProcessId) -> &[LoadedModule]
    {
        self.lists.get(&pid).map_or(&[][..], Vec::as_slice)
    }

    /// Drop every device module of `pid`, leaving an empty list.
    ///
    /// Safe to call any number of times.
    pub fn free_list(&mut self, pid: ProcessId)
    {
        if let Some(list) = self.lists.get_mut(&pid) {
            if !list.is_empty() {
                debug!(pid = pid.0, count = list.len(), "freeing device module list");
            }
            list.clear();
        }
    }

    /// Forget `pid` entirely (process exited or was detached).
    pub fn remove_process(&mut self, pid: ProcessId)
    {
        if self.lists.remove(&pid).is_some() {
            debug!(pid = pid.0, "dropped device module list");
        }
    }

    /// Number of processes with a list (possibly empty).
    #[must_use]
    pub fn process_count(&self) -> usize
    {
        self.lists.len()
    }

    /// Rebuild the list of `pid` from the device runtime.
    ///
    /// Returns `false` without touching the list when the runtime has no
    /// context for the process or cannot enumerate it, `true` otherwise (even
    /// when no code objects are loaded). Callers free the list first.
    ///
    /// Code objects whose load address or locator cannot be fetched are left
    /// out; one bad entry never spoils the rest.
    pub fn refresh(&mut self, pid: ProcessId, introspection: &dyn DeviceIntrospection, config: &LoaderConfig) -> bool
    {
        let Some(context) = introspection.process_context(pid) else {
            return false;
        };

        let ids = match introspection.code_objects(context) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(pid = pid.0, error = %err, "failed to list device code objects");
                return false;
            }
        };

        let list = self.lists.entry(pid).or_default();
        list.clear();
        list.extend(
            ids.into_iter()
                .filter_map(|id| describe_code_object(introspection, id, config)),
        );

        debug!(pid = pid.0, context = context.0, count = list.len(), "refreshed device module list");
        true
    }
}

fn describe_code_object(
    introspection: &dyn DeviceIntrospection,
    id: CodeObjectId,
    config: &LoaderConfig,
) -> Option<LoadedModule>
{
    let load_address = match introspection.code_object_attribute(id, CodeObjectAttribute::LoadAddress) {
        Ok(AttributeValue::Address(address)) => address,
        Ok(other) => {
            debug!(id = id.raw(), ?other, "load address query returned the wrong kind of value");
            return None;
        }
        Err(err) => {
            debug!(id = id.raw(), error = %err, "skipping code object without a load address");
            return None;
        }
    };

    let locator = match introspection.code_object_attribute(id, CodeObjectAttribute::UriName) {
        Ok(AttributeValue::Uri(uri)) => uri,
        Ok(other) => {
            debug!(id = id.raw(), ?other, "URI query returned the wrong kind of value");
            return None;
        }
        Err(err) => {
            debug!(id = id.raw(), error = %err, "skipping code object without a URI");
            return None;
        }
    };

    Some(LoadedModule::device(&locator, id, load_address, config.display_name_capacity))
}
