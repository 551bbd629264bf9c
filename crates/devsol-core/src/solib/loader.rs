//! # Device-Aware Loader
//!
//! [`DeviceLoader`] decorates the host's dynamic-loader tracking with device
//! code objects. It implements the same five hooks as [`HostLoader`] and
//! forwards to the wrapped host loader for everything that is not about a
//! device module, so the debugger core never needs to know a heterogeneous
//! target is involved.
//!
//! ## Lifecycle
//!
//! 1. The debugger builds the loader around its host loader.
//! 2. [`DeviceLoader::process_created`] runs once per process start: the device
//!    list is rebuilt and the core's module view reloaded from scratch.
//! 3. Every stop goes through [`DeviceLoader::handle_event`]: host first, then
//!    a full rebuild of the device list.
//! 4. [`DeviceLoader::process_exited`] (or `process_detached`) tears the list down.
//!
//! Until the first successful rebuild (the device runtime has attached), the
//! loader is not *engaged* and every hook behaves exactly like the host.

use tracing::{debug, info, warn};

use super::registry::ModuleRegistry;
use super::view::{ModuleView, SyncReport};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, Result};
use crate::events::TargetEvent;
use crate::image::{open_code_object, BinaryImage};
use crate::interrupt::InterruptFlag;
use crate::target::TargetServices;
use crate::types::{LoadedModule, ProcessId, TargetSection};
use crate::uri::is_locator;

/// The host's own module tracking, as seen by the debugger core.
///
/// [`DeviceLoader`] wraps one of these and delegates to it.
pub trait HostLoader
{
    /// Modules the host's dynamic loader currently reports.
    fn current_modules(&self) -> Vec<LoadedModule>;

    /// Open a module image from a plain path.
    ///
    /// # Errors
    ///
    /// Whatever prevents the host from opening `path`.
    fn open_binary(&self, path: &str) -> Result<BinaryImage>;

    /// Adjust a section of `module` to its run-time addresses.
    fn relocate_section_addresses(&self, module: &LoadedModule, image: &BinaryImage, section: &mut TargetSection);

    /// React to a stop that may have changed the host's module list.
    fn handle_event(&mut self);

    /// Reset host loader state when a process starts.
    fn create_inferior_hook(&mut self, from_tty: bool);
}

/// Host loader decorated with device code object tracking.
#[derive(Debug)]
pub struct DeviceLoader<H>
{
    host: H,
    services: TargetServices,
    registry: ModuleRegistry,
    current: Option<ProcessId>,
    config: LoaderConfig,
    interrupt: InterruptFlag,
    engaged: bool,
}

impl<H: HostLoader> DeviceLoader<H>
{
    /// Wrap `host` with the default configuration.
    #[must_use]
    pub fn new(host: H, services: TargetServices) -> Self
    {
        Self {
            host,
            services,
            registry: ModuleRegistry::new(),
            current: None,
            config: LoaderConfig::default(),
            interrupt: InterruptFlag::new(),
            engaged: false,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self
    {
        self.config = config;
        self
    }

    /// Share an interrupt flag with whoever handles user interrupts.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self
    {
        self.interrupt = interrupt;
        self
    }

    pub fn host(&self) -> &H
    {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H
    {
        &mut self.host
    }

    pub fn registry(&self) -> &ModuleRegistry
    {
        &self.registry
    }

    pub fn config(&self) -> &LoaderConfig
    {
        &self.config
    }

    pub fn interrupt(&self) -> &InterruptFlag
    {
        &self.interrupt
    }

    /// Whether the device hooks are active (a device runtime has been seen).
    pub fn is_engaged(&self) -> bool
    {
        self.engaged
    }

    /// Process the hooks currently act on.
    pub fn current_process(&self) -> Option<ProcessId>
    {
        self.current
    }

    /// Switch the process the hooks act on.
    pub fn set_current_process(&mut self, pid: Option<ProcessId>)
    {
        self.current = pid;
    }

    /// Device modules of the current process (not merged with the host's).
    pub fn device_modules(&self) -> &[LoadedModule]
    {
        match self.current {
            Some(pid) => self.registry.modules(pid),
            None => &[],
        }
    }

    /// Free and rebuild the current process's device list.
    ///
    /// The first successful rebuild engages the device hooks. Returns whether
    /// the device runtime answered.
    pub fn update_device_modules(&mut self) -> bool
    {
        let Some(pid) = self.current else {
            return false;
        };

        self.registry.free_list(pid);
        let refreshed = self
            .registry
            .refresh(pid, self.services.introspection.as_ref(), &self.config);

        if refreshed && !self.engaged {
            info!(pid = pid.0, "device runtime attached; tracking device code objects");
            self.engaged = true;
        }
        refreshed
    }

    /// Host modules followed by a fresh copy of the device modules.
    ///
    /// The caller owns the result; nothing in it aliases loader state.
    pub fn current_modules(&self) -> Vec<LoadedModule>
    {
        let mut modules = self.host.current_modules();
        if self.engaged {
            modules.extend(self.device_modules().iter().cloned());
        }
        modules
    }

    /// Open a module image.
    ///
    /// Plain paths go to the host. Locators (anything containing `://`) are
    /// resolved and validated as device code objects.
    ///
    /// # Errors
    ///
    /// The host's error for plain paths; for locators, any resolution, I/O or
    /// validation error. Locator failures are also logged as warnings.
    pub fn open_binary(&self, path: &str) -> Result<BinaryImage>
    {
        if !self.engaged || !is_locator(path) {
            return self.host.open_binary(path);
        }

        let pid = self.current.ok_or(LoaderError::NoProcess)?;
        open_code_object(path, pid, &self.services, &self.config, &self.interrupt).map_err(|err| {
            warn!(locator = path, error = %err, "could not open code object");
            err
        })
    }

    /// Relocate `section` of `module`.
    ///
    /// Device images are shifted by the module's load bias as a whole; any
    /// other image is relocated by the host.
    pub fn relocate_section_addresses(&self, module: &LoadedModule, image: &BinaryImage, section: &mut TargetSection)
    {
        if !self.engaged || !image.architecture().is_device() {
            self.host.relocate_section_addresses(module, image, section);
            return;
        }

        section.apply_bias(module.load_bias);
    }

    /// Stop hook: let the host update its list, then rebuild the device list.
    ///
    /// The host goes first because a host-side change (the device runtime
    /// library being loaded, say) can be what makes the device context
    /// available.
    pub fn handle_event(&mut self)
    {
        self.host.handle_event();
        self.update_device_modules();
    }

    /// Process start hook: forget any device modules left from an earlier run.
    pub fn create_inferior_hook(&mut self, from_tty: bool)
    {
        if let Some(pid) = self.current {
            self.registry.free_list(pid);
        }
        self.host.create_inferior_hook(from_tty);
    }

    /// A debugged process came to life: rebuild and reload everything.
    ///
    /// `view` is the debugger core's module view; it is cleared and
    /// re-enumerated from scratch.
    pub fn process_created(&mut self, pid: ProcessId, view: &mut ModuleView) -> SyncReport
    {
        self.current = Some(pid);
        self.registry.free_list(pid);
        self.update_device_modules();

        view.clear();
        view.sync(self)
    }

    /// The process exited; drop its device list.
    pub fn process_exited(&mut self, pid: ProcessId)
    {
        self.registry.remove_process(pid);
        if self.current == Some(pid) {
            self.current = None;
        }
    }

    /// The debugger let go of the process. Its code objects are no longer ours
    /// to track, exactly as if it had exited.
    pub fn process_detached(&mut self, pid: ProcessId)
    {
        debug!(pid = pid.0, "detached; forgetting device modules");
        self.process_exited(pid);
    }

    /// Route a target lifecycle event to the matching hook.
    ///
    /// Returns the view update when the event caused one.
    pub fn dispatch(&mut self, event: &TargetEvent, view: &mut ModuleView) -> Option<SyncReport>
    {
        debug!(event = %event.describe(), "loader event");
        match *event {
            TargetEvent::ProcessCreated(pid) => Some(self.process_created(pid, view)),
            TargetEvent::InferiorCreated { from_tty } => {
                self.create_inferior_hook(from_tty);
                None
            }
            TargetEvent::Stopped => {
                self.handle_event();
                Some(view.sync(self))
            }
            TargetEvent::Exited(pid) => {
                if self.current == Some(pid) {
                    view.clear();
                }
                self.process_exited(pid);
                None
            }
            TargetEvent::Detached(pid) => {
                if self.current == Some(pid) {
                    view.clear();
                }
                self.process_detached(pid);
                None
            }
        }
    }
}
