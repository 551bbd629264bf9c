//! The debugger core's cached module view.
//!
//! Holds one opened image per listed module. A sync compares the loader's
//! current list against the view by unique name: vanished modules are dropped
//! (closing their streams), new ones are opened through the loader and their
//! sections relocated.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::loader::{DeviceLoader, HostLoader};
use crate::image::BinaryImage;
use crate::types::{LoadedModule, TargetSection};

/// A module that has been opened and relocated.
#[derive(Debug)]
pub struct ViewEntry
{
    pub module: LoadedModule,
    pub image: BinaryImage,
    /// Allocated sections at their run-time addresses.
    pub sections: Vec<TargetSection>,
}

/// What a [`ModuleView::sync`] changed, by unique module name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport
{
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Listed modules that could not be opened this time.
    pub failed: Vec<String>,
}

impl SyncReport
{
    /// Whether the sync left the view unchanged.
    #[must_use]
    pub fn is_unchanged(&self) -> bool
    {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Opened modules, in the loader's enumeration order.
#[derive(Debug, Default)]
pub struct ModuleView
{
    entries: Vec<ViewEntry>,
}

impl ModuleView
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Forget every module, closing all images.
    pub fn clear(&mut self)
    {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[ViewEntry]
    {
        &self.entries
    }

    /// Entry whose module has the unique name `original_name`.
    #[must_use]
    pub fn get(&self, original_name: &str) -> Option<&ViewEntry>
    {
        self.entries
            .iter()
            .find(|entry| entry.module.original_name == original_name)
    }

    /// Bring the view in line with `loader.current_modules()`.
    ///
    /// A module that fails to open is reported and left out; it is tried
    /// again on the next sync.
    pub fn sync<H: HostLoader>(&mut self, loader: &DeviceLoader<H>) -> SyncReport
    {
        let mut report = SyncReport::default();
        let mut previous: HashMap<String, ViewEntry> = self
            .entries
            .drain(..)
            .map(|entry| (entry.module.original_name.clone(), entry))
            .collect();

        for module in loader.current_modules() {
            if let Some(entry) = previous.remove(&module.original_name) {
                self.entries.push(entry);
                continue;
            }

            match loader.open_binary(&module.so_name) {
                Ok(image) => {
                    let mut sections = image.target_sections();
                    for section in &mut sections {
                        loader.relocate_section_addresses(&module, &image, section);
                    }
                    report.added.push(module.original_name.clone());
                    self.entries.push(ViewEntry { module, image, sections });
                }
                Err(err) => {
                    warn!(
                        module = %module.original_name,
                        path = %module.so_name,
                        error = %err,
                        "could not open module"
                    );
                    report.failed.push(module.original_name);
                }
            }
        }

        report.removed.extend(previous.into_keys());
        report.removed.sort();

        debug!(
            added = report.added.len(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            total = self.entries.len(),
            "module view synced"
        );
        report
    }
}
