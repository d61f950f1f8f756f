//! Static variant tables
//!
//! A table is built once per family from a plain list of rows and is
//! read-only afterwards. Lookups are exact matches on the packed key.

use std::collections::HashMap;

use thiserror::Error;

use crate::key::{KeyError, KeyField, KeyLayout, VariantKey};

/// One precompiled kernel variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantEntry {
    pub key: VariantKey,
    pub kernel_name: String,
    pub source_module: &'static str,
    /// Modules compiled ahead of `source_module`.
    pub helper_modules: &'static [&'static str],
}

impl VariantEntry {
    /// Helpers first, then the kernel's own module.
    pub fn source_modules(&self) -> Vec<String> {
        self.helper_modules
            .iter()
            .chain(std::iter::once(&self.source_module))
            .map(|m| (*m).to_string())
            .collect()
    }
}

/// Table construction failures. These are programming errors in the static
/// data, never caused by a request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("{family}: key {key} registered twice ('{first}' and '{second}')")]
    DuplicateKey {
        family: &'static str,
        key: VariantKey,
        first: String,
        second: String,
    },
    #[error("{family}: {source}")]
    Key {
        family: &'static str,
        #[source]
        source: KeyError,
    },
}

/// Read-only lookup table of one operator family.
#[derive(Debug)]
pub struct VariantTable {
    family: &'static str,
    layout: KeyLayout,
    entries: Vec<VariantEntry>,
    index: HashMap<VariantKey, usize>,
}

impl VariantTable {
    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VariantEntry] {
        &self.entries
    }

    pub fn lookup(&self, key: VariantKey) -> Option<&VariantEntry> {
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn find_by_name(&self, kernel_name: &str) -> Option<&VariantEntry> {
        self.entries.iter().find(|e| e.kernel_name == kernel_name)
    }
}

/// Collects table rows and checks them when the table is finalized.
#[derive(Debug)]
pub struct TableBuilder {
    family: &'static str,
    layout: KeyLayout,
    helper_modules: &'static [&'static str],
    entries: Vec<VariantEntry>,
}

impl TableBuilder {
    pub fn new(family: &'static str, layout: KeyLayout) -> Self {
        Self {
            family,
            layout,
            helper_modules: &[],
            entries: Vec::new(),
        }
    }

    /// Validate `fields` as the key layout and start an empty table.
    pub fn for_fields(
        family: &'static str,
        fields: &'static [KeyField],
    ) -> Result<Self, TableError> {
        let layout =
            KeyLayout::new(fields).map_err(|source| TableError::Key { family, source })?;
        Ok(Self::new(family, layout))
    }

    /// Helper modules attached to every subsequent row.
    pub fn helpers(mut self, modules: &'static [&'static str]) -> Self {
        self.helper_modules = modules;
        self
    }

    /// Add one row keyed by the layout's field values.
    pub fn row(
        &mut self,
        fields: &[u64],
        kernel_name: impl Into<String>,
        source_module: &'static str,
    ) -> Result<(), TableError> {
        let key = self.layout.pack(fields).map_err(|source| TableError::Key {
            family: self.family,
            source,
        })?;
        self.entries.push(VariantEntry {
            key,
            kernel_name: kernel_name.into(),
            source_module,
            helper_modules: self.helper_modules,
        });
        Ok(())
    }

    pub fn build(self) -> Result<VariantTable, TableError> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(&first) = index.get(&entry.key) {
                let first: &VariantEntry = &self.entries[first];
                return Err(TableError::DuplicateKey {
                    family: self.family,
                    key: entry.key,
                    first: first.kernel_name.clone(),
                    second: entry.kernel_name.clone(),
                });
            }
            index.insert(entry.key, i);
        }

        log::trace!(
            "built {} variant table with {} entries",
            self.family,
            self.entries.len()
        );

        Ok(VariantTable {
            family: self.family,
            layout: self.layout,
            entries: self.entries,
            index,
        })
    }
}
