//! The resources table data model and resolution engine.

use crate::config::{best_match, Config, DeviceConfig};
use crate::errors::{ResourcesError, ResourcesResult};
use crate::strings::{StringPool, StringPoolIndex};
use crate::values::{ResolvedValue, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A 32-bit resource identifier: `(package:8 | type:8 | entry:16)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    #[must_use]
    pub const fn from_parts(package: u8, typ: u8, entry: u16) -> Self {
        Self(((package as u32) << 24) | ((typ as u32) << 16) | entry as u32)
    }

    #[inline]
    #[must_use]
    pub const fn package(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    #[must_use]
    pub const fn type_id(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    #[must_use]
    pub const fn entry(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{:#010x}", self.0)
    }
}

/// The decoded `resources.arsc` content: the global value string pool and
/// the package tables.
#[derive(Debug)]
pub struct ResourceTable {
    pub(crate) global_strings: StringPool,
    pub(crate) packages: Vec<TablePackage>,
}

#[derive(Debug)]
pub struct TablePackage {
    pub(crate) id: u8,
    pub(crate) name: String,
    pub(crate) type_strings: StringPool,
    pub(crate) key_strings: StringPool,
    pub(crate) type_specs: Vec<TypeSpec>,
    pub(crate) types: Vec<TypeChunk>,
}

impl TablePackage {
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves a type id (1-based) to its name, e.g. `string`, `layout`.
    pub fn type_name(&self, type_id: u8) -> ResourcesResult<&str> {
        self.type_strings
            .get(StringPoolIndex::new(type_id as usize - 1))
    }
}

/// Configuration-independent per-entry flags for one resource type.
#[derive(Debug)]
pub struct TypeSpec {
    pub(crate) id: u8,
    pub(crate) entry_flags: Vec<u32>,
}

impl TypeSpec {
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u8 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entry_flags.len()
    }
}

/// One configuration's worth of entries for a resource type. Entry
/// indices are dense and shared across the type's other configurations.
#[derive(Debug)]
pub struct TypeChunk {
    pub(crate) id: u8,
    pub(crate) config: Config,
    pub(crate) entries: BTreeMap<u16, TableEntry>,
}

impl TypeChunk {
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

#[derive(Debug)]
pub struct TableEntry {
    pub(crate) key: StringPoolIndex,
    pub(crate) content: EntryContent,
}

#[derive(Debug)]
pub enum EntryContent {
    /// A simple typed value.
    Value(Value),
    /// A complex value: attribute-id to value map with an optional
    /// parent style reference.
    Map { parent: u32, items: Vec<(u32, Value)> },
}

impl TableEntry {
    #[inline]
    #[must_use]
    pub const fn content(&self) -> &EntryContent {
        &self.content
    }
}

impl ResourceTable {
    #[inline]
    pub fn iter_packages(&self) -> impl Iterator<Item = &TablePackage> {
        self.packages.iter()
    }

    pub fn package(&self, id: u8) -> Option<&TablePackage> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Collects every configuration variant declared for `id`.
    #[must_use]
    pub fn variants(&self, id: ResourceId) -> Vec<(&Config, &TableEntry)> {
        let Some(package) = self.package(id.package()) else {
            return Vec::new();
        };
        package
            .types
            .iter()
            .filter(|chunk| chunk.id == id.type_id())
            .filter_map(|chunk| {
                chunk
                    .entries
                    .get(&id.entry())
                    .map(|entry| (&chunk.config, entry))
            })
            .collect()
    }

    /// Returns the `type/key` name of a resource, when the id is known.
    pub fn entry_name(&self, id: ResourceId) -> ResourcesResult<String> {
        let package = self
            .package(id.package())
            .ok_or_else(|| ResourcesError::ResNotFound(format!("package {:#04x}", id.package())))?;
        let entry = package
            .types
            .iter()
            .filter(|chunk| chunk.id == id.type_id())
            .find_map(|chunk| chunk.entries.get(&id.entry()))
            .ok_or_else(|| ResourcesError::ResNotFound(format!("resource {id}")))?;
        let type_name = package.type_name(id.type_id())?;
        let key = package.key_strings.get(entry.key)?;
        Ok(format!("{type_name}/{key}"))
    }

    /// Finds a resource id from its type and key names, searching every
    /// package. Linear, meant for tests and tooling.
    #[must_use]
    pub fn find_by_name(&self, type_name: &str, key: &str) -> Option<ResourceId> {
        for package in &self.packages {
            for chunk in &package.types {
                if package.type_name(chunk.id).ok()? != type_name {
                    continue;
                }
                for (entry_idx, entry) in &chunk.entries {
                    if package.key_strings.get(entry.key).ok()? == key {
                        return Some(ResourceId::from_parts(package.id, chunk.id, *entry_idx));
                    }
                }
            }
        }
        None
    }

    /// Resolves a resource against a device configuration: qualifier
    /// best-match selection, then transitive reference chasing with a
    /// cycle guard.
    pub fn resolve(&self, id: u32, device: &DeviceConfig) -> ResourcesResult<ResolvedValue> {
        let mut visited = BTreeSet::new();
        self.resolve_inner(id, device, &mut visited)
    }

    fn resolve_inner(
        &self,
        id: u32,
        device: &DeviceConfig,
        visited: &mut BTreeSet<u32>,
    ) -> ResourcesResult<ResolvedValue> {
        if !visited.insert(id) {
            return Err(ResourcesError::ReferenceCycle(id));
        }

        let rid = ResourceId(id);
        let variants = self.variants(rid);
        if variants.is_empty() {
            return Err(ResourcesError::ResNotFound(format!("resource {rid}")));
        }

        let (config, entry) = best_match(variants, device)
            .ok_or_else(|| ResourcesError::ResNotFound(format!("no variant of {rid} matches")))?;
        log::trace!("resolved {rid} to configuration {config}");

        match &entry.content {
            EntryContent::Value(value) => {
                let resolved = value.resolve(&self.global_strings)?;
                match resolved {
                    ResolvedValue::Reference(target) => {
                        self.resolve_inner(target, device, visited)
                    }
                    other => Ok(other),
                }
            }
            EntryContent::Map { items, .. } => {
                let mut bag = Vec::with_capacity(items.len());
                for (attr_id, value) in items {
                    let resolved = match value.resolve(&self.global_strings)? {
                        ResolvedValue::Reference(target) => {
                            self.resolve_inner(target, device, &mut visited.clone())?
                        }
                        other => other,
                    };
                    bag.push((*attr_id, resolved));
                }
                Ok(ResolvedValue::Bag(bag))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(strings: &[&str]) -> StringPool {
        StringPool {
            sorted: false,
            utf8: true,
            strings: strings.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn entry(key: usize, value: Value) -> TableEntry {
        TableEntry {
            key: StringPoolIndex::new(key),
            content: EntryContent::Value(value),
        }
    }

    /// One package, one `string` type with three locale variants of
    /// entry 0 (`greeting`) plus an entry 1 referencing entry 0.
    fn table() -> ResourceTable {
        let default_chunk = TypeChunk {
            id: 1,
            config: Config::default(),
            entries: BTreeMap::from([
                (0u16, entry(0, Value::String(StringPoolIndex::new(0)))),
                (1u16, entry(1, Value::Reference(0x7f01_0000))),
                (2u16, entry(2, Value::Reference(0x7f01_0003))),
                (3u16, entry(3, Value::Reference(0x7f01_0002))),
            ]),
        };
        let es_chunk = TypeChunk {
            id: 1,
            config: Config {
                language: Some("es".to_string()),
                ..Config::default()
            },
            entries: BTreeMap::from([(0u16, entry(0, Value::String(StringPoolIndex::new(1))))]),
        };
        let fr_chunk = TypeChunk {
            id: 1,
            config: Config {
                language: Some("fr".to_string()),
                ..Config::default()
            },
            entries: BTreeMap::from([(0u16, entry(0, Value::String(StringPoolIndex::new(2))))]),
        };

        ResourceTable {
            global_strings: pool(&["Hello", "Hola", "Bonjour"]),
            packages: vec![TablePackage {
                id: 0x7f,
                name: "com.example".to_string(),
                type_strings: pool(&["string"]),
                key_strings: pool(&["greeting", "alias", "loop_a", "loop_b"]),
                type_specs: vec![TypeSpec {
                    id: 1,
                    entry_flags: vec![0; 4],
                }],
                types: vec![default_chunk, es_chunk, fr_chunk],
            }],
        }
    }

    #[test]
    fn resolves_locale_variants() {
        let table = table();

        let device = DeviceConfig::default().with_locale("es", Some("ES"));
        let value = table.resolve(0x7f01_0000, &device).unwrap();
        assert_eq!(value.as_str(), Some("Hola"));

        let device = DeviceConfig::default().with_locale("de", Some("DE"));
        let value = table.resolve(0x7f01_0000, &device).unwrap();
        assert_eq!(value.as_str(), Some("Hello"));
    }

    #[test]
    fn follows_references() {
        let table = table();
        let device = DeviceConfig::default().with_locale("fr", None);
        let value = table.resolve(0x7f01_0001, &device).unwrap();
        assert_eq!(value.as_str(), Some("Bonjour"));
    }

    #[test]
    fn detects_reference_cycles() {
        let table = table();
        let device = DeviceConfig::default();
        assert!(matches!(
            table.resolve(0x7f01_0002, &device),
            Err(ResourcesError::ReferenceCycle(_))
        ));
    }

    #[test]
    fn missing_resource_is_reported() {
        let table = table();
        let device = DeviceConfig::default();
        assert!(matches!(
            table.resolve(0x7f01_0042, &device),
            Err(ResourcesError::ResNotFound(_))
        ));
    }

    #[test]
    fn names_and_lookup_by_name() {
        let table = table();
        assert_eq!(
            table.entry_name(ResourceId(0x7f01_0000)).unwrap(),
            "string/greeting"
        );
        assert_eq!(
            table.find_by_name("string", "greeting"),
            Some(ResourceId(0x7f01_0000))
        );
        assert_eq!(table.find_by_name("string", "missing"), None);
    }
}
