//! Schema loader for YAML and JSON segment-definition documents

use crate::model::{ComponentSpec, ElementSpec, Schema, SegmentSpec, ANY_DIRECTORY};
use crate::registry::{ConcurrentSchemaRegistry, SchemaRegistry};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Serializable schema format for loading from files
#[derive(Debug, Deserialize)]
struct SchemaFile {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    segments: Vec<SegmentFile>,
}

#[derive(Debug, Deserialize)]
struct SegmentFile {
    tag: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notice: Option<String>,
    #[serde(default)]
    elements: Vec<ElementFile>,
}

#[derive(Debug, Deserialize)]
struct ElementFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    min_occurs: usize,
    #[serde(default = "default_max_occurs")]
    max_occurs: usize,
    #[serde(default)]
    components: Option<Vec<ComponentFile>>,
}

#[derive(Debug, Deserialize)]
struct ComponentFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    min_occurs: usize,
    #[serde(default = "default_max_occurs")]
    max_occurs: usize,
}

fn default_version() -> String {
    ANY_DIRECTORY.to_string()
}

fn default_max_occurs() -> usize {
    1
}

/// Loads schema documents from disk and caches them by qualified name
pub struct SchemaLoader {
    registry: Arc<ConcurrentSchemaRegistry>,
    schema_paths: Vec<PathBuf>,
}

impl SchemaLoader {
    /// Create a new schema loader with the given search paths
    pub fn new(schema_paths: Vec<PathBuf>) -> Self {
        Self {
            registry: Arc::new(ConcurrentSchemaRegistry::new()),
            schema_paths,
        }
    }

    /// Create a new schema loader sharing a pre-configured cache
    pub fn with_registry(
        registry: Arc<ConcurrentSchemaRegistry>,
        schema_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            registry,
            schema_paths,
        }
    }

    /// Load a schema by name and directory version
    ///
    /// Checks the cache first, then searches the configured paths.
    pub fn load(&self, name: &str, version: &str) -> Result<Arc<Schema>> {
        let qualified_name = format!("{name}: {version}");

        if let Some(cached) = self.registry.get(&qualified_name) {
            debug!("Cache hit for schema: {}", qualified_name);
            return Ok(cached);
        }

        trace!("Cache miss for schema: {}", qualified_name);

        let schema = Arc::new(self.load_from_disk(name, version)?);
        self.registry.register(&qualified_name, Arc::clone(&schema));

        Ok(schema)
    }

    /// Load a schema from a specific file path and cache it
    pub fn load_file(&self, path: &Path) -> Result<Arc<Schema>> {
        let schema = Arc::new(self.load_from_file(path)?);
        let qualified_name = schema.qualified_name();
        info!(schema = %qualified_name, path = %path.display(), "Loaded schema");
        self.registry.register(qualified_name, Arc::clone(&schema));
        Ok(schema)
    }

    /// Load several files into a lookup registry, preserving order
    pub fn load_registry<P: AsRef<Path>>(&self, paths: &[P]) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        for path in paths {
            registry.register(self.load_file(path.as_ref())?);
        }
        Ok(registry)
    }

    /// Parse a schema from a file, choosing the format by extension
    pub fn load_from_file(&self, path: &Path) -> Result<Schema> {
        trace!("Loading schema from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            self.load_from_yaml(&content)
        } else {
            self.load_from_json(&content)
        }
    }

    /// Parse a schema from a JSON string
    pub fn load_from_json(&self, json: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))?;

        convert_schema_file(schema_file)
    }

    /// Parse a schema from a YAML string
    pub fn load_from_yaml(&self, yaml: &str) -> Result<Schema> {
        let schema_file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))?;

        convert_schema_file(schema_file)
    }

    fn load_from_disk(&self, name: &str, version: &str) -> Result<Schema> {
        let stem = if version == ANY_DIRECTORY {
            name.to_lowercase()
        } else {
            format!("{}_{}", name.to_lowercase(), version.to_lowercase())
        };
        let variations = [
            format!("{stem}.yaml"),
            format!("{stem}.yml"),
            format!("{stem}.json"),
        ];

        for path in &self.schema_paths {
            for variation in &variations {
                let file_path = path.join(variation);
                if file_path.exists() {
                    trace!("Found schema file: {:?}", file_path);
                    return self.load_from_file(&file_path);
                }
            }
        }

        Err(Error::NotFound(format!(
            "Schema {}: {} not found in search paths: {:?}",
            name, version, self.schema_paths
        )))
    }

    /// Add a search path for schema files
    pub fn add_path(&mut self, path: PathBuf) {
        self.schema_paths.push(path);
    }

    /// The schema cache
    pub fn registry(&self) -> &ConcurrentSchemaRegistry {
        &self.registry
    }
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

fn check_bounds(owner: &str, id: &str, min: usize, max: usize) -> Result<()> {
    if max == 0 || min > max {
        return Err(Error::InvalidFormat(format!(
            "{owner}/{id}: invalid occurrence bounds {min}..{max}"
        )));
    }
    Ok(())
}

fn convert_schema_file(file: SchemaFile) -> Result<Schema> {
    let mut segments = Vec::with_capacity(file.segments.len());

    for segment in file.segments {
        if segment.tag.is_empty() {
            return Err(Error::InvalidFormat(format!(
                "schema {} contains a segment without a tag",
                file.name
            )));
        }

        let mut elements = Vec::with_capacity(segment.elements.len());
        for element in segment.elements {
            check_bounds(&segment.tag, &element.id, element.min_occurs, element.max_occurs)?;

            let components = match element.components {
                Some(components) => {
                    let owner = format!("{}/{}", segment.tag, element.id);
                    let mut specs = Vec::with_capacity(components.len());
                    for c in components {
                        check_bounds(&owner, &c.id, c.min_occurs, c.max_occurs)?;
                        specs.push(ComponentSpec {
                            id: c.id,
                            name: c.name,
                            min_occurs: c.min_occurs,
                            max_occurs: c.max_occurs,
                        });
                    }
                    Some(specs)
                }
                None => None,
            };

            elements.push(ElementSpec {
                id: element.id,
                name: element.name,
                min_occurs: element.min_occurs,
                max_occurs: element.max_occurs,
                components,
            });
        }

        segments.push(SegmentSpec {
            tag: segment.tag,
            name: segment.name,
            elements,
            notice: segment.notice,
        });
    }

    debug!(
        schema = %file.name,
        version = %file.version,
        segments = segments.len(),
        "Converted schema file"
    );

    Ok(Schema::new(file.name, file.version)
        .for_messages(file.messages)
        .with_segments(segments))
}
