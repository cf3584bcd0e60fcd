//! Schema file loading.

use std::fs;
use std::path::Path;

use cmdtree_core::AppSchema;
use tracing::debug;

use crate::error::{CliError, Result};

/// Encoding of a schema file, picked from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(CliError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Reads and deserializes an application schema.
pub fn load_schema(path: &Path) -> Result<AppSchema> {
    let format = SchemaFormat::from_path(path)?;
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let schema: AppSchema = match format {
        SchemaFormat::Json => serde_json::from_str(&raw)?,
        SchemaFormat::Yaml => serde_yaml::from_str(&raw)?,
    };
    debug!(
        path = %path.display(),
        app = %schema.name,
        commands = schema.command_count(),
        "loaded schema"
    );
    Ok(schema)
}
