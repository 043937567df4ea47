//! Tool definitions and the per-session state they act on.
//!
//! A [`Session`] owns the loaded chip and the user's connections. Tools that
//! edit connections go through [`ConnectionSet`], so the generator only ever
//! sees snapshots that satisfy the pin policy. Generation itself is pure and
//! runs on a snapshot.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LayoutConfig;
use crate::interconnect::{
    generate, BridgeFinder, ChipModel, ConnectionSet, DiagonalPairs, InterconnectError,
    InterconnectResult, PreparedChip, UserConnection, Variant,
};

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Pretty-printed JSON success.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self::text(pretty(value))
    }

    /// Pretty-printed JSON error built from an interconnect error.
    #[must_use]
    pub fn failure(error: &InterconnectError) -> Self {
        Self::error(pretty(&json!({
            "status": "error",
            "error": error.to_string(),
        })))
    }

    /// The text of the first content item.
    #[must_use]
    pub fn first_text(&self) -> &str {
        self.content
            .first()
            .map_or("", |ToolContent::Text { text }| text.as_str())
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Returns a required string argument or a ready-made error result.
fn str_arg<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, ToolCallResult> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolCallResult::error(format!("Missing required parameter: {key}")))
}

/// A chip loaded into the session.
#[derive(Debug, Clone)]
struct LoadedChip {
    path: PathBuf,
    prepared: PreparedChip,
    pairs: DiagonalPairs,
}

/// State shared by all tool calls of one client session.
#[derive(Debug)]
pub struct Session {
    allowed_paths: Vec<PathBuf>,
    layout: LayoutConfig,
    chip: Option<LoadedChip>,
    connections: ConnectionSet,
    created: usize,
}

impl Session {
    /// Creates a session with no chip loaded.
    #[must_use]
    pub fn new(allowed_paths: Vec<PathBuf>, layout: LayoutConfig) -> Self {
        Self {
            allowed_paths,
            layout,
            chip: None,
            connections: ConnectionSet::new(),
            created: 0,
        }
    }

    /// The current connections.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// The loaded chip, if any.
    #[must_use]
    pub fn chip(&self) -> Option<&PreparedChip> {
        self.chip.as_ref().map(|chip| &chip.prepared)
    }

    /// Loads a chip description, replacing the current one.
    ///
    /// Connections are cleared, since they name pins of the old chip.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load_chip(&mut self, path: &Path) -> InterconnectResult<&PreparedChip> {
        let model = ChipModel::read(path, self.layout.pad_normalization())?;
        let prepared = PreparedChip::new(model);
        let pairs = prepared.diagonal_pairs(
            &self.layout.diagonal_pairs,
            self.layout.adjacency_tolerance,
        );

        if !self.connections.is_empty() {
            tracing::info!(
                dropped = self.connections.len(),
                "Clearing connections for new chip"
            );
        }
        self.connections = ConnectionSet::new();
        self.created = 0;

        tracing::info!(
            path = %path.display(),
            outer_pins = prepared.catalogue.len(),
            "Loaded chip"
        );
        let chip = self.chip.insert(LoadedChip {
            path: path.to_path_buf(),
            prepared,
            pairs,
        });
        Ok(&chip.prepared)
    }

    /// Validates that a path is within one of the allowed paths.
    ///
    /// Returns `Ok(())` if the path is allowed, or an error message if not.
    fn validate_path(&self, filepath: &str) -> Result<(), String> {
        if self.allowed_paths.is_empty() {
            return Ok(());
        }

        let path = Path::new(filepath);

        // New files are checked through their parent directory.
        let canonical_path = if path.exists() {
            path.canonicalize()
                .map_err(|e| format!("Failed to resolve path '{}': {e}", path.display()))?
        } else {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                Some(_) => Path::new("."),
                None => {
                    return Err(format!(
                        "Invalid path '{}': no parent directory",
                        path.display()
                    ))
                }
            };
            let filename = path.file_name().ok_or_else(|| {
                format!("Invalid path '{}': no filename specified", path.display())
            })?;
            let canonical_parent = parent.canonicalize().map_err(|e| {
                format!(
                    "Parent directory '{}' does not exist or is inaccessible: {e}",
                    parent.display()
                )
            })?;
            canonical_parent.join(filename)
        };

        let allowed = self
            .allowed_paths
            .iter()
            .filter_map(|allowed| allowed.canonicalize().ok())
            .any(|allowed| canonical_path.starts_with(allowed));
        if allowed {
            Ok(())
        } else {
            Err("Access denied: path is outside the configured allowed directories".to_string())
        }
    }

    fn loaded(&self) -> Result<&LoadedChip, ToolCallResult> {
        self.chip
            .as_ref()
            .ok_or_else(|| ToolCallResult::error("No chip loaded. Call load_chip first."))
    }

    /// Dispatches a tool call.
    pub fn call(&mut self, name: &str, arguments: &Value) -> ToolCallResult {
        tracing::debug!(tool = %name, "Tool call");
        let result = match name {
            // Chip
            "load_chip" => self.call_load_chip(arguments),
            "list_outer_pins" => self.call_list_outer_pins(),
            "resolve_pin" => self.call_resolve_pin(arguments),
            "find_bridge" => self.call_find_bridge(arguments),
            // Connections
            "create_connection" => self.call_create_connection(arguments),
            "rename_connection" => self.call_rename_connection(arguments),
            "set_connection_color" => self.call_set_connection_color(arguments),
            "delete_connection" => self.call_delete_connection(arguments),
            "add_pin" => self.call_add_pin(arguments),
            "remove_pin" => self.call_remove_pin(arguments),
            "list_connections" => Ok(self.call_list_connections()),
            "load_connections" => self.call_load_connections(arguments),
            "save_connections" => self.call_save_connections(arguments),
            // Generation
            "generate_fixture" => self.call_generate(arguments, Variant::Fixture),
            "generate_footprint" => self.call_generate(arguments, Variant::Footprint),
            _ => Err(ToolCallResult::error(format!("Unknown tool: {name}"))),
        };
        result.unwrap_or_else(|error| error)
    }

    fn call_load_chip(&mut self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let filepath = str_arg(arguments, "filepath")?;
        self.validate_path(filepath).map_err(ToolCallResult::error)?;

        let chip = self
            .load_chip(Path::new(filepath))
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "filepath": filepath,
            "pins": chip.model.pins.len(),
            "nets": chip.model.nets.len(),
            "pads": chip.model.pads.len(),
            "net_groups": chip.groups.len(),
            "outer_pins": chip.catalogue.len(),
        })))
    }

    fn call_list_outer_pins(&self) -> Result<ToolCallResult, ToolCallResult> {
        let chip = self.loaded()?;
        let pins: Vec<Value> = chip
            .prepared
            .catalogue
            .iter()
            .map(|net| {
                json!({
                    "display_name": net.display_name,
                    "kind": net.kind,
                    "key": net.key,
                    "pin_count": net.pins.len(),
                    "partner": chip.pairs.partner(&net.display_name),
                    "connection": self.connections.owner_of(&net.display_name).map(|c| &c.id),
                })
            })
            .collect();
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "filepath": chip.path,
            "count": pins.len(),
            "outer_pins": pins,
        })))
    }

    fn call_resolve_pin(&self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let hint = str_arg(arguments, "hint")?;
        let chip = self.loaded()?;
        let resolver = chip
            .prepared
            .resolver_for(self.connections.snapshot())
            .map_err(|e| ToolCallResult::failure(&e))?;
        let net = resolver.resolve(hint).map_err(|e| ToolCallResult::failure(&e))?;

        let outer_pins: Vec<&str> = chip
            .prepared
            .catalogue
            .iter()
            .filter(|other| resolver.resolve(&other.display_name).is_ok_and(|n| n == net))
            .map(|other| other.display_name.as_str())
            .collect();
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "hint": hint,
            "net": net,
            "outer_pins": outer_pins,
        })))
    }

    fn call_find_bridge(&self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let from = str_arg(arguments, "from")?;
        let to = str_arg(arguments, "to")?;
        let chip = self.loaded()?;
        let catalogue = &chip.prepared.catalogue;

        let lookup = |name: &str| {
            catalogue
                .get(name)
                .ok_or_else(|| ToolCallResult::error(format!("Unknown outer pin: {name}")))
        };
        let (a, b) = (lookup(from)?, lookup(to)?);

        let finder = BridgeFinder::new(&chip.prepared.model, self.layout.adjacency_rules());
        let result = finder.find(a, b).map_or_else(
            || json!({ "status": "success", "from": from, "to": to, "found": false }),
            |bridge| {
                json!({
                    "status": "success",
                    "from": from,
                    "to": to,
                    "found": true,
                    "from_pad": bridge.from,
                    "to_pad": bridge.to,
                })
            },
        );
        Ok(ToolCallResult::json(&result))
    }

    /// Returns an unused `conn_<n>` id.
    fn fresh_id(&mut self) -> String {
        loop {
            let id = format!("conn_{}", self.created);
            self.created += 1;
            if self.connections.get(&id).is_none() {
                return id;
            }
        }
    }

    fn connection_json(&self, id: &str) -> Value {
        self.connections
            .get(id)
            .and_then(|c| serde_json::to_value(c).ok())
            .unwrap_or(Value::Null)
    }

    fn call_create_connection(
        &mut self,
        arguments: &Value,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let name = str_arg(arguments, "name")?;
        let color = arguments
            .get("color")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        let id = match arguments.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.fresh_id(),
        };

        self.connections
            .create(id.clone(), name, color)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "connection": self.connection_json(&id),
        })))
    }

    fn call_rename_connection(
        &mut self,
        arguments: &Value,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let id = str_arg(arguments, "id")?;
        let name = str_arg(arguments, "name")?;
        self.connections
            .rename(id, name)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "connection": self.connection_json(id),
        })))
    }

    fn call_set_connection_color(
        &mut self,
        arguments: &Value,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let id = str_arg(arguments, "id")?;
        let color = str_arg(arguments, "color")?;
        self.connections
            .set_color(id, color)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "connection": self.connection_json(id),
        })))
    }

    fn call_delete_connection(
        &mut self,
        arguments: &Value,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let id = str_arg(arguments, "id")?;
        let removed = self
            .connections
            .delete(id)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "deleted": removed,
        })))
    }

    fn call_add_pin(&mut self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let id = str_arg(arguments, "id")?;
        let pin = str_arg(arguments, "pin")?;
        let Some(chip) = &self.chip else {
            return Err(ToolCallResult::error("No chip loaded. Call load_chip first."));
        };

        self.connections
            .add_pin(id, pin, &chip.prepared.catalogue, &chip.pairs)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "connection": self.connection_json(id),
        })))
    }

    fn call_remove_pin(&mut self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let id = str_arg(arguments, "id")?;
        let pin = str_arg(arguments, "pin")?;
        let Some(chip) = &self.chip else {
            return Err(ToolCallResult::error("No chip loaded. Call load_chip first."));
        };

        self.connections
            .remove_pin(id, pin, &chip.pairs)
            .map_err(|e| ToolCallResult::failure(&e))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "connection": self.connection_json(id),
        })))
    }

    fn call_list_connections(&self) -> ToolCallResult {
        ToolCallResult::json(&json!({
            "status": "success",
            "count": self.connections.len(),
            "connections": self.connections,
        }))
    }

    fn call_load_connections(
        &mut self,
        arguments: &Value,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let filepath = str_arg(arguments, "filepath")?;
        self.validate_path(filepath).map_err(ToolCallResult::error)?;
        let Some(chip) = &self.chip else {
            return Err(ToolCallResult::error("No chip loaded. Call load_chip first."));
        };

        let contents = std::fs::read_to_string(filepath)
            .map_err(|e| ToolCallResult::failure(&InterconnectError::file_read(filepath, e)))?;
        let saved: Vec<UserConnection> = serde_json::from_str(&contents).map_err(|e| {
            ToolCallResult::error(format!("Invalid connections file '{filepath}': {e}"))
        })?;

        // Replay through the editing rules so a hand-edited file cannot
        // smuggle in an invalid snapshot.
        let mut rebuilt = ConnectionSet::new();
        for connection in &saved {
            let color = Some(connection.color.clone()).filter(|c| !c.is_empty());
            rebuilt
                .create(connection.id.clone(), connection.name.clone(), color)
                .map_err(|e| ToolCallResult::failure(&e))?;
            for pin in &connection.outer_pin_names {
                rebuilt
                    .add_pin(&connection.id, pin, &chip.prepared.catalogue, &chip.pairs)
                    .map_err(|e| ToolCallResult::failure(&e))?;
            }
        }

        self.connections = rebuilt;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "filepath": filepath,
            "count": self.connections.len(),
        })))
    }

    fn call_save_connections(&self, arguments: &Value) -> Result<ToolCallResult, ToolCallResult> {
        let filepath = str_arg(arguments, "filepath")?;
        self.validate_path(filepath).map_err(ToolCallResult::error)?;

        let json = serde_json::to_string_pretty(&self.connections)
            .map_err(|e| ToolCallResult::error(format!("Failed to serialise connections: {e}")))?;
        std::fs::write(filepath, json)
            .map_err(|e| ToolCallResult::failure(&InterconnectError::file_write(filepath, e)))?;
        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "filepath": filepath,
            "count": self.connections.len(),
        })))
    }

    fn call_generate(
        &self,
        arguments: &Value,
        variant: Variant,
    ) -> Result<ToolCallResult, ToolCallResult> {
        let output_path = arguments.get("output_path").and_then(Value::as_str);
        if let Some(path) = output_path {
            self.validate_path(path).map_err(ToolCallResult::error)?;
        }
        let chip = self.loaded()?;

        let generation = generate(
            &chip.prepared,
            self.connections.snapshot(),
            &self.layout.generator_settings(),
            variant,
        )
        .map_err(|e| ToolCallResult::failure(&e))?;

        if let Some(path) = output_path {
            let json = serde_json::to_string_pretty(&generation.records)
                .map_err(|e| ToolCallResult::error(format!("Failed to serialise records: {e}")))?;
            std::fs::write(path, json)
                .map_err(|e| ToolCallResult::failure(&InterconnectError::file_write(path, e)))?;
            tracing::info!(path = %path, "Wrote generated circuit");
        }

        Ok(ToolCallResult::json(&json!({
            "status": "success",
            "output_path": output_path,
            "summary": generation.summary,
            "records": generation.records,
        })))
    }

    /// Returns the list of available tools.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn definitions() -> Vec<ToolDefinition> {
        let tool = |name: &str, description: &str, input_schema: Value| ToolDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema,
        };
        let connection_pin = json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Connection id" },
                "pin": { "type": "string", "description": "Outer pin display name, e.g. C3 or X7" }
            },
            "required": ["id", "pin"]
        });
        let output = json!({
            "type": "object",
            "properties": {
                "output_path": {
                    "type": "string",
                    "description": "Optional: write the record list as JSON to this path"
                }
            }
        });

        vec![
            // === Chip ===
            tool(
                "load_chip",
                "Load a chip description (a JSON list of source_port, source_net, source_trace \
                 and pcb_smtpad records) and make it the session chip. Clears all connections.",
                json!({
                    "type": "object",
                    "properties": {
                        "filepath": {
                            "type": "string",
                            "description": "Path to the chip JSON file"
                        }
                    },
                    "required": ["filepath"]
                }),
            ),
            tool(
                "list_outer_pins",
                "List the chip's outer pins with kind (C or X), native net key, pin count, \
                 diagonal partner and owning connection.",
                json!({ "type": "object", "properties": {} }),
            ),
            tool(
                "resolve_pin",
                "Resolve any pin hint to its canonical net id under the current connections, \
                 and list the outer pins on that net.",
                json!({
                    "type": "object",
                    "properties": {
                        "hint": { "type": "string", "description": "Pin hint, e.g. C3 or pin42" }
                    },
                    "required": ["hint"]
                }),
            ),
            tool(
                "find_bridge",
                "Find a pair of adjacent pads joining two outer-pin nets. All coordinates are \
                 in millimetres (mm).",
                json!({
                    "type": "object",
                    "properties": {
                        "from": { "type": "string", "description": "First outer pin display name" },
                        "to": { "type": "string", "description": "Second outer pin display name" }
                    },
                    "required": ["from", "to"]
                }),
            ),
            // === Connections ===
            tool(
                "create_connection",
                "Create an empty named connection. The colour defaults to the next palette entry.",
                json!({
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Connection name; becomes the net name"
                        },
                        "id": {
                            "type": "string",
                            "description": "Optional: connection id (default conn_<n>)"
                        },
                        "color": { "type": "string", "description": "Optional: display colour" }
                    },
                    "required": ["name"]
                }),
            ),
            tool(
                "rename_connection",
                "Rename a connection.",
                json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "name": { "type": "string" }
                    },
                    "required": ["id", "name"]
                }),
            ),
            tool(
                "set_connection_color",
                "Change a connection's display colour.",
                json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "color": { "type": "string" }
                    },
                    "required": ["id", "color"]
                }),
            ),
            tool(
                "delete_connection",
                "Delete a connection, freeing its pins.",
                json!({
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                }),
            ),
            tool(
                "add_pin",
                "Add an outer pin to a connection. C and X pins cannot share a connection, a \
                 connection holds at most one diagonal X pair, and adding an X pin adds its \
                 partner too.",
                connection_pin.clone(),
            ),
            tool(
                "remove_pin",
                "Remove an outer pin from a connection. Removing an X pin removes its partner.",
                connection_pin,
            ),
            tool(
                "list_connections",
                "List all connections in creation order.",
                json!({ "type": "object", "properties": {} }),
            ),
            tool(
                "load_connections",
                "Replace the connections with those saved in a JSON file. Every pin is \
                 re-checked against the connection rules.",
                json!({
                    "type": "object",
                    "properties": { "filepath": { "type": "string" } },
                    "required": ["filepath"]
                }),
            ),
            tool(
                "save_connections",
                "Save the connections to a JSON file.",
                json!({
                    "type": "object",
                    "properties": { "filepath": { "type": "string" } },
                    "required": ["filepath"]
                }),
            ),
            // === Generation ===
            tool(
                "generate_fixture",
                "Generate a bench fixture: the chip pads plus one labelled test pad per outer \
                 pin around a square board, fan-out traces and bridge traces for each \
                 connection.",
                output.clone(),
            ),
            tool(
                "generate_footprint",
                "Generate a bare footprint: the chip pads at true scale with connection \
                 routing only.",
                output,
            ),
        ]
    }
}
