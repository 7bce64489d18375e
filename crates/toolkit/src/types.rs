//! Wire types for the toolkit service's REST API.

use mailgate_tool_runtime::tool::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ── Tool catalog ────────────────────────────────────────────────────

/// Response of `GET /v1/tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    #[serde(default)]
    pub items: Vec<ToolSpec>,
    #[serde(default)]
    pub total_count: Option<usize>,
}

/// A tool as described by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Bare tool name, e.g. `SendEmail`.
    pub name: String,
    /// `Toolkit.Tool`, e.g. `OutlookMail.SendEmail`.
    #[serde(default)]
    pub qualified_name: Option<String>,
    #[serde(default)]
    pub fully_qualified_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub toolkit: ToolkitInfo,
    #[serde(default)]
    pub input: ToolInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolkitInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub value_schema: ValueSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSchema {
    pub val_type: String,
    #[serde(default)]
    pub inner_val_type: Option<String>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<String>>,
}

impl ToolSpec {
    /// Name the service uses for authorization and execution.
    pub fn qualified_name(&self) -> String {
        self.qualified_name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.toolkit.name, self.name))
    }

    /// Name exposed to the model. Function names may not contain dots.
    pub fn llm_name(&self) -> String {
        format!("{}_{}", self.toolkit.name, self.name)
    }

    /// JSON Schema for the tool's input object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.input.parameters {
            let mut schema = value_schema_to_json(&param.value_schema);
            if let (Some(desc), Some(obj)) = (&param.description, schema.as_object_mut()) {
                obj.insert("description".to_string(), Value::String(desc.clone()));
            }
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            name: spec.llm_name(),
            description: spec.description.clone(),
            input_schema: spec.input_schema(),
        }
    }
}

/// Map a model-facing `Toolkit_Tool` name back to `Toolkit.Tool`.
/// Names that already contain a dot are returned as-is.
pub fn qualified_from_llm_name(name: &str) -> String {
    if name.contains('.') {
        return name.to_string();
    }
    name.replacen('_', ".", 1)
}

fn json_type(val_type: &str) -> &'static str {
    match val_type {
        "integer" => "integer",
        "number" => "number",
        "boolean" => "boolean",
        "array" => "array",
        "json" => "object",
        _ => "string",
    }
}

fn value_schema_to_json(schema: &ValueSchema) -> Value {
    let mut out = Map::new();
    out.insert("type".to_string(), json!(json_type(&schema.val_type)));

    if schema.val_type == "array" {
        let inner = schema.inner_val_type.as_deref().unwrap_or("string");
        out.insert("items".to_string(), json!({ "type": json_type(inner) }));
    }
    if let Some(values) = &schema.enum_values {
        if !values.is_empty() {
            out.insert("enum".to_string(), json!(values));
        }
    }
    Value::Object(out)
}

// ── Authorization ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub tool_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    NotStarted,
    Pending,
    Completed,
    Failed,
}

/// Response of `POST /v1/tools/authorize` and `GET /v1/auth/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: AuthStatus,
    #[serde(default)]
    pub url: Option<String>,
}

// ── Execution ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub tool_name: String,
    pub input: Value,
    pub user_id: String,
}

/// Response of `POST /v1/tools/execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub output: Option<ExecuteOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutput {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<ExecuteErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteErrorBody {
    pub message: String,
}
