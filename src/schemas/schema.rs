use schemars::{schema::RootSchema, schema_for};
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::types::plan::GeneratedPlan;

const PLAN_SCHEMA_NAME: &str = "generated_plan";

/// Cached JSON schema for the plan payload.
#[derive(Clone, Debug)]
pub struct SchemaHandle {
    schema_name: &'static str,
    schema_json: Arc<Value>,
}

impl SchemaHandle {
    pub fn from_root_schema(schema_name: &'static str, root: RootSchema) -> Self {
        let schema_json = serde_json::to_value(root).unwrap_or_else(|err| {
            panic!("failed to serialize schema for {}: {}", schema_name, err)
        });

        Self {
            schema_name,
            schema_json: Arc::new(schema_json),
        }
    }

    pub fn schema_name(&self) -> &'static str {
        self.schema_name
    }

    pub fn schema_json(&self) -> &Value {
        self.schema_json.as_ref()
    }

    /// OpenAI-style `response_format` requesting output that matches this schema.
    pub fn response_format(&self) -> Value {
        serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.schema_name,
                "schema": self.schema_json(),
            }
        })
    }
}

/// Schema of [`GeneratedPlan`], built once per process.
pub fn plan_schema() -> &'static SchemaHandle {
    static HANDLE: OnceLock<SchemaHandle> = OnceLock::new();
    HANDLE.get_or_init(|| {
        let mut root = schema_for!(GeneratedPlan);
        let metadata = root.schema.metadata();
        if metadata.description.is_none() {
            metadata.description = Some("AI-generated travel plan".to_string());
        }
        SchemaHandle::from_root_schema(PLAN_SCHEMA_NAME, root)
    })
}
