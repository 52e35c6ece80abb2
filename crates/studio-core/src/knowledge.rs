use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Knowledge base (dataset) exposed by the external search service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub vector_model: Value,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub update_time: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: String,
}

impl KnowledgeBase {
    /// Normalizes one upstream dataset object (`_id`, `intro`, ...).
    pub fn from_dataset(dataset: &Value) -> Self {
        let text = |key: &str| {
            dataset
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: text("_id"),
            name: text("name"),
            description: text("intro"),
            avatar: text("avatar"),
            vector_model: dataset
                .get("vectorModel")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
            tags: dataset
                .get("tags")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            create_time: text("createTime"),
            update_time: text("updateTime"),
            kind: text("type"),
            status: text("status"),
        }
    }
}

/// Accepts `{"data": [...]}`, a bare array, or anything else (empty).
pub fn parse_dataset_list(payload: &Value) -> Vec<KnowledgeBase> {
    let datasets = match payload {
        Value::Object(map) => map.get("data").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };
    datasets
        .map(|items| items.iter().map(KnowledgeBase::from_dataset).collect())
        .unwrap_or_default()
}
