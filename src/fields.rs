//! Wire types shared between the browser side and the answer service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One form control discovered on a page.
///
/// `id` is the element's `id` attribute, falling back to `name`, falling
/// back to a synthetic `field_<index>` where the index is the element's
/// position among all scanned controls (before the hidden/submit/button
/// filter is applied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub r#type: String,
    pub label: String,
    #[serde(default)]
    pub placeholder: String,
}

/// Mapping from field id to generated answer text. The model may omit
/// fields it cannot answer, so this can be empty on a successful fill.
pub type AnswerMap = BTreeMap<String, String>;

/// Request body for `POST /api/fill`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRequest {
    pub profile: BTreeMap<String, String>,
    #[serde(rename = "formFields")]
    pub form_fields: Vec<FieldDescriptor>,
}

/// Reduce an arbitrary JSON value to a flat string map.
///
/// The model is asked for `{"field_id": "answer", ...}` but its adherence
/// is not trusted: any key whose value is not a JSON string is dropped,
/// and a non-object top level yields an empty map.
pub fn sanitize_answers(value: Value) -> AnswerMap {
    let Value::Object(map) = value else {
        return AnswerMap::new();
    };
    map.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect()
}
