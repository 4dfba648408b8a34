use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// LSP `SymbolKind.Method`.
const LSP_METHOD: i64 = 6;
/// LSP `SymbolKind.Constructor`.
const LSP_CONSTRUCTOR: i64 = 9;

/// Symbol overview supplied by an external analysis service.
///
/// The payload is read leniently: a field that is missing, null or of the
/// wrong type falls back to its default, and children that are not objects
/// are dropped. Anything else in the payload is ignored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTree {
    pub name: Option<String>,
    pub children: Vec<SymbolNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolNode {
    pub kind: Option<KindTag>,
    pub name: String,
    pub detail: Option<String>,
}

/// Raw kind as sent on the wire: an LSP numeric code or a string tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KindTag {
    Code(i64),
    Name(String),
    Unrecognized(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Method,
    Constructor,
    Other,
}

fn text_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

impl KindTag {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(match n.as_i64() {
                Some(code) => KindTag::Code(code),
                None => KindTag::Unrecognized(value.clone()),
            }),
            Value::String(tag) => Some(KindTag::Name(tag.clone())),
            other => Some(KindTag::Unrecognized(other.clone())),
        }
    }
}

impl SymbolNode {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            kind: object.get("kind").and_then(KindTag::from_value),
            name: text_field(object, "name").unwrap_or_default(),
            detail: text_field(object, "detail"),
        })
    }

    pub fn kind(&self) -> SymbolKind {
        match &self.kind {
            Some(KindTag::Code(LSP_METHOD)) => SymbolKind::Method,
            Some(KindTag::Code(LSP_CONSTRUCTOR)) => SymbolKind::Constructor,
            Some(KindTag::Name(tag)) => match tag.as_str() {
                "method" | "function" => SymbolKind::Method,
                "constructor" => SymbolKind::Constructor,
                _ => SymbolKind::Other,
            },
            _ => SymbolKind::Other,
        }
    }

    pub fn detail(&self) -> &str {
        self.detail.as_deref().unwrap_or("")
    }
}

impl SymbolTree {
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };
        let children = object
            .get("children")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(SymbolNode::from_value).collect())
            .unwrap_or_default();
        Self {
            name: text_field(object, "name"),
            children,
        }
    }
}

impl<'de> Deserialize<'de> for SymbolTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}
