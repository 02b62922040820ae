//! Typed parameter schemas declared by each tool.
//!
//! The schema is the single source of truth for which keys a tool accepts,
//! which are required, their defaults and the question used to ask for them.

use fc_protocol::Parameters;
use serde_json::Value;

/// Accepted value shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Boolean,
    Integer,
    /// One of a closed set of lowercase identifiers.
    Choice(&'static [&'static str]),
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            Self::Text | Self::Choice(_) => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
        }
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: &'static str,
    question: Option<&'static str>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
            question: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Targeted question used when this parameter is missing.
    pub fn asking(mut self, question: &'static str) -> Self {
        self.question = Some(question);
        self
    }

    pub fn question(&self) -> String {
        match self.question {
            Some(q) => q.to_string(),
            None => format!("Puoi fornire: {}?", self.name),
        }
    }

    /// Convert `value` into this parameter's canonical form, or `None` if it
    /// is not compatible.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match self.kind {
            ParamKind::Text => match value {
                Value::String(s) => {
                    let s = s.trim();
                    (!s.is_empty()).then(|| Value::String(s.to_string()))
                }
                Value::Number(n) => Some(Value::String(n.to_string())),
                _ => None,
            },
            ParamKind::Boolean => match value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::String(s) => parse_bool(s).map(Value::Bool),
                _ => None,
            },
            ParamKind::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .map(Value::from),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            ParamKind::Choice(values) => {
                let s = value.as_str()?.trim().to_lowercase().replace([' ', '-'], "_");
                values
                    .iter()
                    .find(|v| **v == s)
                    .map(|v| Value::String((*v).to_string()))
            }
        }
    }
}

/// Recognize yes/no words in Italian and English.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "sì" | "si" | "yes" | "y" | "certo" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Ordered parameter declarations of a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
}

impl ToolSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Canonical value for `name`, or `None` if the key is undeclared or the
    /// value is incompatible.
    pub fn coerce(&self, name: &str, value: &Value) -> Option<Value> {
        self.param(name)?.coerce(value)
    }

    /// Keep only declared keys whose values coerce, in canonical form.
    pub fn retain_compatible(&self, params: &Parameters) -> Parameters {
        params
            .iter()
            .filter_map(|(k, v)| self.coerce(k, v).map(|c| (k.clone(), c)))
            .collect()
    }

    /// Required parameters without a default that are absent or empty,
    /// in declared order.
    pub fn missing_required(&self, params: &Parameters) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| p.required && p.default.is_none())
            .filter(|p| !is_present(params.get(p.name)))
            .map(|p| p.name.to_string())
            .collect()
    }

    /// Fill declared defaults for absent parameters. Applied at execution time.
    pub fn with_defaults(&self, params: &Parameters) -> Parameters {
        let mut out = params.clone();
        for p in &self.params {
            if let Some(default) = &p.default
                && !is_present(out.get(p.name))
            {
                out.insert(p.name.to_string(), default.clone());
            }
        }
        out
    }

    /// JSON Schema rendering, used in prompts and the tool listing API.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for p in &self.params {
            let mut prop = serde_json::json!({
                "type": p.kind.json_type(),
                "description": p.description,
            });
            if let ParamKind::Choice(values) = p.kind {
                prop["enum"] = serde_json::json!(values);
            }
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            properties.insert(p.name.to_string(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}
