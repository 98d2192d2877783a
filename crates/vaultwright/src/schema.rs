use serde_yaml::{Mapping, Value};

use crate::diagnostics::{Warning, WarningKind};
use crate::note::file_stem;

/// Declared constraint set for frontmatter mappings. Applied independently
/// per note; additive and corrective, never destructive of unknown fields.
#[derive(Clone, Debug, Default)]
pub struct FrontmatterSchema {
    pub fields: Vec<FieldSpec>,
}

impl FrontmatterSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub name: String,
    pub required: bool,
    pub kind: FieldKind,
    /// Injected when the field is absent.
    pub default: Option<Value>,
    pub normalize: Option<Normalization>,
    /// Derivation rule overriding whatever value is present; used to keep a
    /// title field consistent with the note's (post-rename) filename.
    pub derive: Option<DeriveRule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            required: false,
            kind,
            default: None,
            normalize: None,
            derive: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn normalized(mut self, rule: Normalization) -> Self {
        self.normalize = Some(rule);
        self
    }

    pub fn derived(mut self, rule: DeriveRule) -> Self {
        self.derive = Some(rule);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Seq,
    Bool,
    Number,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Normalization {
    Lowercase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeriveRule {
    /// The field's value is the note's file stem.
    FileStem,
}

/// Validates and corrects one frontmatter mapping against the schema.
///
/// Declared fields are coerced where convertible, injected from defaults or
/// derivation rules where absent, and left untouched (with a recorded
/// violation) where not coercible. Undeclared fields pass through in their
/// original order. Output is deterministic for a given input and schema.
///
/// Violations are reported against `rel_path`, the path the note has right
/// now; `derive_path` is the path the note will end up at, which is what a
/// derived field must reflect.
pub fn normalize(
    mapping: &Mapping,
    schema: &FrontmatterSchema,
    rel_path: &str,
    derive_path: &str,
) -> (Mapping, Vec<Warning>) {
    let mut out = Mapping::new();
    let mut warnings = Vec::new();

    for (key, value) in mapping {
        let spec = key
            .as_str()
            .and_then(|name| schema.fields.iter().find(|f| f.name == name));
        match spec {
            Some(spec) => {
                let value = match spec.derive {
                    Some(DeriveRule::FileStem) => Value::String(file_stem(derive_path).to_string()),
                    None => coerce(value, spec, rel_path, &mut warnings),
                };
                out.insert(key.clone(), value);
            }
            None => {
                out.insert(key.clone(), value.clone());
            }
        }
    }

    // Absent declared fields, in schema order.
    for spec in &schema.fields {
        let key = Value::String(spec.name.clone());
        if out.contains_key(&key) {
            continue;
        }
        if let Some(DeriveRule::FileStem) = spec.derive {
            out.insert(key, Value::String(file_stem(derive_path).to_string()));
        } else if let Some(default) = &spec.default {
            out.insert(key, default.clone());
        } else if spec.required {
            warnings.push(Warning::new(
                WarningKind::SchemaViolation,
                Some(rel_path),
                format!("required field `{}` is missing and has no default", spec.name),
            ));
        }
    }

    (out, warnings)
}

fn coerce(value: &Value, spec: &FieldSpec, rel_path: &str, warnings: &mut Vec<Warning>) -> Value {
    let coerced = match spec.kind {
        FieldKind::Seq => match value {
            Value::Sequence(_) => Some(value.clone()),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                Some(Value::Sequence(vec![value.clone()]))
            }
            _ => None,
        },
        FieldKind::Str => match value {
            Value::String(_) => Some(value.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldKind::Bool => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldKind::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| Value::Number(f.into()))),
            _ => None,
        },
    };

    match coerced {
        Some(value) => apply_normalization(value, spec),
        None => {
            warnings.push(Warning::new(
                WarningKind::SchemaViolation,
                Some(rel_path),
                format!(
                    "field `{}` has a value not coercible to {:?}; keeping it as written",
                    spec.name, spec.kind
                ),
            ));
            value.clone()
        }
    }
}

fn apply_normalization(value: Value, spec: &FieldSpec) -> Value {
    match (spec.normalize, value) {
        (Some(Normalization::Lowercase), Value::String(s)) => Value::String(s.to_lowercase()),
        (Some(Normalization::Lowercase), Value::Sequence(seq)) => Value::Sequence(
            seq.into_iter()
                .map(|v| match v {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                })
                .collect(),
        ),
        (_, value) => value,
    }
}
