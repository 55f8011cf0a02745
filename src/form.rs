//! Configuration form builder: a typed form from a server-supplied schema.
//!
//! The server describes each engine's options as loosely-typed field
//! descriptors. [`build_form`] resolves every descriptor into a closed
//! [`FieldKind`] once, at load time, so editing and collecting values never
//! branch on raw type strings again.
//!
//! Switching services means building a new form: no values are carried
//! across.

use crate::api::{FieldDescriptor, ServiceDescriptor};
use crate::error::ValidationError;
use crate::translation::PrimitiveValue;
use std::collections::BTreeMap;

/// How a field is rendered and what values it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Masked free text (API keys).
    Secret,
    /// Numeric input; `integer` rejects fractional values.
    Number { integer: bool },
    /// Toggle.
    Boolean,
    /// Display-only; never submitted.
    ReadOnly { display: String },
}

impl FieldKind {
    /// Resolve a descriptor's `type` / `readonly` / `is_password` flags.
    pub fn from_descriptor(d: &FieldDescriptor) -> Self {
        if d.readonly {
            return FieldKind::ReadOnly {
                display: display_json(&d.default),
            };
        }
        match d.field_type.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => FieldKind::Boolean,
            "int" | "integer" => FieldKind::Number { integer: true },
            "float" | "number" => FieldKind::Number { integer: false },
            _ if d.is_password => FieldKind::Secret,
            _ => FieldKind::Text,
        }
    }

    pub fn is_editable(&self) -> bool {
        !matches!(self, FieldKind::ReadOnly { .. })
    }
}

/// Render a JSON default for display; objects become `key: value` lists.
fn display_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", display_json(v)))
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_json)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
    pub required: bool,
    pub value: Option<PrimitiveValue>,
}

impl FormField {
    fn from_descriptor(d: &FieldDescriptor) -> Self {
        let kind = FieldKind::from_descriptor(d);
        let value = match &kind {
            FieldKind::ReadOnly { .. } => None,
            FieldKind::Boolean => Some(PrimitiveValue::Bool(d.default.as_bool().unwrap_or(false))),
            FieldKind::Number { integer: true } => d.default.as_i64().map(PrimitiveValue::Int),
            FieldKind::Number { integer: false } => d.default.as_f64().map(PrimitiveValue::Float),
            FieldKind::Text | FieldKind::Secret => PrimitiveValue::from_json(&d.default)
                .map(|v| v.to_string())
                .filter(|s| !s.is_empty())
                .map(PrimitiveValue::Text),
        };
        Self {
            name: d.name.clone(),
            description: d.description.clone(),
            kind,
            required: d.required,
            value,
        }
    }

    /// Value as shown to the user; secrets are masked.
    pub fn display_value(&self) -> String {
        match (&self.kind, &self.value) {
            (FieldKind::ReadOnly { display }, _) => display.clone(),
            (FieldKind::Secret, Some(_)) => "••••••••".to_string(),
            (_, Some(v)) => v.to_string(),
            (_, None) => String::new(),
        }
    }

    fn parse(&self, raw: &str) -> Result<Option<PrimitiveValue>, ValidationError> {
        let raw = raw.trim();
        let invalid = |reason: &str| ValidationError::InvalidFieldValue {
            field: self.name.clone(),
            reason: reason.to_string(),
        };
        match &self.kind {
            FieldKind::ReadOnly { .. } => Err(ValidationError::ReadOnlyField {
                field: self.name.clone(),
            }),
            _ if raw.is_empty() => Ok(None),
            FieldKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(PrimitiveValue::Bool(true))),
                "false" | "0" | "no" | "off" => Ok(Some(PrimitiveValue::Bool(false))),
                _ => Err(invalid("expected true or false")),
            },
            FieldKind::Number { integer: true } => raw
                .parse::<i64>()
                .map(|n| Some(PrimitiveValue::Int(n)))
                .map_err(|_| invalid("expected an integer")),
            FieldKind::Number { integer: false } => match raw.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Some(PrimitiveValue::Float(x))),
                _ => Err(invalid("expected a number")),
            },
            FieldKind::Text | FieldKind::Secret => Ok(Some(PrimitiveValue::Text(raw.to_string()))),
        }
    }
}

/// An editable form for one service.
#[derive(Debug, Clone, PartialEq)]
pub struct FormModel {
    pub service: String,
    fields: Vec<FormField>,
}

impl FormModel {
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Parse `raw` according to the field's kind and store it. An empty
    /// string clears the value.
    pub fn set_value(&mut self, name: &str, raw: &str) -> Result<(), ValidationError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| ValidationError::UnknownField {
                field: name.to_string(),
            })?;
        field.value = field.parse(raw)?;
        Ok(())
    }

    /// Every required, editable field has a value.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self
            .fields
            .iter()
            .find(|f| f.required && f.kind.is_editable() && f.value.is_none())
        {
            Some(f) => Err(ValidationError::MissingField {
                field: f.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Values of editable fields that are set; read-only fields are never
    /// included.
    pub fn collect_values(&self) -> BTreeMap<String, PrimitiveValue> {
        self.fields
            .iter()
            .filter(|f| f.kind.is_editable())
            .filter_map(|f| f.value.clone().map(|v| (f.name.clone(), v)))
            .collect()
    }
}

/// Build a fresh form from a service descriptor.
///
/// Fields keep the descriptor's order. A repeated name replaces the earlier
/// field in place (last write wins).
pub fn build_form(service: &ServiceDescriptor) -> FormModel {
    let mut fields: Vec<FormField> = Vec::with_capacity(service.fields.len());
    for descriptor in &service.fields {
        let field = FormField::from_descriptor(descriptor);
        match fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => fields.push(field),
        }
    }
    FormModel {
        service: service.name.clone(),
        fields,
    }
}

/// Engine-specific settings for the translation request.
pub fn collect_values(form: &FormModel) -> BTreeMap<String, PrimitiveValue> {
    form.collect_values()
}
