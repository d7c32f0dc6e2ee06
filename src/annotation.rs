//! Annotation views and element values.
//!
//! An `AnnotationView` is one decoded annotation: its type descriptor plus
//! the element-value pairs. Values are modeled as a tagged variant with the
//! five shapes the class-file format allows: primitive, enum reference,
//! class reference, nested annotation, and sequence. Nesting recursion is
//! bounded by the attribute bytes themselves.

use std::fmt;

use crate::classfile::DecodeError;
use crate::descriptor::{dotted_class_name, simple_class_name};
use crate::pool::ConstantPool;
use crate::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    /// Enum constant reference: dotted type name plus the constant name.
    Enum { type_name: String, constant: String },
    /// Class literal reference, dotted.
    ClassRef(String),
    Nested(AnnotationView),
    Seq(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn expect_str(&self) -> Result<&str, DecodeError> {
        match self {
            AnnotationValue::Str(s) => Ok(s),
            other => Err(shape_error("string", other)),
        }
    }

    pub fn expect_bool(&self) -> Result<bool, DecodeError> {
        match self {
            AnnotationValue::Bool(b) => Ok(*b),
            other => Err(shape_error("boolean", other)),
        }
    }

    pub fn expect_seq(&self) -> Result<&[AnnotationValue], DecodeError> {
        match self {
            AnnotationValue::Seq(items) => Ok(items),
            other => Err(shape_error("sequence", other)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Flattens a scalar string or a sequence of strings; any other shape
    /// yields an empty list. Mapping attributes (`value`, `path`,
    /// `produces`, `consumes`) arrive in both forms.
    pub fn string_list(&self) -> Vec<String> {
        match self {
            AnnotationValue::Str(s) => vec![s.clone()],
            AnnotationValue::Seq(items) => items
                .iter()
                .filter_map(|v| match v {
                    AnnotationValue::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Enum constant names from a scalar enum value or a sequence of them.
    pub fn enum_constants(&self) -> Vec<String> {
        match self {
            AnnotationValue::Enum { constant, .. } => vec![constant.clone()],
            AnnotationValue::Seq(items) => items
                .iter()
                .filter_map(|v| match v {
                    AnnotationValue::Enum { constant, .. } => Some(constant.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Str(s) => write!(f, "{s}"),
            AnnotationValue::Int(v) => write!(f, "{v}"),
            AnnotationValue::Bool(v) => write!(f, "{v}"),
            AnnotationValue::Float(v) => write!(f, "{v}"),
            AnnotationValue::Enum { type_name, constant } => {
                write!(f, "{type_name}.{constant}")
            }
            AnnotationValue::ClassRef(name) => write!(f, "{name}.class"),
            AnnotationValue::Nested(view) => write!(f, "{}", view.render()),
            AnnotationValue::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationView {
    /// Raw type descriptor, e.g. `Lorg/springframework/web/bind/annotation/GetMapping;`.
    pub descriptor: String,
    pub pairs: Vec<(String, AnnotationValue)>,
}

impl AnnotationView {
    pub fn type_name(&self) -> String {
        dotted_class_name(&self.descriptor)
    }

    pub fn simple_name(&self) -> String {
        simple_class_name(&self.descriptor)
    }

    pub fn get(&self, attribute: &str) -> Option<&AnnotationValue> {
        self.pairs
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }

    /// `@SimpleName(attr=value, ...)` rendering for report output.
    pub fn render(&self) -> String {
        if self.pairs.is_empty() {
            return format!("@{}", self.simple_name());
        }
        let attrs: Vec<String> = self
            .pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("@{}({})", self.simple_name(), attrs.join(", "))
    }
}

/// Parses a `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`
/// attribute body: `u16 count` followed by that many annotations.
pub fn parse_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<AnnotationView>, DecodeError> {
    let count = r.u16()?;
    let mut views = Vec::with_capacity(count as usize);
    for _ in 0..count {
        views.push(parse_annotation(r, pool)?);
    }
    Ok(views)
}

/// Parses a `Runtime(In)VisibleParameterAnnotations` attribute body:
/// `u8 num_parameters`, then one annotation table per parameter.
pub fn parse_parameter_annotations(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Vec<AnnotationView>>, DecodeError> {
    let num_params = r.u8()?;
    let mut per_param = Vec::with_capacity(num_params as usize);
    for _ in 0..num_params {
        per_param.push(parse_annotations(r, pool)?);
    }
    Ok(per_param)
}

pub fn parse_annotation(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<AnnotationView, DecodeError> {
    let type_index = r.u16()?;
    let descriptor = pool.utf8(type_index)?.to_string();
    let num_pairs = r.u16()?;
    let mut pairs = Vec::with_capacity(num_pairs as usize);
    for _ in 0..num_pairs {
        let name_index = r.u16()?;
        let name = pool.utf8(name_index)?.to_string();
        let value = parse_element_value(r, pool)?;
        pairs.push((name, value));
    }
    Ok(AnnotationView { descriptor, pairs })
}

pub fn parse_element_value(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<AnnotationValue, DecodeError> {
    let tag = r.u8()?;
    let value = match tag {
        b'B' | b'C' | b'I' | b'S' => AnnotationValue::Int(pool.integer(r.u16()?)? as i64),
        b'Z' => AnnotationValue::Bool(pool.integer(r.u16()?)? != 0),
        b'J' => AnnotationValue::Int(pool.long(r.u16()?)?),
        b'F' => AnnotationValue::Float(pool.float(r.u16()?)? as f64),
        b'D' => AnnotationValue::Float(pool.double(r.u16()?)?),
        b's' => AnnotationValue::Str(pool.utf8(r.u16()?)?.to_string()),
        b'e' => {
            let type_index = r.u16()?;
            let const_index = r.u16()?;
            AnnotationValue::Enum {
                type_name: dotted_class_name(pool.utf8(type_index)?),
                constant: pool.utf8(const_index)?.to_string(),
            }
        }
        b'c' => AnnotationValue::ClassRef(dotted_class_name(pool.utf8(r.u16()?)?)),
        b'@' => AnnotationValue::Nested(parse_annotation(r, pool)?),
        b'[' => {
            let count = r.u16()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(parse_element_value(r, pool)?);
            }
            AnnotationValue::Seq(items)
        }
        other => {
            return Err(DecodeError::MalformedAnnotation {
                message: format!("unknown element-value tag {:#04x}", other),
            });
        }
    };
    Ok(value)
}

fn shape_error(expected: &str, actual: &AnnotationValue) -> DecodeError {
    DecodeError::MalformedAnnotation {
        message: format!("expected {expected} element value, found {actual:?}"),
    }
}
