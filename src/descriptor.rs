//! JVM type descriptor parsing.
//!
//! Converts raw descriptor strings like `(Ljava/lang/String;[I)V` into the
//! canonical dotted form used in reports: `java.lang.String`, `int[]`.

use std::fmt;

use crate::classfile::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaType {
    /// Dotted class name or primitive keyword (`int`, `void`, ...).
    pub base: String,
    /// Array dimensions, `[I` has one, `[[I` two.
    pub dims: usize,
}

impl JavaType {
    fn new(base: impl Into<String>, dims: usize) -> Self {
        Self { base: base.into(), dims }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for _ in 0..self.dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub raw: String,
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let bytes = raw.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed(raw, "missing opening parenthesis"));
        }

        let mut pos = 1usize;
        let mut params = Vec::new();
        while pos < bytes.len() && bytes[pos] != b')' {
            let (ty, next) = parse_type(raw, pos)?;
            params.push(ty);
            pos = next;
        }
        if pos >= bytes.len() {
            return Err(malformed(raw, "unterminated parameter list"));
        }

        let (ret, next) = parse_type(raw, pos + 1)?;
        if next != raw.len() {
            return Err(malformed(raw, "trailing bytes after return type"));
        }

        Ok(Self {
            raw: raw.to_string(),
            params,
            ret,
        })
    }

    /// Canonical parameter type names, in declaration order.
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.to_string()).collect()
    }
}

/// Converts an annotation type descriptor (`Lcom/ex/Foo;`) or internal
/// name (`com/ex/Foo`) to a dotted class name.
pub fn dotted_class_name(descriptor_or_internal: &str) -> String {
    let inner = descriptor_or_internal
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(descriptor_or_internal);
    inner.replace('/', ".")
}

/// Simple (unqualified) name of a class descriptor or internal name.
pub fn simple_class_name(descriptor_or_internal: &str) -> String {
    let dotted = dotted_class_name(descriptor_or_internal);
    dotted
        .rsplit('.')
        .next()
        .unwrap_or(dotted.as_str())
        .to_string()
}

fn parse_type(raw: &str, mut pos: usize) -> Result<(JavaType, usize), DecodeError> {
    let bytes = raw.as_bytes();
    let mut dims = 0usize;
    while bytes.get(pos) == Some(&b'[') {
        dims += 1;
        pos += 1;
    }

    let tag = *bytes
        .get(pos)
        .ok_or_else(|| malformed(raw, "descriptor ends inside a type"))?;
    let (base, next) = match tag {
        b'B' => ("byte".to_string(), pos + 1),
        b'C' => ("char".to_string(), pos + 1),
        b'D' => ("double".to_string(), pos + 1),
        b'F' => ("float".to_string(), pos + 1),
        b'I' => ("int".to_string(), pos + 1),
        b'J' => ("long".to_string(), pos + 1),
        b'S' => ("short".to_string(), pos + 1),
        b'Z' => ("boolean".to_string(), pos + 1),
        b'V' => ("void".to_string(), pos + 1),
        b'L' => {
            let end = raw[pos..]
                .find(';')
                .map(|off| pos + off)
                .ok_or_else(|| malformed(raw, "unterminated class type"))?;
            (raw[pos + 1..end].replace('/', "."), end + 1)
        }
        other => {
            return Err(malformed(raw, format!("unknown type tag '{}'", other as char)));
        }
    };

    Ok((JavaType::new(base, dims), next))
}

fn malformed(raw: &str, message: impl Into<String>) -> DecodeError {
    DecodeError::BadDescriptor {
        descriptor: raw.to_string(),
        message: message.into(),
    }
}
