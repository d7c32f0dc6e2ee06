//! Class-file decoder.
//!
//! Parses the subset of the class-file format the endpoint inference needs:
//! constant pool, class identity, runtime annotation tables at class,
//! method and parameter scope, method descriptors, and the call targets of
//! every method body. Everything else (fields, stack maps, debug tables)
//! is skipped over by recorded attribute lengths.

use thiserror::Error;
use tracing::warn;

use crate::annotation::{AnnotationView, parse_annotations, parse_parameter_annotations};
use crate::descriptor::{MethodDescriptor, dotted_class_name};
use crate::opcodes;
use crate::pool::ConstantPool;
use crate::reader::ByteReader;

const MAGIC: u32 = 0xCAFE_BABE;
/// Highest class-file major version this decoder has been written against
/// (Java 25). Newer files decode best-effort with a warning.
const KNOWN_MAJOR: u16 = 69;

/// Errors for a single class entry. These never abort a whole analysis run;
/// the entry is skipped and reported.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("class file truncated at offset {at}")]
    Truncated { at: usize },

    #[error("not a class file (magic {magic:#010x})")]
    BadMagic { magic: u32 },

    #[error("bad constant pool entry {index}: {message}")]
    BadConstantPool { index: u16, message: String },

    #[error("bad descriptor '{descriptor}': {message}")]
    BadDescriptor { descriptor: String, message: String },

    #[error("malformed annotation: {message}")]
    MalformedAnnotation { message: String },

    #[error("unknown opcode {opcode:#04x} at code offset {at}")]
    UnknownOpcode { opcode: u8, at: usize },
}

impl DecodeError {
    pub fn bad_pool(index: u16, message: impl Into<String>) -> Self {
        Self::BadConstantPool {
            index,
            message: message.into(),
        }
    }
}

/// A method-invocation site: `(owner FQN, name, descriptor)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl CallTarget {
    /// Lowercased `owner.name` form the mutation and validation heuristics
    /// match against.
    pub fn qualified_lower(&self) -> String {
        format!("{}.{}", self.owner, self.name).to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct MethodView {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub annotations: Vec<AnnotationView>,
    /// Annotations per parameter position. Length never exceeds the
    /// parameter count of the descriptor.
    pub parameter_annotations: Vec<Vec<AnnotationView>>,
    pub calls: Vec<CallTarget>,
}

#[derive(Debug, Clone)]
pub struct ClassView {
    /// Fully-qualified dotted name.
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<AnnotationView>,
    pub methods: Vec<MethodView>,
}

/// Decodes one class file.
pub fn decode(bytes: &[u8]) -> Result<ClassView, DecodeError> {
    let mut r = ByteReader::new(bytes);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic { magic });
    }
    let _minor = r.u16()?;
    let major = r.u16()?;

    let pool = ConstantPool::parse(&mut r)?;

    let _access_flags = r.u16()?;
    let this_class = r.u16()?;
    let name = dotted_class_name(pool.class_name(this_class)?);
    if major > KNOWN_MAJOR {
        warn!(class = %name, major, "class file newer than supported, decoding best-effort");
    }

    let super_index = r.u16()?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(dotted_class_name(pool.class_name(super_index)?))
    };

    let interface_count = r.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(dotted_class_name(pool.class_name(r.u16()?)?));
    }

    skip_fields(&mut r)?;

    let method_count = r.u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(decode_method(&mut r, &pool, &name)?);
    }

    let annotations = decode_class_attributes(&mut r, &pool, &name)?;

    Ok(ClassView {
        name,
        super_name,
        interfaces,
        annotations,
        methods,
    })
}

fn skip_fields(r: &mut ByteReader<'_>) -> Result<(), DecodeError> {
    let field_count = r.u16()?;
    for _ in 0..field_count {
        r.skip(6)?; // access_flags, name_index, descriptor_index
        skip_attributes(r)?;
    }
    Ok(())
}

fn skip_attributes(r: &mut ByteReader<'_>) -> Result<(), DecodeError> {
    let count = r.u16()?;
    for _ in 0..count {
        r.skip(2)?; // attribute_name_index
        let len = r.u32()? as usize;
        r.skip(len)?;
    }
    Ok(())
}

fn decode_method(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
    class_name: &str,
) -> Result<MethodView, DecodeError> {
    let _access_flags = r.u16()?;
    let name = pool.utf8(r.u16()?)?.to_string();
    let raw_descriptor = pool.utf8(r.u16()?)?;
    let descriptor = MethodDescriptor::parse(raw_descriptor)?;
    let param_count = descriptor.params.len();

    let mut annotations = Vec::new();
    let mut parameter_annotations: Vec<Vec<AnnotationView>> = Vec::new();
    let mut calls = Vec::new();

    let attr_count = r.u16()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(r.u16()?)?.to_string();
        let len = r.u32()? as usize;
        let end = r.position() + len;

        match attr_name.as_str() {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                match parse_annotations(r, pool) {
                    Ok(mut views) => annotations.append(&mut views),
                    Err(DecodeError::MalformedAnnotation { message }) => {
                        warn!(class = class_name, method = %name, %message, "skipping annotation attribute");
                    }
                    Err(other) => return Err(other),
                }
            }
            "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
                match parse_parameter_annotations(r, pool) {
                    Ok(per_param) => merge_parameter_annotations(
                        &mut parameter_annotations,
                        per_param,
                        param_count,
                    ),
                    Err(DecodeError::MalformedAnnotation { message }) => {
                        warn!(class = class_name, method = %name, %message, "skipping parameter annotation attribute");
                    }
                    Err(other) => return Err(other),
                }
            }
            "Code" => {
                let mut body_calls = decode_code(r, pool)?;
                calls.append(&mut body_calls);
            }
            _ => {}
        }

        r.seek(end)?;
    }

    Ok(MethodView {
        name,
        descriptor,
        annotations,
        parameter_annotations,
        calls,
    })
}

/// Visible and invisible tables merge per position; entries past the
/// descriptor's parameter count (compiler-synthetic slots) are dropped.
fn merge_parameter_annotations(
    merged: &mut Vec<Vec<AnnotationView>>,
    per_param: Vec<Vec<AnnotationView>>,
    param_count: usize,
) {
    for (index, views) in per_param.into_iter().enumerate() {
        if index >= param_count {
            break;
        }
        if merged.len() <= index {
            merged.resize_with(index + 1, Vec::new);
        }
        merged[index].extend(views);
    }
}

fn decode_class_attributes(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
    class_name: &str,
) -> Result<Vec<AnnotationView>, DecodeError> {
    let mut annotations = Vec::new();
    let count = r.u16()?;
    for _ in 0..count {
        let attr_name = pool.utf8(r.u16()?)?.to_string();
        let len = r.u32()? as usize;
        let end = r.position() + len;

        if matches!(
            attr_name.as_str(),
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations"
        ) {
            match parse_annotations(r, pool) {
                Ok(mut views) => annotations.append(&mut views),
                Err(DecodeError::MalformedAnnotation { message }) => {
                    warn!(class = class_name, %message, "skipping class annotation attribute");
                }
                Err(other) => return Err(other),
            }
        }

        r.seek(end)?;
    }
    Ok(annotations)
}

/// Parses a Code attribute body and returns the call targets of the
/// instruction stream.
fn decode_code(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<CallTarget>, DecodeError> {
    r.skip(4)?; // max_stack, max_locals
    let code_len = r.u32()? as usize;
    let code = r.bytes(code_len)?;
    let calls = walk_code(code, pool)?;

    let exception_table_len = r.u16()? as usize;
    r.skip(exception_table_len * 8)?;
    skip_attributes(r)?;
    Ok(calls)
}

/// Walks the instruction stream, recording every invokevirtual /
/// invokespecial / invokestatic / invokeinterface target. All other
/// instructions are stepped over by their exact width so the stream never
/// desynchronizes; invokedynamic has no owning class and is skipped.
pub fn walk_code(code: &[u8], pool: &ConstantPool) -> Result<Vec<CallTarget>, DecodeError> {
    let mut calls = Vec::new();
    let mut pc = 0usize;

    while pc < code.len() {
        let opcode = code[pc];

        if opcodes::is_method_invoke(opcode) {
            let index = read_code_u16(code, pc + 1)?;
            let (owner, name, descriptor) = pool.any_method_ref(index)?;
            calls.push(CallTarget {
                owner: dotted_class_name(owner),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            });
        }

        pc = match opcode {
            opcodes::WIDE => {
                let widened = *code
                    .get(pc + 1)
                    .ok_or(DecodeError::Truncated { at: pc + 1 })?;
                pc + 2 + opcodes::wide_operand_len(widened)
            }
            opcodes::TABLESWITCH => {
                let base = pc + 1 + opcodes::switch_padding(pc);
                let low = read_code_i32(code, base + 4)?;
                let high = read_code_i32(code, base + 8)?;
                if high < low {
                    return Err(DecodeError::UnknownOpcode { opcode, at: pc });
                }
                let entries = (high - low) as usize + 1;
                base + 12 + entries * 4
            }
            opcodes::LOOKUPSWITCH => {
                let base = pc + 1 + opcodes::switch_padding(pc);
                let npairs = read_code_i32(code, base + 4)?;
                if npairs < 0 {
                    return Err(DecodeError::UnknownOpcode { opcode, at: pc });
                }
                base + 8 + npairs as usize * 8
            }
            other => match opcodes::operand_len(other) {
                Some(len) => pc + 1 + len,
                None => return Err(DecodeError::UnknownOpcode { opcode: other, at: pc }),
            },
        };
    }

    Ok(calls)
}

fn read_code_u16(code: &[u8], at: usize) -> Result<u16, DecodeError> {
    let hi = *code.get(at).ok_or(DecodeError::Truncated { at })?;
    let lo = *code.get(at + 1).ok_or(DecodeError::Truncated { at: at + 1 })?;
    Ok(u16::from_be_bytes([hi, lo]))
}

fn read_code_i32(code: &[u8], at: usize) -> Result<i32, DecodeError> {
    let end = at + 4;
    if end > code.len() {
        return Err(DecodeError::Truncated { at });
    }
    Ok(i32::from_be_bytes([
        code[at],
        code[at + 1],
        code[at + 2],
        code[at + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal class-file writer for decoder tests. Mirrors the layout a
    /// compiler emits: pool, identity, one method with optional attributes.
    struct TestClass {
        cp: Vec<Vec<u8>>,
        this_class: u16,
        super_class: u16,
        methods: Vec<Vec<u8>>,
        class_attrs: Vec<Vec<u8>>,
    }

    impl TestClass {
        fn new(name: &str) -> Self {
            let mut t = Self {
                cp: Vec::new(),
                this_class: 0,
                super_class: 0,
                methods: Vec::new(),
                class_attrs: Vec::new(),
            };
            t.this_class = t.class(name);
            t.super_class = t.class("java/lang/Object");
            t
        }

        fn utf8(&mut self, s: &str) -> u16 {
            let mut e = vec![1u8];
            e.extend_from_slice(&(s.len() as u16).to_be_bytes());
            e.extend_from_slice(s.as_bytes());
            self.cp.push(e);
            self.cp.len() as u16
        }

        fn integer(&mut self, v: i32) -> u16 {
            let mut e = vec![3u8];
            e.extend_from_slice(&v.to_be_bytes());
            self.cp.push(e);
            self.cp.len() as u16
        }

        fn class(&mut self, name: &str) -> u16 {
            let name_index = self.utf8(name);
            let mut e = vec![7u8];
            e.extend_from_slice(&name_index.to_be_bytes());
            self.cp.push(e);
            self.cp.len() as u16
        }

        fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
            let class_index = self.class(owner);
            let name_index = self.utf8(name);
            let desc_index = self.utf8(descriptor);
            let mut nat = vec![12u8];
            nat.extend_from_slice(&name_index.to_be_bytes());
            nat.extend_from_slice(&desc_index.to_be_bytes());
            self.cp.push(nat);
            let nat_index = self.cp.len() as u16;
            let mut e = vec![10u8];
            e.extend_from_slice(&class_index.to_be_bytes());
            e.extend_from_slice(&nat_index.to_be_bytes());
            self.cp.push(e);
            self.cp.len() as u16
        }

        fn attribute(&mut self, name: &str, body: Vec<u8>) -> Vec<u8> {
            let name_index = self.utf8(name);
            let mut a = Vec::new();
            a.extend_from_slice(&name_index.to_be_bytes());
            a.extend_from_slice(&(body.len() as u32).to_be_bytes());
            a.extend_from_slice(&body);
            a
        }

        fn code_attribute(&mut self, code: &[u8]) -> Vec<u8> {
            let mut body = Vec::new();
            body.extend_from_slice(&1u16.to_be_bytes()); // max_stack
            body.extend_from_slice(&1u16.to_be_bytes()); // max_locals
            body.extend_from_slice(&(code.len() as u32).to_be_bytes());
            body.extend_from_slice(code);
            body.extend_from_slice(&0u16.to_be_bytes()); // exceptions
            body.extend_from_slice(&0u16.to_be_bytes()); // attributes
            self.attribute("Code", body)
        }

        /// `@Marker` with no attributes, as a RuntimeVisibleAnnotations body.
        fn marker_annotations(&mut self, descriptors: &[&str]) -> Vec<u8> {
            let mut body = Vec::new();
            body.extend_from_slice(&(descriptors.len() as u16).to_be_bytes());
            for d in descriptors {
                let type_index = self.utf8(d);
                body.extend_from_slice(&type_index.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
            }
            body
        }

        fn add_method(&mut self, name: &str, descriptor: &str, attrs: Vec<Vec<u8>>) {
            let name_index = self.utf8(name);
            let desc_index = self.utf8(descriptor);
            let mut m = Vec::new();
            m.extend_from_slice(&0x0001u16.to_be_bytes());
            m.extend_from_slice(&name_index.to_be_bytes());
            m.extend_from_slice(&desc_index.to_be_bytes());
            m.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
            for a in attrs {
                m.extend_from_slice(&a);
            }
            self.methods.push(m);
        }

        fn finish(self) -> Vec<u8> {
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&MAGIC.to_be_bytes());
            bytes.extend_from_slice(&0u16.to_be_bytes());
            bytes.extend_from_slice(&61u16.to_be_bytes());
            bytes.extend_from_slice(&((self.cp.len() + 1) as u16).to_be_bytes());
            for e in &self.cp {
                bytes.extend_from_slice(e);
            }
            bytes.extend_from_slice(&0x0021u16.to_be_bytes());
            bytes.extend_from_slice(&self.this_class.to_be_bytes());
            bytes.extend_from_slice(&self.super_class.to_be_bytes());
            bytes.extend_from_slice(&0u16.to_be_bytes()); // interfaces
            bytes.extend_from_slice(&0u16.to_be_bytes()); // fields
            bytes.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
            for m in &self.methods {
                bytes.extend_from_slice(m);
            }
            bytes.extend_from_slice(&(self.class_attrs.len() as u16).to_be_bytes());
            for a in &self.class_attrs {
                bytes.extend_from_slice(a);
            }
            bytes
        }
    }

    #[test]
    fn decodes_identity_and_methods() {
        let mut t = TestClass::new("com/ex/UserController");
        t.add_method("list", "()Ljava/util/List;", vec![]);
        let view = decode(&t.finish()).unwrap();

        assert_eq!(view.name, "com.ex.UserController");
        assert_eq!(view.super_name.as_deref(), Some("java.lang.Object"));
        assert_eq!(view.methods.len(), 1);
        assert_eq!(view.methods[0].name, "list");
        assert_eq!(view.methods[0].descriptor.ret.to_string(), "java.util.List");
    }

    #[test]
    fn decodes_class_level_annotations() {
        let mut t = TestClass::new("com/ex/C");
        let body =
            t.marker_annotations(&["Lorg/springframework/web/bind/annotation/RestController;"]);
        let attr = t.attribute("RuntimeVisibleAnnotations", body);
        t.class_attrs.push(attr);
        let view = decode(&t.finish()).unwrap();

        assert_eq!(view.annotations.len(), 1);
        assert_eq!(view.annotations[0].simple_name(), "RestController");
    }

    #[test]
    fn collects_call_targets_from_code() {
        let mut t = TestClass::new("com/ex/C");
        let save = t.method_ref("com/ex/UserRepository", "save", "(Ljava/lang/Object;)Ljava/lang/Object;");
        let code = vec![
            0x2a, // aload_0
            0xb6, // invokevirtual
            (save >> 8) as u8,
            (save & 0xff) as u8,
            0x57, // pop
            0xb1, // return
        ];
        let attr = t.code_attribute(&code);
        t.add_method("create", "()V", vec![attr]);
        let view = decode(&t.finish()).unwrap();

        let calls = &view.methods[0].calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].owner, "com.ex.UserRepository");
        assert_eq!(calls[0].name, "save");
        assert_eq!(calls[0].qualified_lower(), "com.ex.userrepository.save");
    }

    #[test]
    fn walks_past_switches_without_desync() {
        let mut t = TestClass::new("com/ex/C");
        let target = t.method_ref("com/ex/OrderService", "process", "()V");

        // iconst_0, tableswitch(low=0, high=0, one entry), then an invoke.
        let mut code = vec![0x03, 0xaa];
        let pc = 1usize;
        for _ in 0..opcodes::switch_padding(pc) {
            code.push(0);
        }
        code.extend_from_slice(&0i32.to_be_bytes()); // default
        code.extend_from_slice(&0i32.to_be_bytes()); // low
        code.extend_from_slice(&0i32.to_be_bytes()); // high
        code.extend_from_slice(&0i32.to_be_bytes()); // one jump offset
        code.push(0xb6);
        code.extend_from_slice(&target.to_be_bytes());
        code.push(0xb1);

        let attr = t.code_attribute(&code);
        t.add_method("route", "()V", vec![attr]);
        let view = decode(&t.finish()).unwrap();
        assert_eq!(view.methods[0].calls.len(), 1);
        assert_eq!(view.methods[0].calls[0].name, "process");
    }

    #[test]
    fn parameter_annotations_never_exceed_descriptor_arity() {
        let mut t = TestClass::new("com/ex/C");
        // Attribute claims two parameter slots, descriptor has one.
        let mut body = Vec::new();
        body.push(2u8);
        for d in ["Ljakarta/validation/Valid;", "Lcom/ex/Extra;"] {
            let type_index = t.utf8(d);
            body.extend_from_slice(&1u16.to_be_bytes());
            body.extend_from_slice(&type_index.to_be_bytes());
            body.extend_from_slice(&0u16.to_be_bytes());
        }
        let attr = t.attribute("RuntimeVisibleParameterAnnotations", body);
        t.add_method("create", "(Lcom/ex/Dto;)V", vec![attr]);
        let view = decode(&t.finish()).unwrap();

        let m = &view.methods[0];
        assert_eq!(m.parameter_annotations.len(), 1);
        assert_eq!(m.parameter_annotations[0][0].simple_name(), "Valid");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = decode(&[0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, DecodeError::BadMagic { .. }));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut t = TestClass::new("com/ex/C");
        t.add_method("m", "()V", vec![]);
        let mut bytes = t.finish();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::Truncated { .. }) | Err(DecodeError::BadConstantPool { .. })
        ));
    }

    #[test]
    fn malformed_annotation_attribute_is_skipped_not_fatal() {
        let mut t = TestClass::new("com/ex/C");
        // One annotation whose single element value uses an unknown tag.
        let type_index = t.utf8("Lcom/ex/Weird;");
        let name_index = t.utf8("value");
        let mut body = Vec::new();
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&type_index.to_be_bytes());
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&name_index.to_be_bytes());
        body.push(b'x');
        body.extend_from_slice(&1u16.to_be_bytes());
        let attr = t.attribute("RuntimeVisibleAnnotations", body);
        t.add_method("m", "()V", vec![attr]);

        let view = decode(&t.finish()).unwrap();
        assert!(view.methods[0].annotations.is_empty());
    }
}
