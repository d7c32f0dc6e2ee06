//! Constant pool table and reference resolution.
//!
//! The pool is stored as a flat array of tagged variants indexed by pool
//! index. References between entries are resolved by indexing with a kind
//! check at every hop, never by following owning pointers, so cyclic or
//! self-referential pools cannot cause unbounded recursion: a reference
//! that does not land on the expected kind is a `BadConstantPool` error.

use crate::classfile::DecodeError;
use crate::reader::ByteReader;

mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELDREF: u8 = 9;
    pub const METHODREF: u8 = 10;
    pub const INTERFACE_METHODREF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

#[derive(Debug, Clone)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { string_index: u16 },
    FieldRef { class_index: u16, name_and_type_index: u16 },
    MethodRef { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Second slot of a Long/Double entry. Never directly referenced.
    Unusable,
}

/// A parsed constant pool, 1-indexed like the class-file format.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let count = r.u16()?;
        if count == 0 {
            return Err(DecodeError::bad_pool(0, "constant_pool_count is zero"));
        }

        // Slot 0 is reserved by the format.
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = r.u8()?;
            let entry = match tag {
                tags::UTF8 => {
                    let len = r.u16()? as usize;
                    let bytes = r.bytes(len)?;
                    // Modified UTF-8 differs from UTF-8 only for embedded
                    // NULs and supplementary pairs; lossy decode is enough
                    // for names and annotation values.
                    Constant::Utf8(String::from_utf8_lossy(bytes).into_owned())
                }
                tags::INTEGER => Constant::Integer(r.i32()?),
                tags::FLOAT => Constant::Float(f32::from_bits(r.u32()?)),
                tags::LONG => Constant::Long(r.u64()? as i64),
                tags::DOUBLE => Constant::Double(f64::from_bits(r.u64()?)),
                tags::CLASS => Constant::Class { name_index: r.u16()? },
                tags::STRING => Constant::String { string_index: r.u16()? },
                tags::FIELDREF => Constant::FieldRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                tags::METHODREF => Constant::MethodRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                tags::INTERFACE_METHODREF => Constant::InterfaceMethodRef {
                    class_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                tags::NAME_AND_TYPE => Constant::NameAndType {
                    name_index: r.u16()?,
                    descriptor_index: r.u16()?,
                },
                tags::METHOD_HANDLE => Constant::MethodHandle {
                    reference_kind: r.u8()?,
                    reference_index: r.u16()?,
                },
                tags::METHOD_TYPE => Constant::MethodType { descriptor_index: r.u16()? },
                tags::DYNAMIC => Constant::Dynamic {
                    bootstrap_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                tags::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap_index: r.u16()?,
                    name_and_type_index: r.u16()?,
                },
                tags::MODULE => Constant::Module { name_index: r.u16()? },
                tags::PACKAGE => Constant::Package { name_index: r.u16()? },
                other => {
                    return Err(DecodeError::bad_pool(
                        index,
                        format!("unknown constant tag {other}"),
                    ));
                }
            };

            let two_slots = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            index += 1;
            if two_slots {
                entries.push(Constant::Unusable);
                index += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, DecodeError> {
        if index == 0 {
            return Err(DecodeError::bad_pool(index, "reference to reserved slot 0"));
        }
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) => Err(DecodeError::bad_pool(
                index,
                "reference to the unusable slot of a long/double",
            )),
            Some(entry) => Ok(entry),
            None => Err(DecodeError::bad_pool(index, "index past pool end")),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Utf8, found {}", kind_name(other)),
            )),
        }
    }

    pub fn integer(&self, index: u16) -> Result<i32, DecodeError> {
        match self.get(index)? {
            Constant::Integer(v) => Ok(*v),
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Integer, found {}", kind_name(other)),
            )),
        }
    }

    pub fn long(&self, index: u16) -> Result<i64, DecodeError> {
        match self.get(index)? {
            Constant::Long(v) => Ok(*v),
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Long, found {}", kind_name(other)),
            )),
        }
    }

    pub fn float(&self, index: u16) -> Result<f32, DecodeError> {
        match self.get(index)? {
            Constant::Float(v) => Ok(*v),
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Float, found {}", kind_name(other)),
            )),
        }
    }

    pub fn double(&self, index: u16) -> Result<f64, DecodeError> {
        match self.get(index)? {
            Constant::Double(v) => Ok(*v),
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Double, found {}", kind_name(other)),
            )),
        }
    }

    /// Resolves a Class entry to its internal (slash-separated) name.
    pub fn class_name(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index)? {
            Constant::Class { name_index } => {
                if *name_index == index {
                    return Err(DecodeError::bad_pool(index, "self-referential Class entry"));
                }
                self.utf8(*name_index)
            }
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected Class, found {}", kind_name(other)),
            )),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), DecodeError> {
        match self.get(index)? {
            Constant::NameAndType { name_index, descriptor_index } => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected NameAndType, found {}", kind_name(other)),
            )),
        }
    }

    /// Resolves a MethodRef or InterfaceMethodRef to `(owner, name, descriptor)`
    /// with the owner in internal form.
    pub fn any_method_ref(&self, index: u16) -> Result<(&str, &str, &str), DecodeError> {
        match self.get(index)? {
            Constant::MethodRef { class_index, name_and_type_index }
            | Constant::InterfaceMethodRef { class_index, name_and_type_index } => {
                if *class_index == index || *name_and_type_index == index {
                    return Err(DecodeError::bad_pool(index, "self-referential method ref"));
                }
                let owner = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((owner, name, descriptor))
            }
            other => Err(DecodeError::bad_pool(
                index,
                format!("expected MethodRef, found {}", kind_name(other)),
            )),
        }
    }
}

fn kind_name(c: &Constant) -> &'static str {
    match c {
        Constant::Utf8(_) => "Utf8",
        Constant::Integer(_) => "Integer",
        Constant::Float(_) => "Float",
        Constant::Long(_) => "Long",
        Constant::Double(_) => "Double",
        Constant::Class { .. } => "Class",
        Constant::String { .. } => "String",
        Constant::FieldRef { .. } => "FieldRef",
        Constant::MethodRef { .. } => "MethodRef",
        Constant::InterfaceMethodRef { .. } => "InterfaceMethodRef",
        Constant::NameAndType { .. } => "NameAndType",
        Constant::MethodHandle { .. } => "MethodHandle",
        Constant::MethodType { .. } => "MethodType",
        Constant::Dynamic { .. } => "Dynamic",
        Constant::InvokeDynamic { .. } => "InvokeDynamic",
        Constant::Module { .. } => "Module",
        Constant::Package { .. } => "Package",
        Constant::Unusable => "Unusable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes(entries: &[&[u8]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((entries.len() + 1) as u16).to_be_bytes());
        for e in entries {
            bytes.extend_from_slice(e);
        }
        bytes
    }

    fn utf8_entry(s: &str) -> Vec<u8> {
        let mut e = vec![1u8];
        e.extend_from_slice(&(s.len() as u16).to_be_bytes());
        e.extend_from_slice(s.as_bytes());
        e
    }

    #[test]
    fn parses_and_resolves_class_names() {
        let name = utf8_entry("com/example/Foo");
        let class: Vec<u8> = vec![7, 0, 1];
        let bytes = pool_bytes(&[&name, &class]);
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::parse(&mut r).unwrap();

        assert_eq!(pool.class_name(2).unwrap(), "com/example/Foo");
        assert_eq!(pool.utf8(1).unwrap(), "com/example/Foo");
    }

    #[test]
    fn long_occupies_two_slots() {
        let long: Vec<u8> = {
            let mut e = vec![5u8];
            e.extend_from_slice(&42i64.to_be_bytes());
            e
        };
        let name = utf8_entry("x");
        // count = 4: long takes slots 1-2, utf8 sits at 3
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u16.to_be_bytes());
        bytes.extend_from_slice(&long);
        bytes.extend_from_slice(&name);

        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert_eq!(pool.long(1).unwrap(), 42);
        assert!(pool.get(2).is_err());
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn self_referential_class_is_rejected() {
        // Class entry at index 1 whose name_index points back at itself.
        let class: Vec<u8> = vec![7, 0, 1];
        let bytes = pool_bytes(&[&class]);
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert!(pool.class_name(1).is_err());
    }

    #[test]
    fn reference_cycle_is_rejected_by_kind_check() {
        // Two Class entries pointing at each other: resolution requires the
        // target to be Utf8, so either direction errors out instead of looping.
        let a: Vec<u8> = vec![7, 0, 2];
        let b: Vec<u8> = vec![7, 0, 1];
        let bytes = pool_bytes(&[&a, &b]);
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert!(pool.class_name(1).is_err());
        assert!(pool.class_name(2).is_err());
    }

    #[test]
    fn unknown_tag_fails_parse() {
        let bogus: Vec<u8> = vec![99, 0, 0];
        let bytes = pool_bytes(&[&bogus]);
        let mut r = ByteReader::new(&bytes);
        assert!(ConstantPool::parse(&mut r).is_err());
    }

    #[test]
    fn index_zero_and_out_of_range_are_rejected() {
        let name = utf8_entry("a");
        let bytes = pool_bytes(&[&name]);
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::parse(&mut r).unwrap();
        assert!(pool.get(0).is_err());
        assert!(pool.get(9).is_err());
    }
}
