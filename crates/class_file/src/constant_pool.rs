use std::{
    fmt,
    hash::{Hash, Hasher},
};

use crate::{ClassFileError, Result};

#[macro_export]
macro_rules! matches_cp_info {
    ($cp:expr, $index:expr, $i:ident) => {
        match $cp.get($index) {
            Ok($crate::constant_pool::CpInfo::$i(ref n)) => Ok(n),
            Ok(c) => Err($crate::ClassFileError::UnexpectedConstantPoolEntry(
                stringify!($i),
                c.clone(),
            )),
            Err(e) => Err(e),
        }
    };
}

/// The constant pool of a class file.
///
/// Positions run from `0` to `constant_pool_count - 1`. Position `0` and the
/// position following every `Long` or `Double` hold [`CpInfo::Unusable`] and
/// never resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    cp_infos: Vec<CpInfo>,
}
impl ConstantPool {
    /// Builds a pool from the entries at positions `1..`.
    pub fn new(cp_infos: Vec<CpInfo>) -> Self {
        let mut all = Vec::with_capacity(cp_infos.len() + 1);
        all.push(CpInfo::Unusable);
        all.extend(cp_infos);
        Self { cp_infos: all }
    }

    pub(crate) fn from_positions(cp_infos: Vec<CpInfo>) -> Self {
        Self { cp_infos }
    }

    /// The `constant_pool_count` of the class file, position 0 included.
    pub fn len(&self) -> usize {
        self.cp_infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cp_infos.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&CpInfo> {
        match self.cp_infos.get(index as usize) {
            None | Some(CpInfo::Unusable) => Err(ClassFileError::InvalidConstantPoolIndex(index)),
            Some(cp_info) => Ok(cp_info),
        }
    }

    /// Usable entries along with their index.
    pub fn entries(&self) -> impl Iterator<Item = (u16, &CpInfo)> {
        self.cp_infos
            .iter()
            .enumerate()
            .filter(|(_, cp_info)| !matches!(cp_info, CpInfo::Unusable))
            .map(|(i, cp_info)| (i as u16, cp_info))
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        matches_cp_info!(self, index, Utf8).map(String::as_str)
    }

    /// The internal form name (`java/lang/Object`) of a `Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        let ClassInfo { name_index } = matches_cp_info!(self, index, Class)?;
        self.utf8(*name_index)
    }

    pub fn string(&self, index: u16) -> Result<&str> {
        let StringInfo { string_index } = matches_cp_info!(self, index, String)?;
        self.utf8(*string_index)
    }

    /// Name and descriptor of a `NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        let NameAndTypeInfo {
            name_index,
            descriptor_index,
        } = matches_cp_info!(self, index, NameAndType)?;
        Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
    }

    /// Resolves a `Fieldref`, `Methodref` or `InterfaceMethodref` entry.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        match self.get(index)? {
            CpInfo::FieldRef(ref_info)
            | CpInfo::MethodRef(ref_info)
            | CpInfo::InterfaceMethodRef(ref_info) => self.resolve_ref_info(ref_info),
            c => Err(ClassFileError::UnexpectedConstantPoolEntry(
                "RefInfo",
                c.clone(),
            )),
        }
    }

    /// Resolves the entry at `index` and everything it references.
    pub fn resolve(&self, index: u16) -> Result<Constant<'_>> {
        let constant = match self.get(index)? {
            CpInfo::Class(ClassInfo { name_index }) => Constant::Class(self.utf8(*name_index)?),
            CpInfo::FieldRef(ref_info) => Constant::FieldRef(self.resolve_ref_info(ref_info)?),
            CpInfo::MethodRef(ref_info) => Constant::MethodRef(self.resolve_ref_info(ref_info)?),
            CpInfo::InterfaceMethodRef(ref_info) => {
                Constant::InterfaceMethodRef(self.resolve_ref_info(ref_info)?)
            }
            CpInfo::String(StringInfo { string_index }) => {
                Constant::String(self.utf8(*string_index)?)
            }
            CpInfo::Integer(i) => Constant::Integer(*i),
            CpInfo::Float(f) => Constant::Float(*f),
            CpInfo::Long(l) => Constant::Long(*l),
            CpInfo::Double(d) => Constant::Double(*d),
            CpInfo::NameAndType(NameAndTypeInfo {
                name_index,
                descriptor_index,
            }) => Constant::NameAndType {
                name: self.utf8(*name_index)?,
                descriptor: self.utf8(*descriptor_index)?,
            },
            CpInfo::Utf8(s) => Constant::Utf8(s),
            CpInfo::MethodHandle(MethodHandleInfo {
                reference_kind,
                reference_index,
            }) => Constant::MethodHandle {
                reference_kind: *reference_kind,
                reference: self.member_ref(*reference_index)?,
            },
            CpInfo::MethodType(MethodTypeInfo { descriptor_index }) => {
                Constant::MethodType(self.utf8(*descriptor_index)?)
            }
            CpInfo::Dynamic(info) => {
                let (name, descriptor) = self.name_and_type(info.name_and_type_index)?;
                Constant::Dynamic {
                    bootstrap_method_attr_index: info.bootstrap_method_attr_index,
                    name,
                    descriptor,
                }
            }
            CpInfo::InvokeDynamic(info) => {
                let (name, descriptor) = self.name_and_type(info.name_and_type_index)?;
                Constant::InvokeDynamic {
                    bootstrap_method_attr_index: info.bootstrap_method_attr_index,
                    name,
                    descriptor,
                }
            }
            CpInfo::Module(ModuleInfo { name_index }) => Constant::Module(self.utf8(*name_index)?),
            CpInfo::Package(PackageInfo { name_index }) => {
                Constant::Package(self.utf8(*name_index)?)
            }
            CpInfo::Unusable => return Err(ClassFileError::InvalidConstantPoolIndex(index)),
        };

        Ok(constant)
    }

    fn resolve_ref_info(&self, ref_info: &RefInfo) -> Result<MemberRef<'_>> {
        let (name, descriptor) = self.name_and_type(ref_info.name_and_type_index)?;
        Ok(MemberRef {
            class: self.class_name(ref_info.class_index)?,
            name,
            descriptor,
        })
    }
}
impl<'a> IntoIterator for &'a ConstantPool {
    type Item = &'a CpInfo;
    type IntoIter = std::iter::Skip<std::slice::Iter<'a, CpInfo>>;

    fn into_iter(self) -> Self::IntoIter {
        self.cp_infos.iter().skip(1)
    }
}

#[derive(Debug, Clone)]
pub enum CpInfo {
    MethodRef(RefInfo),
    FieldRef(RefInfo),
    Float(f32),
    InterfaceMethodRef(RefInfo),
    Class(ClassInfo),
    NameAndType(NameAndTypeInfo),
    Utf8(String),
    String(StringInfo),
    Dynamic(DynamicInfo),
    InvokeDynamic(DynamicInfo),
    Integer(i32),
    MethodHandle(MethodHandleInfo),
    MethodType(MethodTypeInfo),
    Long(i64),
    Double(f64),
    Module(ModuleInfo),
    Package(PackageInfo),
    Unusable,
}
impl CpInfo {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;

    /// The tag byte this entry was decoded from, `None` for placeholders.
    pub fn tag(&self) -> Option<u8> {
        let tag = match self {
            CpInfo::Utf8(_) => Self::UTF8,
            CpInfo::Integer(_) => Self::INTEGER,
            CpInfo::Float(_) => Self::FLOAT,
            CpInfo::Long(_) => Self::LONG,
            CpInfo::Double(_) => Self::DOUBLE,
            CpInfo::Class(_) => Self::CLASS,
            CpInfo::String(_) => Self::STRING,
            CpInfo::FieldRef(_) => Self::FIELD_REF,
            CpInfo::MethodRef(_) => Self::METHOD_REF,
            CpInfo::InterfaceMethodRef(_) => Self::INTERFACE_METHOD_REF,
            CpInfo::NameAndType(_) => Self::NAME_AND_TYPE,
            CpInfo::MethodHandle(_) => Self::METHOD_HANDLE,
            CpInfo::MethodType(_) => Self::METHOD_TYPE,
            CpInfo::Dynamic(_) => Self::DYNAMIC,
            CpInfo::InvokeDynamic(_) => Self::INVOKE_DYNAMIC,
            CpInfo::Module(_) => Self::MODULE,
            CpInfo::Package(_) => Self::PACKAGE,
            CpInfo::Unusable => return None,
        };
        Some(tag)
    }

    /// `Long` and `Double` take up two positions in the pool.
    pub fn is_double_width(&self) -> bool {
        matches!(self, CpInfo::Long(_) | CpInfo::Double(_))
    }
}

// Floating point constants compare by bit pattern so that a pool always
// equals itself, NaN constants included.
impl PartialEq for CpInfo {
    fn eq(&self, other: &Self) -> bool {
        use CpInfo::*;

        match (self, other) {
            (MethodRef(a), MethodRef(b))
            | (FieldRef(a), FieldRef(b))
            | (InterfaceMethodRef(a), InterfaceMethodRef(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Class(a), Class(b)) => a == b,
            (NameAndType(a), NameAndType(b)) => a == b,
            (Utf8(a), Utf8(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Dynamic(a), Dynamic(b)) | (InvokeDynamic(a), InvokeDynamic(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (MethodHandle(a), MethodHandle(b)) => a == b,
            (MethodType(a), MethodType(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Module(a), Module(b)) => a == b,
            (Package(a), Package(b)) => a == b,
            (Unusable, Unusable) => true,
            _ => false,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RefInfo {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassInfo {
    // The value of the name_index item must be a valid index into the constant_pool table.
    // The constant_pool entry at that index must be a CONSTANT_Utf8_info structure (§4.4.7)
    // representing a valid binary class or interface name encoded in internal form (§4.2.1).
    pub name_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct StringInfo {
    pub string_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NameAndTypeInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// Shared by `CONSTANT_Dynamic_info` and `CONSTANT_InvokeDynamic_info`.
#[derive(Debug, PartialEq, Clone)]
pub struct DynamicInfo {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodHandleInfo {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodTypeInfo {
    pub descriptor_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ModuleInfo {
    pub name_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PackageInfo {
    pub name_index: u16,
}

/// A field or method reference with its class and name-and-type resolved.
///
/// Equality only looks at the resolved text, so references decoded from two
/// unrelated pools compare equal when they name the same member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}
impl fmt::Display for MemberRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.descriptor)
    }
}

/// A constant pool entry with every index replaced by what it points to.
#[derive(Debug, Clone, Copy)]
pub enum Constant<'a> {
    Class(&'a str),
    FieldRef(MemberRef<'a>),
    MethodRef(MemberRef<'a>),
    InterfaceMethodRef(MemberRef<'a>),
    String(&'a str),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    NameAndType {
        name: &'a str,
        descriptor: &'a str,
    },
    Utf8(&'a str),
    MethodHandle {
        reference_kind: u8,
        reference: MemberRef<'a>,
    },
    MethodType(&'a str),
    Dynamic {
        bootstrap_method_attr_index: u16,
        name: &'a str,
        descriptor: &'a str,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name: &'a str,
        descriptor: &'a str,
    },
    Module(&'a str),
    Package(&'a str),
}
impl PartialEq for Constant<'_> {
    fn eq(&self, other: &Self) -> bool {
        use Constant::*;

        match (self, other) {
            (Class(a), Class(b))
            | (String(a), String(b))
            | (Utf8(a), Utf8(b))
            | (MethodType(a), MethodType(b))
            | (Module(a), Module(b))
            | (Package(a), Package(b)) => a == b,
            (FieldRef(a), FieldRef(b))
            | (MethodRef(a), MethodRef(b))
            | (InterfaceMethodRef(a), InterfaceMethodRef(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (
                NameAndType {
                    name: n1,
                    descriptor: d1,
                },
                NameAndType {
                    name: n2,
                    descriptor: d2,
                },
            ) => n1 == n2 && d1 == d2,
            (
                MethodHandle {
                    reference_kind: k1,
                    reference: r1,
                },
                MethodHandle {
                    reference_kind: k2,
                    reference: r2,
                },
            ) => k1 == k2 && r1 == r2,
            (
                Dynamic {
                    bootstrap_method_attr_index: b1,
                    name: n1,
                    descriptor: d1,
                },
                Dynamic {
                    bootstrap_method_attr_index: b2,
                    name: n2,
                    descriptor: d2,
                },
            )
            | (
                InvokeDynamic {
                    bootstrap_method_attr_index: b1,
                    name: n1,
                    descriptor: d1,
                },
                InvokeDynamic {
                    bootstrap_method_attr_index: b2,
                    name: n2,
                    descriptor: d2,
                },
            ) => b1 == b2 && n1 == n2 && d1 == d2,
            _ => false,
        }
    }
}
impl Eq for Constant<'_> {}
impl Hash for Constant<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Class(s)
            | Constant::String(s)
            | Constant::Utf8(s)
            | Constant::MethodType(s)
            | Constant::Module(s)
            | Constant::Package(s) => s.hash(state),
            Constant::FieldRef(r) | Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => {
                r.hash(state)
            }
            Constant::Integer(i) => i.hash(state),
            Constant::Float(f) => f.to_bits().hash(state),
            Constant::Long(l) => l.hash(state),
            Constant::Double(d) => d.to_bits().hash(state),
            Constant::NameAndType { name, descriptor } => {
                name.hash(state);
                descriptor.hash(state);
            }
            Constant::MethodHandle {
                reference_kind,
                reference,
            } => {
                reference_kind.hash(state);
                reference.hash(state);
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name,
                descriptor,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name,
                descriptor,
            } => {
                bootstrap_method_attr_index.hash(state);
                name.hash(state);
                descriptor.hash(state);
            }
        }
    }
}
impl fmt::Display for Constant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Class(name) => write!(f, "class {}", name),
            Constant::FieldRef(r) => write!(f, "field {}", r),
            Constant::MethodRef(r) | Constant::InterfaceMethodRef(r) => write!(f, "method {}", r),
            Constant::String(s) => write!(f, "{:?}", s),
            Constant::Integer(i) => write!(f, "{}", i),
            Constant::Float(v) => write!(f, "{}f", v),
            Constant::Long(l) => write!(f, "{}l", l),
            Constant::Double(d) => write!(f, "{}d", d),
            Constant::NameAndType { name, descriptor } => write!(f, "{}:{}", name, descriptor),
            Constant::Utf8(s) => f.write_str(s),
            Constant::MethodHandle {
                reference_kind,
                reference,
            } => write!(f, "method handle {} {}", reference_kind, reference),
            Constant::MethodType(descriptor) => write!(f, "method type {}", descriptor),
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name,
                descriptor,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name,
                descriptor,
            } => write!(
                f,
                "#{}:{}:{}",
                bootstrap_method_attr_index, name, descriptor
            ),
            Constant::Module(name) => write!(f, "module {}", name),
            Constant::Package(name) => write!(f, "package {}", name),
        }
    }
}
