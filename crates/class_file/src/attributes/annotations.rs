// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.16

use crate::{constant_pool::ConstantPool, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_index: u16,
    pub element_value_pairs: Vec<ElementValuePair>,
}
impl Annotation {
    /// The field descriptor of the annotation interface, e.g. `Ljava/lang/Deprecated;`.
    pub fn type_descriptor<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.type_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
    pub element_name_index: u16,
    pub value: ElementValue,
}
impl ElementValuePair {
    pub fn element_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.element_name_index)
    }
}

/// Table 4.7.16.1-A. Constant variants hold a `const_value_index`.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Byte(u16),
    Char(u16),
    Double(u16),
    Float(u16),
    Int(u16),
    Long(u16),
    Short(u16),
    Boolean(u16),
    String(u16),
    Enum {
        type_name_index: u16,
        const_name_index: u16,
    },
    Class {
        class_info_index: u16,
    },
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}
impl ElementValue {
    pub fn tag(&self) -> char {
        match self {
            ElementValue::Byte(_) => 'B',
            ElementValue::Char(_) => 'C',
            ElementValue::Double(_) => 'D',
            ElementValue::Float(_) => 'F',
            ElementValue::Int(_) => 'I',
            ElementValue::Long(_) => 'J',
            ElementValue::Short(_) => 'S',
            ElementValue::Boolean(_) => 'Z',
            ElementValue::String(_) => 's',
            ElementValue::Enum { .. } => 'e',
            ElementValue::Class { .. } => 'c',
            ElementValue::Annotation(_) => '@',
            ElementValue::Array(_) => '[',
        }
    }

    pub fn const_value_index(&self) -> Option<u16> {
        match self {
            ElementValue::Byte(i)
            | ElementValue::Char(i)
            | ElementValue::Double(i)
            | ElementValue::Float(i)
            | ElementValue::Int(i)
            | ElementValue::Long(i)
            | ElementValue::Short(i)
            | ElementValue::Boolean(i)
            | ElementValue::String(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub target_type: u8,
    pub target_info: TargetInfo,
    pub target_path: Vec<TypePathEntry>,
    pub type_index: u16,
    pub element_value_pairs: Vec<ElementValuePair>,
}

/// The `target_info` union, selected by `target_type` (Table 4.7.20-A/B).
#[derive(Debug, Clone, PartialEq)]
pub enum TargetInfo {
    TypeParameter {
        type_parameter_index: u8,
    },
    Supertype {
        supertype_index: u16,
    },
    TypeParameterBound {
        type_parameter_index: u8,
        bound_index: u8,
    },
    Empty,
    FormalParameter {
        formal_parameter_index: u8,
    },
    Throws {
        throws_type_index: u16,
    },
    LocalVar(Vec<LocalVarTargetEntry>),
    Catch {
        exception_table_index: u16,
    },
    Offset {
        offset: u16,
    },
    TypeArgument {
        offset: u16,
        type_argument_index: u8,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVarTargetEntry {
    pub start_pc: u16,
    pub length: u16,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypePathEntry {
    pub type_path_kind: u8,
    pub type_argument_index: u8,
}
