// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7

pub mod annotations;
pub mod module;
pub mod stack_map;

use std::fmt;

use crate::{
    access_flags::{InnerClassAccessFlags, ParameterAccessFlags},
    constant_pool::{ConstantPool, CpInfo},
    Result,
};

pub use self::{
    annotations::{
        Annotation, ElementValue, ElementValuePair, LocalVarTargetEntry, TargetInfo,
        TypeAnnotation, TypePathEntry,
    },
    module::{BootstrapMethod, Exports, ModuleAttribute, Opens, Provides, RecordComponent, Requires},
    stack_map::{StackMapFrame, VerificationType},
};

/// Every attribute name the decoder knows how to take apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    ConstantValue,
    Code,
    StackMapTable,
    Exceptions,
    InnerClasses,
    EnclosingMethod,
    Synthetic,
    Signature,
    SourceFile,
    SourceDebugExtension,
    LineNumberTable,
    LocalVariableTable,
    LocalVariableTypeTable,
    Deprecated,
    RuntimeVisibleAnnotations,
    RuntimeInvisibleAnnotations,
    RuntimeVisibleParameterAnnotations,
    RuntimeInvisibleParameterAnnotations,
    RuntimeVisibleTypeAnnotations,
    RuntimeInvisibleTypeAnnotations,
    AnnotationDefault,
    BootstrapMethods,
    MethodParameters,
    Module,
    ModulePackages,
    ModuleMainClass,
    NestHost,
    NestMembers,
    Record,
    PermittedSubclasses,
}
impl AttributeType {
    const REGISTRY: [(&'static str, AttributeType); 30] = [
        ("ConstantValue", AttributeType::ConstantValue),
        ("Code", AttributeType::Code),
        ("StackMapTable", AttributeType::StackMapTable),
        ("Exceptions", AttributeType::Exceptions),
        ("InnerClasses", AttributeType::InnerClasses),
        ("EnclosingMethod", AttributeType::EnclosingMethod),
        ("Synthetic", AttributeType::Synthetic),
        ("Signature", AttributeType::Signature),
        ("SourceFile", AttributeType::SourceFile),
        ("SourceDebugExtension", AttributeType::SourceDebugExtension),
        ("LineNumberTable", AttributeType::LineNumberTable),
        ("LocalVariableTable", AttributeType::LocalVariableTable),
        ("LocalVariableTypeTable", AttributeType::LocalVariableTypeTable),
        ("Deprecated", AttributeType::Deprecated),
        ("RuntimeVisibleAnnotations", AttributeType::RuntimeVisibleAnnotations),
        ("RuntimeInvisibleAnnotations", AttributeType::RuntimeInvisibleAnnotations),
        (
            "RuntimeVisibleParameterAnnotations",
            AttributeType::RuntimeVisibleParameterAnnotations,
        ),
        (
            "RuntimeInvisibleParameterAnnotations",
            AttributeType::RuntimeInvisibleParameterAnnotations,
        ),
        (
            "RuntimeVisibleTypeAnnotations",
            AttributeType::RuntimeVisibleTypeAnnotations,
        ),
        (
            "RuntimeInvisibleTypeAnnotations",
            AttributeType::RuntimeInvisibleTypeAnnotations,
        ),
        ("AnnotationDefault", AttributeType::AnnotationDefault),
        ("BootstrapMethods", AttributeType::BootstrapMethods),
        ("MethodParameters", AttributeType::MethodParameters),
        ("Module", AttributeType::Module),
        ("ModulePackages", AttributeType::ModulePackages),
        ("ModuleMainClass", AttributeType::ModuleMainClass),
        ("NestHost", AttributeType::NestHost),
        ("NestMembers", AttributeType::NestMembers),
        ("Record", AttributeType::Record),
        ("PermittedSubclasses", AttributeType::PermittedSubclasses),
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::REGISTRY
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
    }

    pub fn name(self) -> &'static str {
        Self::REGISTRY
            .iter()
            .find(|(_, t)| *t == self)
            .map_or("", |(n, _)| *n)
    }

    /// Annotation attributes fall back to opaque payloads when an element
    /// value carries an unknown tag.
    pub(crate) fn carries_annotations(self) -> bool {
        matches!(
            self,
            AttributeType::RuntimeVisibleAnnotations
                | AttributeType::RuntimeInvisibleAnnotations
                | AttributeType::RuntimeVisibleParameterAnnotations
                | AttributeType::RuntimeInvisibleParameterAnnotations
                | AttributeType::RuntimeVisibleTypeAnnotations
                | AttributeType::RuntimeInvisibleTypeAnnotations
                | AttributeType::AnnotationDefault
        )
    }
}
impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The structure an attribute table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOwner {
    ClassFile,
    Field,
    Method,
    Code,
    RecordComponent,
}

#[derive(Clone, PartialEq)]
pub struct Attribute {
    pub attribute_name_index: u16,
    pub info: AttributeInfo,
}
impl Attribute {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.attribute_name_index)
    }

    /// `None` for custom attributes.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        self.info.attribute_type()
    }
}
impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Attribute");
        s.field("attribute_name_index", &self.attribute_name_index);
        match &self.info {
            AttributeInfo::Custom(info) => s.field("info", &format!("({} bytes)", info.len())),
            info => s.field("info", info),
        };
        s.finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
    ConstantValue { constant_value_index: u16 },
    Code(CodeAttribute),
    StackMapTable(Vec<StackMapFrame>),
    Exceptions(Vec<u16>),
    InnerClasses(Vec<InnerClass>),
    EnclosingMethod(EnclosingMethod),
    Synthetic,
    Signature { signature_index: u16 },
    SourceFile { sourcefile_index: u16 },
    SourceDebugExtension(Vec<u8>),
    LineNumberTable(Vec<LineNumber>),
    LocalVariableTable(Vec<LocalVariable>),
    LocalVariableTypeTable(Vec<LocalVariableType>),
    Deprecated,
    RuntimeVisibleAnnotations(Vec<Annotation>),
    RuntimeInvisibleAnnotations(Vec<Annotation>),
    RuntimeVisibleParameterAnnotations(Vec<Vec<Annotation>>),
    RuntimeInvisibleParameterAnnotations(Vec<Vec<Annotation>>),
    RuntimeVisibleTypeAnnotations(Vec<TypeAnnotation>),
    RuntimeInvisibleTypeAnnotations(Vec<TypeAnnotation>),
    AnnotationDefault(ElementValue),
    BootstrapMethods(Vec<BootstrapMethod>),
    MethodParameters(Vec<MethodParameter>),
    Module(ModuleAttribute),
    ModulePackages(Vec<u16>),
    ModuleMainClass { main_class_index: u16 },
    NestHost { host_class_index: u16 },
    NestMembers(Vec<u16>),
    Record(Vec<RecordComponent>),
    PermittedSubclasses(Vec<u16>),
    /// An attribute nobody registered, kept verbatim.
    Custom(Vec<u8>),
}
impl AttributeInfo {
    pub fn attribute_type(&self) -> Option<AttributeType> {
        let attribute_type = match self {
            AttributeInfo::ConstantValue { .. } => AttributeType::ConstantValue,
            AttributeInfo::Code(_) => AttributeType::Code,
            AttributeInfo::StackMapTable(_) => AttributeType::StackMapTable,
            AttributeInfo::Exceptions(_) => AttributeType::Exceptions,
            AttributeInfo::InnerClasses(_) => AttributeType::InnerClasses,
            AttributeInfo::EnclosingMethod(_) => AttributeType::EnclosingMethod,
            AttributeInfo::Synthetic => AttributeType::Synthetic,
            AttributeInfo::Signature { .. } => AttributeType::Signature,
            AttributeInfo::SourceFile { .. } => AttributeType::SourceFile,
            AttributeInfo::SourceDebugExtension(_) => AttributeType::SourceDebugExtension,
            AttributeInfo::LineNumberTable(_) => AttributeType::LineNumberTable,
            AttributeInfo::LocalVariableTable(_) => AttributeType::LocalVariableTable,
            AttributeInfo::LocalVariableTypeTable(_) => AttributeType::LocalVariableTypeTable,
            AttributeInfo::Deprecated => AttributeType::Deprecated,
            AttributeInfo::RuntimeVisibleAnnotations(_) => AttributeType::RuntimeVisibleAnnotations,
            AttributeInfo::RuntimeInvisibleAnnotations(_) => {
                AttributeType::RuntimeInvisibleAnnotations
            }
            AttributeInfo::RuntimeVisibleParameterAnnotations(_) => {
                AttributeType::RuntimeVisibleParameterAnnotations
            }
            AttributeInfo::RuntimeInvisibleParameterAnnotations(_) => {
                AttributeType::RuntimeInvisibleParameterAnnotations
            }
            AttributeInfo::RuntimeVisibleTypeAnnotations(_) => {
                AttributeType::RuntimeVisibleTypeAnnotations
            }
            AttributeInfo::RuntimeInvisibleTypeAnnotations(_) => {
                AttributeType::RuntimeInvisibleTypeAnnotations
            }
            AttributeInfo::AnnotationDefault(_) => AttributeType::AnnotationDefault,
            AttributeInfo::BootstrapMethods(_) => AttributeType::BootstrapMethods,
            AttributeInfo::MethodParameters(_) => AttributeType::MethodParameters,
            AttributeInfo::Module(_) => AttributeType::Module,
            AttributeInfo::ModulePackages(_) => AttributeType::ModulePackages,
            AttributeInfo::ModuleMainClass { .. } => AttributeType::ModuleMainClass,
            AttributeInfo::NestHost { .. } => AttributeType::NestHost,
            AttributeInfo::NestMembers(_) => AttributeType::NestMembers,
            AttributeInfo::Record(_) => AttributeType::Record,
            AttributeInfo::PermittedSubclasses(_) => AttributeType::PermittedSubclasses,
            AttributeInfo::Custom(_) => return None,
        };
        Some(attribute_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(pub Vec<Attribute>);
impl Attributes {
    pub fn find_by_name(&self, name: &str, constant_pool: &ConstantPool) -> Option<&Attribute> {
        for a in &self.0 {
            let Ok(CpInfo::Utf8(s)) = constant_pool.get(a.attribute_name_index) else {
                continue;
            };

            if s == name {
                return Some(a);
            }
        }

        None
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn of_type(&self, attribute_type: AttributeType) -> impl Iterator<Item = &AttributeInfo> {
        self.0
            .iter()
            .map(|a| &a.info)
            .filter(move |info| info.attribute_type() == Some(attribute_type))
    }

    pub fn contains(&self, attribute_type: AttributeType) -> bool {
        self.of_type(attribute_type).next().is_some()
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.0.iter().find_map(|a| match &a.info {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn constant_value_index(&self) -> Option<u16> {
        self.0.iter().find_map(|a| match a.info {
            AttributeInfo::ConstantValue {
                constant_value_index,
            } => Some(constant_value_index),
            _ => None,
        })
    }

    pub fn signature_index(&self) -> Option<u16> {
        self.0.iter().find_map(|a| match a.info {
            AttributeInfo::Signature { signature_index } => Some(signature_index),
            _ => None,
        })
    }

    pub fn source_file_index(&self) -> Option<u16> {
        self.0.iter().find_map(|a| match a.info {
            AttributeInfo::SourceFile { sourcefile_index } => Some(sourcefile_index),
            _ => None,
        })
    }

    pub fn exceptions(&self) -> Option<&[u16]> {
        self.0.iter().find_map(|a| match &a.info {
            AttributeInfo::Exceptions(exceptions) => Some(exceptions.as_slice()),
            _ => None,
        })
    }

    pub fn inner_classes(&self) -> impl Iterator<Item = &InnerClass> {
        self.0.iter().flat_map(|a| match &a.info {
            AttributeInfo::InnerClasses(inner_classes) => inner_classes.as_slice(),
            _ => &[][..],
        })
    }

    pub fn enclosing_method(&self) -> Option<&EnclosingMethod> {
        self.0.iter().find_map(|a| match &a.info {
            AttributeInfo::EnclosingMethod(enclosing_method) => Some(enclosing_method),
            _ => None,
        })
    }

    pub fn bootstrap_methods(&self) -> Option<&[BootstrapMethod]> {
        self.0.iter().find_map(|a| match &a.info {
            AttributeInfo::BootstrapMethods(methods) => Some(methods.as_slice()),
            _ => None,
        })
    }
}
impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}
impl ExceptionTableEntry {
    /// `None` for handlers that catch everything (`finally` blocks).
    pub fn catch_type_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        if self.catch_type == 0 {
            return Ok(None);
        }
        constant_pool.class_name(self.catch_type).map(Some)
    }

    pub fn covers(&self, pc: u16) -> bool {
        (self.start_pc..self.end_pc).contains(&pc)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Attributes,
}
impl CodeAttribute {
    /// Entries of every `LocalVariableTable` attached to this code.
    pub fn local_variable_table(&self) -> impl Iterator<Item = &LocalVariable> {
        self.attributes.iter().flat_map(|a| match &a.info {
            AttributeInfo::LocalVariableTable(table) => table.as_slice(),
            _ => &[][..],
        })
    }

    pub fn local_variable_type_table(&self) -> impl Iterator<Item = &LocalVariableType> {
        self.attributes.iter().flat_map(|a| match &a.info {
            AttributeInfo::LocalVariableTypeTable(table) => table.as_slice(),
            _ => &[][..],
        })
    }

    pub fn line_number_table(&self) -> impl Iterator<Item = &LineNumber> {
        self.attributes.iter().flat_map(|a| match &a.info {
            AttributeInfo::LineNumberTable(table) => table.as_slice(),
            _ => &[][..],
        })
    }

    /// Source line of the instruction at `pc`, taken from the closest
    /// preceding line number entry.
    pub fn line_number_for(&self, pc: u16) -> Option<u16> {
        self.line_number_table()
            .filter(|l| l.start_pc <= pc)
            .max_by_key(|l| l.start_pc)
            .map(|l| l.line_number)
    }

    /// The local variable using `slot` while `pc` executes.
    pub fn local_variable(&self, slot: u16, pc: u32) -> Option<&LocalVariable> {
        self.local_variable_table()
            .find(|lv| lv.index == slot && lv.covers(pc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}
impl LocalVariable {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.descriptor_index)
    }

    pub fn covers(&self, pc: u32) -> bool {
        let start = self.start_pc as u32;
        start <= pc && pc < start + self.length as u32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableType {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub signature_index: u16,
    pub index: u16,
}
impl LocalVariableType {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.name_index)
    }

    pub fn signature<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.signature_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: InnerClassAccessFlags,
}
impl InnerClass {
    pub fn inner_class_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.class_name(self.inner_class_info_index)
    }

    pub fn outer_class_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        match self.outer_class_info_index {
            0 => Ok(None),
            index => constant_pool.class_name(index).map(Some),
        }
    }

    /// The simple name in source, `None` for anonymous classes.
    pub fn inner_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        match self.inner_name_index {
            0 => Ok(None),
            index => constant_pool.utf8(index).map(Some),
        }
    }

    pub fn is_member_class(&self) -> bool {
        self.outer_class_info_index != 0
    }

    pub fn is_anonymous_class(&self) -> bool {
        self.inner_name_index == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingMethod {
    pub class_index: u16,
    pub method_index: u16,
}
impl EnclosingMethod {
    pub fn class_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.class_name(self.class_index)
    }

    /// Name and descriptor of the enclosing method, `None` when the class is
    /// enclosed by an initializer.
    pub fn method<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<(&'a str, &'a str)>> {
        match self.method_index {
            0 => Ok(None),
            index => constant_pool.name_and_type(index).map(Some),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodParameter {
    pub name_index: u16,
    pub access_flags: ParameterAccessFlags,
}
impl MethodParameter {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        match self.name_index {
            0 => Ok(None),
            index => constant_pool.utf8(index).map(Some),
        }
    }
}

#[cfg(test)]
mod attribute_type_tests {
    use super::*;

    #[test]
    fn it_should_look_up_registered_names() {
        assert_eq!(
            AttributeType::from_name("LocalVariableTypeTable"),
            Some(AttributeType::LocalVariableTypeTable)
        );
        assert_eq!(AttributeType::from_name("Unknown"), None);
    }

    #[test]
    fn it_should_round_trip_every_registered_name() {
        for (name, attribute_type) in AttributeType::REGISTRY {
            assert_eq!(attribute_type.name(), name);
            assert_eq!(AttributeType::from_name(name), Some(attribute_type));
        }
    }
}

#[cfg(test)]
mod code_attribute_tests {
    use super::*;

    fn code() -> CodeAttribute {
        CodeAttribute {
            max_stack: 1,
            max_locals: 2,
            code: vec![0; 20],
            exception_table: vec![],
            attributes: Attributes(vec![
                Attribute {
                    attribute_name_index: 1,
                    info: AttributeInfo::LineNumberTable(vec![
                        LineNumber {
                            start_pc: 0,
                            line_number: 10,
                        },
                        LineNumber {
                            start_pc: 8,
                            line_number: 12,
                        },
                    ]),
                },
                Attribute {
                    attribute_name_index: 2,
                    info: AttributeInfo::LocalVariableTable(vec![
                        LocalVariable {
                            start_pc: 2,
                            length: 4,
                            name_index: 3,
                            descriptor_index: 4,
                            index: 1,
                        },
                        LocalVariable {
                            start_pc: 10,
                            length: 6,
                            name_index: 5,
                            descriptor_index: 6,
                            index: 1,
                        },
                    ]),
                },
            ]),
        }
    }

    #[test]
    fn it_should_find_the_closest_preceding_line() {
        let code = code();
        assert_eq!(code.line_number_for(0), Some(10));
        assert_eq!(code.line_number_for(7), Some(10));
        assert_eq!(code.line_number_for(19), Some(12));
    }

    #[test]
    fn it_should_pick_the_variable_whose_range_covers_the_pc() {
        let code = code();
        assert_eq!(code.local_variable(1, 3).map(|lv| lv.name_index), Some(3));
        assert_eq!(code.local_variable(1, 12).map(|lv| lv.name_index), Some(5));
        assert_eq!(code.local_variable(1, 6), None);
        assert_eq!(code.local_variable(0, 3), None);
    }
}
