use std::{
    collections::HashMap,
    hash::BuildHasher,
    io::{Cursor, Read, Seek},
};

use crate::{
    access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
    attributes::{AttributeType, Attributes, CodeAttribute, InnerClass},
    constant_pool::{ClassInfo, Constant},
    descriptor::{self, java_name},
    instruction::Instructions,
    matches_cp_info,
    parser::Parser,
    ConstantPool, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Attributes,
}
impl ClassFile {
    pub fn parse(bytes: impl Read + Seek) -> Result<ClassFile> {
        Parser::new(bytes).parse()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ClassFile> {
        Parser::new(Cursor::new(bytes)).parse()
    }

    /// The name of this class in internal form, e.g. `java/lang/Object`.
    pub fn class_name(&self) -> Result<&str> {
        // The value of the this_class item must be a valid index into the constant_pool table.
        // The constant_pool entry at that index must be a CONSTANT_Class_info structure (§4.4.1)
        // representing the class or interface defined by this class file.

        let ClassInfo { name_index } =
            matches_cp_info!(self.constant_pool, self.this_class, Class)?;

        matches_cp_info!(self.constant_pool, *name_index, Utf8).map(String::as_str)
    }

    /// The package in internal form, empty for the unnamed package.
    pub fn package_name(&self) -> Result<&str> {
        Ok(self
            .class_name()?
            .rsplit_once('/')
            .map_or("", |(package, _)| package))
    }

    pub fn simple_name(&self) -> Result<&str> {
        let class_name = self.class_name()?;
        Ok(class_name
            .rsplit_once('/')
            .map_or(class_name, |(_, simple)| simple))
    }

    pub fn super_class(&self) -> Result<Option<&str>> {
        // If the value of the super_class item is zero, then this class file must represent the class Object,
        // the only class or interface without a direct superclass.
        if !self.has_super_class() {
            return Ok(None);
        }

        let ClassInfo { name_index } =
            matches_cp_info!(self.constant_pool, self.super_class, Class)?;

        matches_cp_info!(self.constant_pool, *name_index, Utf8).map(|name| Some(name.as_str()))
    }

    pub fn has_super_class(&self) -> bool {
        self.super_class != 0
    }

    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|index| self.constant_pool.class_name(*index))
            .collect()
    }

    pub fn has_interface(&self, name: &str) -> Result<bool> {
        Ok(self.interface_names()?.contains(&name))
    }

    pub fn source_file(&self) -> Result<Option<&str>> {
        self.attributes
            .source_file_index()
            .map(|index| self.constant_pool.utf8(index))
            .transpose()
    }

    pub fn field_name(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool.utf8(field.name_index)
    }

    pub fn field_descriptor(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool.utf8(field.descriptor_index)
    }

    pub fn method_name(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.utf8(method.descriptor_index)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        self.fields.iter().map(move |info| Field {
            class_file: self,
            info,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = Method<'_>> {
        self.methods.iter().map(move |info| Method {
            class_file: self,
            info,
        })
    }

    pub fn field(&self, name: &str) -> Result<Option<Field<'_>>> {
        for field in self.fields() {
            if field.name()? == name {
                return Ok(Some(field));
            }
        }

        Ok(None)
    }

    /// Looks a method up by its [`Method::signature`], e.g. `toString()`.
    pub fn method(&self, signature: &str) -> Result<Option<Method<'_>>> {
        for method in self.methods() {
            if method.signature()? == signature {
                return Ok(Some(method));
            }
        }

        Ok(None)
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::PUBLIC)
    }

    pub fn is_package(&self) -> bool {
        !self.is_public()
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::FINAL)
    }

    pub fn is_super(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::SUPER)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::SYNTHETIC)
            || self.attributes.contains(AttributeType::Synthetic)
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ANNOTATION)
    }

    pub fn is_enum(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ENUM)
    }

    pub fn is_module(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::MODULE)
    }

    pub fn is_deprecated(&self) -> bool {
        self.attributes.contains(AttributeType::Deprecated)
    }

    pub fn is_generic(&self) -> bool {
        self.attributes.contains(AttributeType::Signature)
    }

    // The last InnerClasses entry describing this very class.
    fn matching_inner_class(&self) -> Result<Option<&InnerClass>> {
        let class_name = self.class_name()?;

        let mut matching = None;
        for inner_class in self.attributes.inner_classes() {
            if inner_class.inner_class_name(&self.constant_pool)? == class_name {
                matching = Some(inner_class);
            }
        }

        Ok(matching)
    }

    pub fn is_inner_class(&self) -> Result<bool> {
        Ok(self.matching_inner_class()?.is_some())
    }

    pub fn is_member_class(&self) -> Result<bool> {
        Ok(self
            .matching_inner_class()?
            .map_or(false, InnerClass::is_member_class))
    }

    pub fn is_local_class(&self) -> Result<bool> {
        let is_local = match self.matching_inner_class()? {
            Some(inner_class) => {
                self.attributes.enclosing_method().is_some() && !inner_class.is_anonymous_class()
            }
            None => false,
        };
        Ok(is_local)
    }

    pub fn is_anonymous_class(&self) -> Result<bool> {
        Ok(self
            .matching_inner_class()?
            .map_or(false, InnerClass::is_anonymous_class))
    }

    /// A Java-like declaration, e.g. `public abstract class a.B extends a.C implements a.D`.
    pub fn declaration(&self) -> Result<String> {
        let mut declaration = String::new();

        if self.is_public() {
            declaration.push_str("public ");
        }
        if self.is_final() {
            declaration.push_str("final ");
        }

        let interfaces = self
            .interface_names()?
            .into_iter()
            .map(java_name)
            .collect::<Vec<_>>()
            .join(", ");

        if self.is_interface() {
            declaration.push_str("interface ");
            declaration.push_str(&java_name(self.class_name()?));

            if !interfaces.is_empty() {
                declaration.push_str(" extends ");
                declaration.push_str(&interfaces);
            }
        } else {
            if self.is_abstract() {
                declaration.push_str("abstract ");
            }
            declaration.push_str("class ");
            declaration.push_str(&java_name(self.class_name()?));

            if let Some(super_class) = self.super_class()? {
                declaration.push_str(" extends ");
                declaration.push_str(&java_name(super_class));
            }

            if !interfaces.is_empty() {
                declaration.push_str(" implements ");
                declaration.push_str(&interfaces);
            }
        }

        Ok(declaration)
    }

    /// Finds a field declared here or inherited from a supertype the loader knows.
    pub fn locate_field<'a>(
        &'a self,
        name: &str,
        loader: &'a dyn ClassFileLoader,
    ) -> Result<Option<Field<'a>>> {
        self.locate(name, loader, &mut Vec::new())
    }

    /// Finds a method by signature, declared here or inherited from a
    /// supertype the loader knows.
    pub fn locate_method<'a>(
        &'a self,
        signature: &str,
        loader: &'a dyn ClassFileLoader,
    ) -> Result<Option<Method<'a>>> {
        self.locate(signature, loader, &mut Vec::new())
    }

    /// The topmost declarations of a method in the supertypes, or this class'
    /// own method when no supertype declares it.
    pub fn locate_method_declarations<'a>(
        &'a self,
        signature: &str,
        loader: &'a dyn ClassFileLoader,
    ) -> Result<Vec<Method<'a>>> {
        self.locate_declarations(signature, loader, &mut Vec::new())
    }

    fn locate<'a, M: Member<'a>>(
        &'a self,
        key: &str,
        loader: &'a dyn ClassFileLoader,
        visited: &mut Vec<&'a str>,
    ) -> Result<Option<M>> {
        visited.push(self.class_name()?);

        if let Some(local) = M::find(self, key)? {
            return Ok(Some(local));
        }

        if let Some(super_class) = self.super_class()? {
            if let Some(class_file) = unvisited(loader, super_class, visited) {
                if let Some(inherited) = class_file.locate::<M>(key, loader, visited)? {
                    let visible = match inherited.visibility() {
                        Visibility::Public | Visibility::Protected => true,
                        Visibility::Package => {
                            inherited.owner().package_name()? == self.package_name()?
                        }
                        Visibility::Private => false,
                    };
                    if visible {
                        return Ok(Some(inherited));
                    }
                }
            }
        }

        for interface in self.interface_names()? {
            if let Some(class_file) = unvisited(loader, interface, visited) {
                if let Some(inherited) = class_file.locate::<M>(key, loader, visited)? {
                    if matches!(
                        inherited.visibility(),
                        Visibility::Public | Visibility::Protected
                    ) {
                        return Ok(Some(inherited));
                    }
                }
            }
        }

        Ok(None)
    }

    fn locate_declarations<'a>(
        &'a self,
        signature: &str,
        loader: &'a dyn ClassFileLoader,
        visited: &mut Vec<&'a str>,
    ) -> Result<Vec<Method<'a>>> {
        visited.push(self.class_name()?);

        let mut supertypes = self.interface_names()?;
        supertypes.extend(self.super_class()?);

        let mut declarations = Vec::new();
        for supertype in supertypes {
            if let Some(class_file) = unvisited(loader, supertype, visited) {
                declarations.extend(class_file.locate_declarations(signature, loader, visited)?);
            }
        }

        if declarations.is_empty() {
            declarations.extend(self.method(signature)?);
        }

        Ok(declarations)
    }
}

// Each class is searched once, which also ends cyclic hierarchies.
fn unvisited<'a>(
    loader: &'a dyn ClassFileLoader,
    name: &str,
    visited: &[&str],
) -> Option<&'a ClassFile> {
    if visited.contains(&name) {
        log::debug!("{} was already visited", name);
        return None;
    }

    let class_file = loader.class_file(name);
    if class_file.is_none() {
        log::debug!("{} is not known to the loader", name);
    }
    class_file
}

/// Hands out decoded class files by internal name (`java/lang/Object`).
pub trait ClassFileLoader {
    fn class_file(&self, name: &str) -> Option<&ClassFile>;
}

impl<S: BuildHasher> ClassFileLoader for HashMap<String, ClassFile, S> {
    fn class_file(&self, name: &str) -> Option<&ClassFile> {
        self.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

trait Member<'a>: Sized {
    fn find(class_file: &'a ClassFile, key: &str) -> Result<Option<Self>>;
    fn owner(&self) -> &'a ClassFile;
    fn visibility(&self) -> Visibility;
}

impl<'a> Member<'a> for Field<'a> {
    fn find(class_file: &'a ClassFile, name: &str) -> Result<Option<Self>> {
        class_file.field(name)
    }

    fn owner(&self) -> &'a ClassFile {
        self.class_file
    }

    fn visibility(&self) -> Visibility {
        let flags = self.info.access_flags;
        if flags.contains(FieldAccessFlags::PUBLIC) {
            Visibility::Public
        } else if flags.contains(FieldAccessFlags::PROTECTED) {
            Visibility::Protected
        } else if flags.contains(FieldAccessFlags::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }
}

impl<'a> Member<'a> for Method<'a> {
    fn find(class_file: &'a ClassFile, signature: &str) -> Result<Option<Self>> {
        class_file.method(signature)
    }

    fn owner(&self) -> &'a ClassFile {
        self.class_file
    }

    fn visibility(&self) -> Visibility {
        let flags = self.info.access_flags;
        if flags.contains(MethodAccessFlags::PUBLIC) {
            Visibility::Public
        } else if flags.contains(MethodAccessFlags::PROTECTED) {
            Visibility::Protected
        } else if flags.contains(MethodAccessFlags::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: FieldAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: MethodAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}

/// A field together with the class file declaring it.
#[derive(Debug, Clone, Copy)]
pub struct Field<'a> {
    class_file: &'a ClassFile,
    info: &'a FieldInfo,
}
impl<'a> Field<'a> {
    pub fn class_file(&self) -> &'a ClassFile {
        self.class_file
    }

    pub fn info(&self) -> &'a FieldInfo {
        self.info
    }

    pub fn access_flags(&self) -> FieldAccessFlags {
        self.info.access_flags
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.info.attributes
    }

    pub fn name(&self) -> Result<&'a str> {
        self.class_file.field_name(self.info)
    }

    pub fn descriptor(&self) -> Result<&'a str> {
        self.class_file.field_descriptor(self.info)
    }

    /// `java.lang.System.out`
    pub fn full_name(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            java_name(self.class_file.class_name()?),
            self.name()?
        ))
    }

    pub fn signature(&self) -> Result<&'a str> {
        self.name()
    }

    pub fn full_signature(&self) -> Result<String> {
        self.full_name()
    }

    /// The Java type of the field, e.g. `java.lang.String[]`.
    pub fn type_name(&self) -> Result<String> {
        descriptor::type_name(self.descriptor()?)
    }

    pub fn constant_value(&self) -> Result<Option<Constant<'a>>> {
        self.info
            .attributes
            .constant_value_index()
            .map(|index| self.class_file.constant_pool.resolve(index))
            .transpose()
    }

    pub fn is_public(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::PUBLIC)
    }

    pub fn is_protected(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::PROTECTED)
    }

    pub fn is_private(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::PRIVATE)
    }

    pub fn is_package(&self) -> bool {
        self.info.access_flags.is_package()
    }

    pub fn is_static(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::FINAL)
    }

    pub fn is_volatile(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::VOLATILE)
    }

    pub fn is_transient(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::TRANSIENT)
    }

    pub fn is_enum(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::ENUM)
    }

    pub fn is_synthetic(&self) -> bool {
        self.info.access_flags.contains(FieldAccessFlags::SYNTHETIC)
            || self.info.attributes.contains(AttributeType::Synthetic)
    }

    pub fn is_deprecated(&self) -> bool {
        self.info.attributes.contains(AttributeType::Deprecated)
    }

    pub fn is_generic(&self) -> bool {
        self.info.attributes.contains(AttributeType::Signature)
    }

    pub fn generic_signature(&self) -> Result<Option<&'a str>> {
        self.info
            .attributes
            .signature_index()
            .map(|index| self.class_file.constant_pool.utf8(index))
            .transpose()
    }

    /// `private static final int count`
    pub fn declaration(&self) -> Result<String> {
        let mut declaration = String::new();

        for (set, modifier) in [
            (self.is_public(), "public "),
            (self.is_protected(), "protected "),
            (self.is_private(), "private "),
            (self.is_static(), "static "),
            (self.is_final(), "final "),
            (self.is_transient(), "transient "),
            (self.is_volatile(), "volatile "),
        ] {
            if set {
                declaration.push_str(modifier);
            }
        }

        declaration.push_str(&self.type_name()?);
        declaration.push(' ');
        declaration.push_str(self.name()?);

        Ok(declaration)
    }
}

/// A method together with the class file declaring it.
#[derive(Debug, Clone, Copy)]
pub struct Method<'a> {
    class_file: &'a ClassFile,
    info: &'a MethodInfo,
}
impl<'a> Method<'a> {
    pub fn class_file(&self) -> &'a ClassFile {
        self.class_file
    }

    pub fn info(&self) -> &'a MethodInfo {
        self.info
    }

    pub fn access_flags(&self) -> MethodAccessFlags {
        self.info.access_flags
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.info.attributes
    }

    pub fn name(&self) -> Result<&'a str> {
        self.class_file.method_name(self.info)
    }

    pub fn descriptor(&self) -> Result<&'a str> {
        self.class_file.method_descriptor(self.info)
    }

    pub fn full_name(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            java_name(self.class_file.class_name()?),
            self.name()?
        ))
    }

    pub fn is_constructor(&self) -> Result<bool> {
        Ok(self.name()? == "<init>")
    }

    pub fn is_static_initializer(&self) -> Result<bool> {
        Ok(self.name()? == "<clinit>")
    }

    /// `toString()`, `Point(int, int)` for constructors, `static {}` for
    /// static initializers.
    pub fn signature(&self) -> Result<String> {
        let signature = match self.name()? {
            "<init>" => format!(
                "{}{}",
                self.class_file.simple_name()?,
                descriptor::signature(self.descriptor()?)?
            ),
            "<clinit>" => "static {}".to_owned(),
            name => format!("{}{}", name, descriptor::signature(self.descriptor()?)?),
        };
        Ok(signature)
    }

    pub fn full_signature(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            java_name(self.class_file.class_name()?),
            self.signature()?
        ))
    }

    pub fn return_type(&self) -> Result<String> {
        descriptor::return_type(self.descriptor()?)
    }

    /// Checked exceptions in internal form, from the `Exceptions` attribute.
    pub fn exceptions(&self) -> Result<Vec<&'a str>> {
        self.info
            .attributes
            .exceptions()
            .unwrap_or_default()
            .iter()
            .map(|index| self.class_file.constant_pool.class_name(*index))
            .collect()
    }

    pub fn code(&self) -> Option<&'a CodeAttribute> {
        self.info.attributes.code()
    }

    /// The bytecode of the method, `None` for abstract and native methods.
    pub fn instructions(&self) -> Option<Instructions<'a>> {
        self.code()
            .map(|code| code.instructions(&self.class_file.constant_pool))
    }

    pub fn is_public(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::PUBLIC)
    }

    pub fn is_protected(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::PROTECTED)
    }

    pub fn is_private(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_package(&self) -> bool {
        self.info.access_flags.is_package()
    }

    pub fn is_static(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::FINAL)
    }

    pub fn is_synchronized(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::SYNCHRONIZED)
    }

    pub fn is_bridge(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::BRIDGE)
    }

    pub fn is_varargs(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::VARARGS)
    }

    pub fn is_native(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_abstract(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_strict(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::STRICT)
    }

    pub fn is_synthetic(&self) -> bool {
        self.info.access_flags.contains(MethodAccessFlags::SYNTHETIC)
            || self.info.attributes.contains(AttributeType::Synthetic)
    }

    pub fn is_deprecated(&self) -> bool {
        self.info.attributes.contains(AttributeType::Deprecated)
    }

    pub fn is_generic(&self) -> bool {
        self.info.attributes.contains(AttributeType::Signature)
    }

    pub fn generic_signature(&self) -> Result<Option<&'a str>> {
        self.info
            .attributes
            .signature_index()
            .map(|index| self.class_file.constant_pool.utf8(index))
            .transpose()
    }

    /// `public static void main(java.lang.String[]) throws java.io.IOException`
    pub fn declaration(&self) -> Result<String> {
        let is_constructor = self.is_constructor()?;
        let is_static_initializer = self.is_static_initializer()?;
        let mut declaration = String::new();

        for (set, modifier) in [
            (self.is_public(), "public "),
            (self.is_protected(), "protected "),
            (self.is_private(), "private "),
            (self.is_static() && !is_static_initializer, "static "),
            (self.is_final(), "final "),
            (self.is_synchronized(), "synchronized "),
            (self.is_native(), "native "),
            (self.is_abstract(), "abstract "),
        ] {
            if set {
                declaration.push_str(modifier);
            }
        }

        if !is_constructor && !is_static_initializer {
            declaration.push_str(&self.return_type()?);
            declaration.push(' ');
        }

        declaration.push_str(&self.signature()?);

        let exceptions = self.exceptions()?;
        if !exceptions.is_empty() {
            declaration.push_str(" throws ");
            declaration.push_str(
                &exceptions
                    .into_iter()
                    .map(java_name)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        Ok(declaration)
    }
}
