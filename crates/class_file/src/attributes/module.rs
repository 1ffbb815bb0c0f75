// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.25

use crate::{
    access_flags::ModuleFlags,
    attributes::Attributes,
    constant_pool::{ConstantPool, ModuleInfo, PackageInfo},
    matches_cp_info, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleAttribute {
    pub module_name_index: u16,
    pub module_flags: ModuleFlags,
    pub module_version_index: u16,
    pub requires: Vec<Requires>,
    pub exports: Vec<Exports>,
    pub opens: Vec<Opens>,
    pub uses_index: Vec<u16>,
    pub provides: Vec<Provides>,
}
impl ModuleAttribute {
    pub fn module_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        module_name(constant_pool, self.module_name_index)
    }

    pub fn module_version<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        optional_utf8(constant_pool, self.module_version_index)
    }

    pub fn is_open(&self) -> bool {
        self.module_flags.contains(ModuleFlags::OPEN)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Requires {
    pub requires_index: u16,
    pub requires_flags: ModuleFlags,
    pub requires_version_index: u16,
}
impl Requires {
    pub fn module_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        module_name(constant_pool, self.requires_index)
    }

    pub fn version<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Option<&'a str>> {
        optional_utf8(constant_pool, self.requires_version_index)
    }

    pub fn is_transitive(&self) -> bool {
        self.requires_flags.contains(ModuleFlags::TRANSITIVE)
    }

    pub fn is_static_phase(&self) -> bool {
        self.requires_flags.contains(ModuleFlags::STATIC_PHASE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exports {
    pub exports_index: u16,
    pub exports_flags: ModuleFlags,
    pub exports_to_index: Vec<u16>,
}
impl Exports {
    pub fn package_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        package_name(constant_pool, self.exports_index)
    }

    /// Empty when the package is exported to every module.
    pub fn target_modules<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Vec<&'a str>> {
        self.exports_to_index
            .iter()
            .map(|i| module_name(constant_pool, *i))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Opens {
    pub opens_index: u16,
    pub opens_flags: ModuleFlags,
    pub opens_to_index: Vec<u16>,
}
impl Opens {
    pub fn package_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        package_name(constant_pool, self.opens_index)
    }

    pub fn target_modules<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Vec<&'a str>> {
        self.opens_to_index
            .iter()
            .map(|i| module_name(constant_pool, *i))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provides {
    pub provides_index: u16,
    pub provides_with_index: Vec<u16>,
}
impl Provides {
    pub fn service_name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.class_name(self.provides_index)
    }

    pub fn implementation_names<'a>(&self, constant_pool: &'a ConstantPool) -> Result<Vec<&'a str>> {
        self.provides_with_index
            .iter()
            .map(|i| constant_pool.class_name(*i))
            .collect()
    }
}

// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.23
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: u16,
    pub bootstrap_arguments: Vec<u16>,
}

// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.30
#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}
impl RecordComponent {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.descriptor_index)
    }
}

fn module_name(constant_pool: &ConstantPool, index: u16) -> Result<&str> {
    let ModuleInfo { name_index } = matches_cp_info!(constant_pool, index, Module)?;
    constant_pool.utf8(*name_index)
}

fn package_name(constant_pool: &ConstantPool, index: u16) -> Result<&str> {
    let PackageInfo { name_index } = matches_cp_info!(constant_pool, index, Package)?;
    constant_pool.utf8(*name_index)
}

fn optional_utf8(constant_pool: &ConstantPool, index: u16) -> Result<Option<&str>> {
    match index {
        0 => Ok(None),
        index => constant_pool.utf8(index).map(Some),
    }
}
