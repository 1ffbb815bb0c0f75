// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html

//! Decodes JVM class files into an immutable, lazily resolved model.
//!
//! ```no_run
//! use classlens_class_file::ClassFile;
//!
//! let bytes = std::fs::read("Main.class")?;
//! let class_file = ClassFile::from_bytes(&bytes)?;
//! for method in class_file.methods() {
//!     println!("{}", method.declaration()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod access_flags;
pub mod attributes;
mod class_file;
pub mod constant_pool;
pub mod descriptor;
mod error;
pub mod instruction;
mod mutf8;
pub mod opcodes;
mod parser;

pub use access_flags::{
    ClassAccessFlags, FieldAccessFlags, InnerClassAccessFlags, MethodAccessFlags,
};
pub use class_file::{ClassFile, ClassFileLoader, Field, FieldInfo, Method, MethodInfo};
pub use constant_pool::{Constant, ConstantPool, CpInfo, MemberRef};
pub use error::ClassFileError;
pub use instruction::Instruction;
pub use parser::{Parser, ParserOptions, MAGIC};

pub type Result<T, E = ClassFileError> = std::result::Result<T, E>;
