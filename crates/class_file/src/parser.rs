mod annotations;
mod attributes;

use std::io::{self, BufReader, Cursor, Read, Seek};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{
    access_flags::{ClassAccessFlags, FieldAccessFlags, MethodAccessFlags},
    attributes::{Attribute, AttributeInfo, AttributeOwner, AttributeType, Attributes},
    class_file::{FieldInfo, MethodInfo},
    constant_pool::{self, CpInfo},
    mutf8, ClassFile, ClassFileError, ConstantPool, Result,
};

type Endian = BigEndian;

pub const MAGIC: u32 = 0xCAFEBABE;

/// Knobs for inputs the decoder can either reject or work around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Record an unusable slot for unknown constant pool tags instead of failing.
    pub skip_unknown_constant_tags: bool,
    /// Keep annotation attributes with unknown element value tags as
    /// [`AttributeInfo::Custom`] instead of failing.
    pub opaque_malformed_annotations: bool,
}
impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            skip_unknown_constant_tags: false,
            opaque_malformed_annotations: true,
        }
    }
}
impl ParserOptions {
    pub fn with_skip_unknown_constant_tags(mut self, skip: bool) -> Self {
        self.skip_unknown_constant_tags = skip;
        self
    }

    pub fn with_opaque_malformed_annotations(mut self, opaque: bool) -> Self {
        self.opaque_malformed_annotations = opaque;
        self
    }
}

pub struct Parser<R> {
    r: BufReader<R>,
    options: ParserOptions,
    // Absolute offset of the first byte of `r`, non-zero for attribute payloads.
    base: u64,
    // Bytes consumed from `r` so far.
    consumed: u64,
}
impl<R: Read + Seek> Parser<R> {
    pub fn new(r: R) -> Self {
        Self::with_options(r, ParserOptions::default())
    }

    pub fn with_options(r: R, options: ParserOptions) -> Self {
        Self {
            r: BufReader::new(r),
            options,
            base: 0,
            consumed: 0,
        }
    }

    pub fn parse(&mut self) -> Result<ClassFile> {
        let magic = self.record(Self::parse_magic_identifier)?;
        let (minor_version, major_version) = self.record(Self::parse_version)?;
        log::debug!("Class file version {}.{}", major_version, minor_version);

        let constant_pool = self.parse_constant_pool()?;
        log::debug!("Constant pool holds {} positions", constant_pool.len());

        let (access_flags, this_class, super_class, interfaces) =
            self.record(Self::parse_class_header)?;

        let fields_count = self.record(Self::read_u16)?;
        let fields = (0..fields_count)
            .map(|_| self.record(|p| p.parse_field_info(&constant_pool)))
            .collect::<Result<Vec<_>>>()?;

        let methods_count = self.record(Self::read_u16)?;
        let methods = (0..methods_count)
            .map(|_| self.record(|p| p.parse_method_info(&constant_pool)))
            .collect::<Result<Vec<_>>>()?;

        let attributes = self.parse_attributes(&constant_pool, AttributeOwner::ClassFile)?;

        log::debug!(
            "Decoded {} fields, {} methods and {} attributes",
            fields.len(),
            methods.len(),
            attributes.len()
        );

        Ok(ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_class_header(&mut self) -> Result<(ClassAccessFlags, u16, u16, Vec<u16>)> {
        let access_flags = ClassAccessFlags::from_bits_truncate(self.read_u16()?);
        let this_class = self.read_u16()?;
        let super_class = self.read_u16()?;
        let interfaces = self.read_u16_table()?;

        Ok((access_flags, this_class, super_class, interfaces))
    }

    fn parse_field_info(&mut self, constant_pool: &ConstantPool) -> Result<FieldInfo> {
        let access_flags = FieldAccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool, AttributeOwner::Field)?;

        Ok(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_method_info(&mut self, constant_pool: &ConstantPool) -> Result<MethodInfo> {
        let access_flags = MethodAccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool, AttributeOwner::Method)?;

        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_magic_identifier(&mut self) -> Result<u32> {
        match self.read_u32()? {
            MAGIC => Ok(MAGIC),
            magic_identifier => Err(ClassFileError::InvalidMagicIdentifier(magic_identifier)),
        }
    }

    fn parse_version(&mut self) -> Result<(u16, u16)> {
        let minor = self.read_u16()?;
        let major = self.read_u16()?;
        Ok((minor, major))
    }

    fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let constant_pool_count = self.record(Self::read_u16)? as usize;

        let mut cp_infos = Vec::with_capacity(constant_pool_count.max(1));
        cp_infos.push(CpInfo::Unusable);
        while cp_infos.len() < constant_pool_count {
            let cp_info = self.record(Self::parse_cp_info)?;
            log::trace!("#{} = {:?}", cp_infos.len(), cp_info);

            let double_width = cp_info.is_double_width();
            cp_infos.push(cp_info);
            if double_width {
                cp_infos.push(CpInfo::Unusable);
            }
        }
        // A Long or Double in the last position has no slot to spill into.
        cp_infos.truncate(constant_pool_count.max(1));

        Ok(ConstantPool::from_positions(cp_infos))
    }

    fn parse_cp_info(&mut self) -> Result<CpInfo> {
        let tag = self.read_u8()?;
        let cp_info = match tag {
            CpInfo::UTF8 => self.parse_utf8()?,
            CpInfo::INTEGER => CpInfo::Integer(self.read_i32()?),
            CpInfo::FLOAT => CpInfo::Float(self.read_f32()?),
            CpInfo::LONG => CpInfo::Long(self.read_i64()?),
            CpInfo::DOUBLE => CpInfo::Double(self.read_f64()?),
            CpInfo::CLASS => self.parse_class_info()?,
            CpInfo::STRING => self.parse_string()?,
            CpInfo::FIELD_REF => CpInfo::FieldRef(self.parse_ref_info()?),
            CpInfo::METHOD_REF => CpInfo::MethodRef(self.parse_ref_info()?),
            CpInfo::INTERFACE_METHOD_REF => CpInfo::InterfaceMethodRef(self.parse_ref_info()?),
            CpInfo::NAME_AND_TYPE => self.parse_name_and_type_info()?,
            CpInfo::METHOD_HANDLE => self.parse_method_handle()?,
            CpInfo::METHOD_TYPE => self.parse_method_type_info()?,
            CpInfo::DYNAMIC => CpInfo::Dynamic(self.parse_dynamic_info()?),
            CpInfo::INVOKE_DYNAMIC => CpInfo::InvokeDynamic(self.parse_dynamic_info()?),
            CpInfo::MODULE => CpInfo::Module(constant_pool::ModuleInfo {
                name_index: self.read_u16()?,
            }),
            CpInfo::PACKAGE => CpInfo::Package(constant_pool::PackageInfo {
                name_index: self.read_u16()?,
            }),
            _ if self.options.skip_unknown_constant_tags => {
                log::warn!("Skipping constant pool entry with unknown tag {}", tag);
                CpInfo::Unusable
            }
            _ => return Err(ClassFileError::InvalidCpInfoTag(tag)),
        };

        Ok(cp_info)
    }

    fn parse_utf8(&mut self) -> Result<CpInfo> {
        let length = self.read_u16()?;
        let bytes = self.read_bytes(length as u64)?;

        Ok(CpInfo::Utf8(mutf8::decode(&bytes)))
    }

    fn parse_class_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;

        Ok(CpInfo::Class(constant_pool::ClassInfo { name_index }))
    }

    fn parse_string(&mut self) -> Result<CpInfo> {
        let string_index = self.read_u16()?;

        Ok(CpInfo::String(constant_pool::StringInfo { string_index }))
    }

    fn parse_name_and_type_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::NameAndType(constant_pool::NameAndTypeInfo {
            name_index,
            descriptor_index,
        }))
    }

    fn parse_method_handle(&mut self) -> Result<CpInfo> {
        let reference_kind = self.read_u8()?;
        let reference_index = self.read_u16()?;

        Ok(CpInfo::MethodHandle(constant_pool::MethodHandleInfo {
            reference_kind,
            reference_index,
        }))
    }

    fn parse_method_type_info(&mut self) -> Result<CpInfo> {
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::MethodType(constant_pool::MethodTypeInfo {
            descriptor_index,
        }))
    }

    fn parse_dynamic_info(&mut self) -> Result<constant_pool::DynamicInfo> {
        let bootstrap_method_attr_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::DynamicInfo {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    fn parse_ref_info(&mut self) -> Result<constant_pool::RefInfo> {
        let class_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::RefInfo {
            class_index,
            name_and_type_index,
        })
    }

    fn parse_attributes(
        &mut self,
        constant_pool: &ConstantPool,
        owner: AttributeOwner,
    ) -> Result<Attributes> {
        let attributes_count = self.record(Self::read_u16)?;
        (0..attributes_count)
            .map(|_| self.record(|p| p.parse_attribute(constant_pool, owner)))
            .collect::<Result<Vec<_>>>()
            .map(Attributes)
    }

    fn parse_attribute(
        &mut self,
        constant_pool: &ConstantPool,
        owner: AttributeOwner,
    ) -> Result<Attribute> {
        let attribute_name_index = self.read_u16()?;
        let attribute_length = self.read_u32()?;
        let payload_start = self.position();
        let payload = self.read_bytes(attribute_length as u64)?;

        let attribute_type = constant_pool
            .utf8(attribute_name_index)
            .ok()
            .and_then(AttributeType::from_name);

        let info = match attribute_type {
            Some(attribute_type) => {
                log::trace!(
                    "{:?} attribute {} ({} bytes)",
                    owner,
                    attribute_type,
                    attribute_length
                );
                self.parse_attribute_info(attribute_type, payload, payload_start, constant_pool)?
            }
            None => {
                log::debug!(
                    "{:?} attribute #{} is not a known attribute, keeping {} raw bytes",
                    owner,
                    attribute_name_index,
                    attribute_length
                );
                AttributeInfo::Custom(payload)
            }
        };

        Ok(Attribute {
            attribute_name_index,
            info,
        })
    }

    /// Decodes a buffered payload, which must be consumed exactly.
    fn parse_attribute_info(
        &self,
        attribute_type: AttributeType,
        payload: Vec<u8>,
        payload_start: u64,
        constant_pool: &ConstantPool,
    ) -> Result<AttributeInfo> {
        let declared = payload.len() as u32;
        let mut parser = Parser {
            r: BufReader::new(Cursor::new(payload.as_slice())),
            options: self.options,
            base: payload_start,
            consumed: 0,
        };

        let info = match parser.parse_attribute_body(attribute_type, constant_pool) {
            Ok(info) => info,
            Err(e) if e.is_truncated() => {
                return Err(ClassFileError::AttributeOverrun {
                    name: attribute_type.name(),
                    declared,
                })
            }
            Err(e)
                if self.options.opaque_malformed_annotations
                    && attribute_type.carries_annotations()
                    && matches!(e.cause(), ClassFileError::InvalidElementValueTag(_)) =>
            {
                log::warn!("Keeping {} attribute as raw bytes: {}", attribute_type, e);
                return Ok(AttributeInfo::Custom(payload));
            }
            Err(e) => return Err(e),
        };

        let consumed = parser.consumed;
        if consumed != declared as u64 {
            return Err(ClassFileError::AttributeLengthMismatch {
                name: attribute_type.name(),
                declared,
                consumed,
            });
        }

        Ok(info)
    }

    /// Runs `f`, tagging any failure with the offset the record started at.
    fn record<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let offset = self.position();
        f(self).map_err(|e| e.at(offset))
    }

    fn position(&self) -> u64 {
        self.base + self.consumed
    }

    fn advance<T>(&mut self, width: u64, value: T) -> T {
        self.consumed += width;
        value
    }

    // Reads through `take` so a corrupt length cannot force a huge allocation.
    fn read_bytes(&mut self, length: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.r.by_ref().take(length).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < length {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(self.advance(length, bytes))
    }

    fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.r.read_to_end(&mut bytes)?;
        Ok(self.advance(bytes.len() as u64, bytes))
    }

    fn read_u16_table(&mut self) -> Result<Vec<u16>> {
        let length = self.read_u16()?;
        let mut table = vec![0u16; length as usize];
        self.r.read_u16_into::<Endian>(&mut table)?;
        Ok(self.advance(2 * length as u64, table))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let value = self.r.read_u32::<Endian>()?;
        Ok(self.advance(4, value))
    }

    fn read_u16(&mut self) -> Result<u16> {
        let value = self.r.read_u16::<Endian>()?;
        Ok(self.advance(2, value))
    }

    fn read_u8(&mut self) -> Result<u8> {
        let value = self.r.read_u8()?;
        Ok(self.advance(1, value))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let value = self.r.read_i32::<Endian>()?;
        Ok(self.advance(4, value))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let value = self.r.read_f32::<Endian>()?;
        Ok(self.advance(4, value))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let value = self.r.read_i64::<Endian>()?;
        Ok(self.advance(8, value))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let value = self.r.read_f64::<Endian>()?;
        Ok(self.advance(8, value))
    }
}

#[cfg(test)]
fn parser(bytes: &[u8]) -> Parser<Cursor<&[u8]>> {
    Parser::new(Cursor::new(bytes))
}


#[cfg(test)]
mod parse_version_tests {
    use super::*;

    #[test]
    fn it_should_be_able_to_parse_a_version() {
        assert_eq!(
            parser(&[0x00, 0x03, 0x00, 0x3d]).parse_version().unwrap(),
            (3, 61)
        );
    }
}

#[cfg(test)]
mod parse_constant_pool_tests {
    use super::*;

    #[test]
    fn it_should_reserve_the_slot_after_longs_and_doubles() {
        let constant_pool = parser(&[
            0x00, 0x06, // count
            0x05, 0, 0, 0, 0, 0, 0, 0, 0x2a, // #1 Long 42
            0x06, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0, // #3 Double 1.0
            0x03, 0xff, 0xff, 0xff, 0xff, // #5 Integer -1
        ])
        .parse_constant_pool()
        .unwrap();

        assert_eq!(constant_pool.len(), 6);
        assert_eq!(constant_pool.get(1).unwrap(), &CpInfo::Long(42));
        assert!(constant_pool.get(2).is_err());
        assert_eq!(constant_pool.get(3).unwrap(), &CpInfo::Double(1.0));
        assert!(constant_pool.get(4).is_err());
        assert_eq!(constant_pool.get(5).unwrap(), &CpInfo::Integer(-1));
    }

    #[test]
    fn it_should_decode_float_bit_patterns() {
        let constant_pool = parser(&[
            0x00, 0x04, // count
            0x04, 0x7f, 0x80, 0x00, 0x00, // +inf
            0x04, 0xff, 0x80, 0x00, 0x00, // -inf
            0x04, 0x7f, 0xc0, 0x00, 0x00, // NaN
        ])
        .parse_constant_pool()
        .unwrap();

        assert_eq!(constant_pool.get(1).unwrap(), &CpInfo::Float(f32::INFINITY));
        assert_eq!(
            constant_pool.get(2).unwrap(),
            &CpInfo::Float(f32::NEG_INFINITY)
        );
        assert!(matches!(constant_pool.get(3).unwrap(), CpInfo::Float(f) if f.is_nan()));
    }

    #[test]
    fn it_should_decode_modified_utf8() {
        let constant_pool = parser(&[0x00, 0x02, 0x01, 0x00, 0x03, 0x61, 0xc0, 0x80])
            .parse_constant_pool()
            .unwrap();

        assert_eq!(constant_pool.utf8(1).unwrap(), "a\0");
    }

    #[test]
    fn it_should_fail_on_unknown_tags() {
        let err = parser(&[0x00, 0x03, 0x03, 0, 0, 0, 1, 0x02, 0x00])
            .parse_constant_pool()
            .unwrap_err();

        assert_eq!(err.offset(), Some(7));
        assert!(matches!(err.cause(), ClassFileError::InvalidCpInfoTag(2)));
    }

    #[test]
    fn it_should_skip_unknown_tags_when_asked_to() {
        let constant_pool = Parser::with_options(
            Cursor::new(&[0x00, 0x03, 0x02, 0x03, 0, 0, 0, 1][..]),
            ParserOptions::default().with_skip_unknown_constant_tags(true),
        )
        .parse_constant_pool()
        .unwrap();

        assert!(constant_pool.get(1).is_err());
        assert_eq!(constant_pool.get(2).unwrap(), &CpInfo::Integer(1));
    }
}
