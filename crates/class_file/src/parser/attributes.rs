use std::io::{Read, Seek};

use super::Parser;
use crate::{
    access_flags::{InnerClassAccessFlags, ModuleFlags, ParameterAccessFlags},
    attributes::{
        AttributeInfo, AttributeOwner, AttributeType, BootstrapMethod, CodeAttribute,
        EnclosingMethod, ExceptionTableEntry, Exports, InnerClass, LineNumber, LocalVariable,
        LocalVariableType, MethodParameter, ModuleAttribute, Opens, Provides, RecordComponent,
        Requires, StackMapFrame, VerificationType,
    },
    ClassFileError, ConstantPool, Result,
};

impl<R: Read + Seek> Parser<R> {
    pub(super) fn parse_attribute_body(
        &mut self,
        attribute_type: AttributeType,
        constant_pool: &ConstantPool,
    ) -> Result<AttributeInfo> {
        let info = match attribute_type {
            AttributeType::ConstantValue => AttributeInfo::ConstantValue {
                constant_value_index: self.read_u16()?,
            },
            AttributeType::Code => AttributeInfo::Code(self.parse_code_attribute(constant_pool)?),
            AttributeType::StackMapTable => {
                let number_of_entries = self.read_u16()?;
                AttributeInfo::StackMapTable(
                    (0..number_of_entries)
                        .map(|_| self.record(Self::parse_stack_map_frame))
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::Exceptions => AttributeInfo::Exceptions(self.read_u16_table()?),
            AttributeType::InnerClasses => {
                let number_of_classes = self.read_u16()?;
                AttributeInfo::InnerClasses(
                    (0..number_of_classes)
                        .map(|_| self.parse_inner_class())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::EnclosingMethod => AttributeInfo::EnclosingMethod(EnclosingMethod {
                class_index: self.read_u16()?,
                method_index: self.read_u16()?,
            }),
            AttributeType::Synthetic => AttributeInfo::Synthetic,
            AttributeType::Signature => AttributeInfo::Signature {
                signature_index: self.read_u16()?,
            },
            AttributeType::SourceFile => AttributeInfo::SourceFile {
                sourcefile_index: self.read_u16()?,
            },
            AttributeType::SourceDebugExtension => {
                AttributeInfo::SourceDebugExtension(self.read_remaining()?)
            }
            AttributeType::LineNumberTable => {
                let line_number_table_length = self.read_u16()?;
                AttributeInfo::LineNumberTable(
                    (0..line_number_table_length)
                        .map(|_| self.parse_line_number())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::LocalVariableTable => {
                let local_variable_table_length = self.read_u16()?;
                AttributeInfo::LocalVariableTable(
                    (0..local_variable_table_length)
                        .map(|_| self.parse_local_variable())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::LocalVariableTypeTable => {
                let local_variable_type_table_length = self.read_u16()?;
                AttributeInfo::LocalVariableTypeTable(
                    (0..local_variable_type_table_length)
                        .map(|_| self.parse_local_variable_type())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::Deprecated => AttributeInfo::Deprecated,
            AttributeType::RuntimeVisibleAnnotations => {
                AttributeInfo::RuntimeVisibleAnnotations(self.parse_annotations()?)
            }
            AttributeType::RuntimeInvisibleAnnotations => {
                AttributeInfo::RuntimeInvisibleAnnotations(self.parse_annotations()?)
            }
            AttributeType::RuntimeVisibleParameterAnnotations => {
                AttributeInfo::RuntimeVisibleParameterAnnotations(
                    self.parse_parameter_annotations()?,
                )
            }
            AttributeType::RuntimeInvisibleParameterAnnotations => {
                AttributeInfo::RuntimeInvisibleParameterAnnotations(
                    self.parse_parameter_annotations()?,
                )
            }
            AttributeType::RuntimeVisibleTypeAnnotations => {
                AttributeInfo::RuntimeVisibleTypeAnnotations(self.parse_type_annotations()?)
            }
            AttributeType::RuntimeInvisibleTypeAnnotations => {
                AttributeInfo::RuntimeInvisibleTypeAnnotations(self.parse_type_annotations()?)
            }
            AttributeType::AnnotationDefault => {
                AttributeInfo::AnnotationDefault(self.parse_element_value()?)
            }
            AttributeType::BootstrapMethods => {
                let num_bootstrap_methods = self.read_u16()?;
                AttributeInfo::BootstrapMethods(
                    (0..num_bootstrap_methods)
                        .map(|_| self.parse_bootstrap_method())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::MethodParameters => {
                let parameters_count = self.read_u8()?;
                AttributeInfo::MethodParameters(
                    (0..parameters_count)
                        .map(|_| self.parse_method_parameter())
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::Module => AttributeInfo::Module(self.parse_module_attribute()?),
            AttributeType::ModulePackages => {
                AttributeInfo::ModulePackages(self.read_u16_table()?)
            }
            AttributeType::ModuleMainClass => AttributeInfo::ModuleMainClass {
                main_class_index: self.read_u16()?,
            },
            AttributeType::NestHost => AttributeInfo::NestHost {
                host_class_index: self.read_u16()?,
            },
            AttributeType::NestMembers => AttributeInfo::NestMembers(self.read_u16_table()?),
            AttributeType::Record => {
                let components_count = self.read_u16()?;
                AttributeInfo::Record(
                    (0..components_count)
                        .map(|_| self.record(|p| p.parse_record_component(constant_pool)))
                        .collect::<Result<_>>()?,
                )
            }
            AttributeType::PermittedSubclasses => {
                AttributeInfo::PermittedSubclasses(self.read_u16_table()?)
            }
        };

        Ok(info)
    }

    fn parse_code_attribute(&mut self, constant_pool: &ConstantPool) -> Result<CodeAttribute> {
        let max_stack = self.read_u16()?;
        let max_locals = self.read_u16()?;
        let code_length = self.read_u32()?;
        let code = self.read_bytes(code_length as u64)?;
        let exception_table_length = self.read_u16()?;
        let exception_table = (0..exception_table_length)
            .map(|_| self.parse_exception_table_entry())
            .collect::<Result<Vec<_>>>()?;
        let attributes = self.parse_attributes(constant_pool, AttributeOwner::Code)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn parse_exception_table_entry(&mut self) -> Result<ExceptionTableEntry> {
        let start_pc = self.read_u16()?;
        let end_pc = self.read_u16()?;
        let handler_pc = self.read_u16()?;
        let catch_type = self.read_u16()?;

        Ok(ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }

    fn parse_stack_map_frame(&mut self) -> Result<StackMapFrame> {
        let frame_type = self.read_u8()?;
        let frame = match frame_type {
            0..=63 => StackMapFrame::Same { frame_type },
            64..=127 => StackMapFrame::SameLocals1StackItem {
                frame_type,
                stack: self.parse_verification_type()?,
            },
            247 => StackMapFrame::SameLocals1StackItemExtended {
                offset_delta: self.read_u16()?,
                stack: self.parse_verification_type()?,
            },
            248..=250 => StackMapFrame::Chop {
                frame_type,
                offset_delta: self.read_u16()?,
            },
            251 => StackMapFrame::SameExtended {
                offset_delta: self.read_u16()?,
            },
            252..=254 => {
                let offset_delta = self.read_u16()?;
                let locals = (0..frame_type - 251)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<_>>()?;
                StackMapFrame::Append {
                    frame_type,
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = self.read_u16()?;
                let number_of_locals = self.read_u16()?;
                let locals = (0..number_of_locals)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<_>>()?;
                let number_of_stack_items = self.read_u16()?;
                let stack = (0..number_of_stack_items)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<_>>()?;
                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
            _ => return Err(ClassFileError::InvalidStackMapFrameType(frame_type)),
        };

        Ok(frame)
    }

    fn parse_verification_type(&mut self) -> Result<VerificationType> {
        let tag = self.read_u8()?;
        let verification_type = match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object {
                cpool_index: self.read_u16()?,
            },
            8 => VerificationType::Uninitialized {
                offset: self.read_u16()?,
            },
            _ => return Err(ClassFileError::InvalidVerificationTypeTag(tag)),
        };

        Ok(verification_type)
    }

    fn parse_inner_class(&mut self) -> Result<InnerClass> {
        let inner_class_info_index = self.read_u16()?;
        let outer_class_info_index = self.read_u16()?;
        let inner_name_index = self.read_u16()?;
        let inner_class_access_flags = InnerClassAccessFlags::from_bits_truncate(self.read_u16()?);

        Ok(InnerClass {
            inner_class_info_index,
            outer_class_info_index,
            inner_name_index,
            inner_class_access_flags,
        })
    }

    fn parse_line_number(&mut self) -> Result<LineNumber> {
        let start_pc = self.read_u16()?;
        let line_number = self.read_u16()?;

        Ok(LineNumber {
            start_pc,
            line_number,
        })
    }

    fn parse_local_variable(&mut self) -> Result<LocalVariable> {
        let start_pc = self.read_u16()?;
        let length = self.read_u16()?;
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let index = self.read_u16()?;

        Ok(LocalVariable {
            start_pc,
            length,
            name_index,
            descriptor_index,
            index,
        })
    }

    fn parse_local_variable_type(&mut self) -> Result<LocalVariableType> {
        let start_pc = self.read_u16()?;
        let length = self.read_u16()?;
        let name_index = self.read_u16()?;
        let signature_index = self.read_u16()?;
        let index = self.read_u16()?;

        Ok(LocalVariableType {
            start_pc,
            length,
            name_index,
            signature_index,
            index,
        })
    }

    fn parse_bootstrap_method(&mut self) -> Result<BootstrapMethod> {
        let bootstrap_method_ref = self.read_u16()?;
        let bootstrap_arguments = self.read_u16_table()?;

        Ok(BootstrapMethod {
            bootstrap_method_ref,
            bootstrap_arguments,
        })
    }

    fn parse_method_parameter(&mut self) -> Result<MethodParameter> {
        let name_index = self.read_u16()?;
        let access_flags = ParameterAccessFlags::from_bits_truncate(self.read_u16()?);

        Ok(MethodParameter {
            name_index,
            access_flags,
        })
    }

    fn parse_module_attribute(&mut self) -> Result<ModuleAttribute> {
        let module_name_index = self.read_u16()?;
        let module_flags = ModuleFlags::from_bits_truncate(self.read_u16()?);
        let module_version_index = self.read_u16()?;

        let requires_count = self.read_u16()?;
        let requires = (0..requires_count)
            .map(|_| -> Result<Requires> {
                Ok(Requires {
                    requires_index: self.read_u16()?,
                    requires_flags: ModuleFlags::from_bits_truncate(self.read_u16()?),
                    requires_version_index: self.read_u16()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exports_count = self.read_u16()?;
        let exports = (0..exports_count)
            .map(|_| -> Result<Exports> {
                Ok(Exports {
                    exports_index: self.read_u16()?,
                    exports_flags: ModuleFlags::from_bits_truncate(self.read_u16()?),
                    exports_to_index: self.read_u16_table()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let opens_count = self.read_u16()?;
        let opens = (0..opens_count)
            .map(|_| -> Result<Opens> {
                Ok(Opens {
                    opens_index: self.read_u16()?,
                    opens_flags: ModuleFlags::from_bits_truncate(self.read_u16()?),
                    opens_to_index: self.read_u16_table()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let uses_index = self.read_u16_table()?;

        let provides_count = self.read_u16()?;
        let provides = (0..provides_count)
            .map(|_| -> Result<Provides> {
                Ok(Provides {
                    provides_index: self.read_u16()?,
                    provides_with_index: self.read_u16_table()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ModuleAttribute {
            module_name_index,
            module_flags,
            module_version_index,
            requires,
            exports,
            opens,
            uses_index,
            provides,
        })
    }

    fn parse_record_component(&mut self, constant_pool: &ConstantPool) -> Result<RecordComponent> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool, AttributeOwner::RecordComponent)?;

        Ok(RecordComponent {
            name_index,
            descriptor_index,
            attributes,
        })
    }
}

#[cfg(test)]
mod parse_attribute_body_tests {
    use std::io::Cursor;

    use super::*;
    use crate::constant_pool::CpInfo;

    fn parse(attribute_type: AttributeType, bytes: &[u8]) -> Result<AttributeInfo> {
        let constant_pool = ConstantPool::new(vec![
            CpInfo::Utf8("LineNumberTable".into()),
            CpInfo::Utf8("Vendor".into()),
        ]);
        Parser::new(Cursor::new(bytes)).parse_attribute_body(attribute_type, &constant_pool)
    }

    #[test]
    fn it_should_be_able_to_parse_a_code_attribute() {
        let info = parse(
            AttributeType::Code,
            &[
                0x00, 0x02, // max_stack
                0x00, 0x01, // max_locals
                0, 0, 0, 2, 0x2a, 0xb0, // aload_0 areturn
                0x00, 0x01, 0, 0, 0, 2, 0, 2, 0, 0, // catch-all handler
                0x00, 0x02, // two attributes
                0x00, 0x01, 0, 0, 0, 6, 0x00, 0x01, 0, 0, 0, 7, // line 7
                0x00, 0x02, 0, 0, 0, 0, // vendor attribute
            ],
        )
        .unwrap();

        let AttributeInfo::Code(code) = info else {
            panic!("not a code attribute");
        };
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.code, vec![0x2a, 0xb0]);
        assert_eq!(code.exception_table[0].handler_pc, 2);
        assert_eq!(code.line_number_for(1), Some(7));
        assert_eq!(code.attributes.0[1].info, AttributeInfo::Custom(vec![]));
    }

    #[test]
    fn it_should_be_able_to_parse_stack_map_frames() {
        let info = parse(
            AttributeType::StackMapTable,
            &[
                0x00, 0x04, // four frames
                0x05, // same
                0x41, 0x01, // same_locals_1_stack_item, int
                0xfc, 0x00, 0x10, 0x07, 0x00, 0x02, // append, object #2
                0xff, 0x00, 0x03, 0x00, 0x01, 0x00, 0x00, 0x01, 0x08, 0x00, 0x04, // full
            ],
        )
        .unwrap();

        assert_eq!(
            info,
            AttributeInfo::StackMapTable(vec![
                StackMapFrame::Same { frame_type: 5 },
                StackMapFrame::SameLocals1StackItem {
                    frame_type: 0x41,
                    stack: VerificationType::Integer
                },
                StackMapFrame::Append {
                    frame_type: 0xfc,
                    offset_delta: 16,
                    locals: vec![VerificationType::Object { cpool_index: 2 }]
                },
                StackMapFrame::Full {
                    offset_delta: 3,
                    locals: vec![VerificationType::Top],
                    stack: vec![VerificationType::Uninitialized { offset: 4 }]
                },
            ])
        );
    }

    #[test]
    fn it_should_fail_on_reserved_frame_types() {
        let err = parse(AttributeType::StackMapTable, &[0x00, 0x01, 0x80]).unwrap_err();

        assert_eq!(err.offset(), Some(2));
        assert!(matches!(
            err.cause(),
            ClassFileError::InvalidStackMapFrameType(128)
        ));
    }

    #[test]
    fn it_should_fail_on_unknown_verification_types() {
        assert!(matches!(
            parse(AttributeType::StackMapTable, &[0x00, 0x01, 0x40, 0x09])
                .unwrap_err()
                .cause(),
            ClassFileError::InvalidVerificationTypeTag(9)
        ));
    }

    #[test]
    fn it_should_be_able_to_parse_inner_classes() {
        let info = parse(
            AttributeType::InnerClasses,
            &[0x00, 0x01, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00, 0x00, 0x08],
        )
        .unwrap();

        let AttributeInfo::InnerClasses(inner_classes) = info else {
            panic!("not an InnerClasses attribute");
        };
        assert!(inner_classes[0].is_member_class());
        assert!(inner_classes[0].is_anonymous_class());
        assert_eq!(
            inner_classes[0].inner_class_access_flags,
            InnerClassAccessFlags::STATIC
        );
    }

    #[test]
    fn it_should_be_able_to_parse_a_module() {
        let info = parse(
            AttributeType::Module,
            &[
                0x00, 0x01, 0x00, 0x20, 0x00, 0x00, // open module #1
                0x00, 0x01, 0x00, 0x02, 0x80, 0x00, 0x00, 0x00, // requires #2 mandated
                0x00, 0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x04, // exports #3 to #4
                0x00, 0x00, // opens
                0x00, 0x01, 0x00, 0x05, // uses #5
                0x00, 0x01, 0x00, 0x06, 0x00, 0x01, 0x00, 0x07, // provides #6 with #7
            ],
        )
        .unwrap();

        let AttributeInfo::Module(module) = info else {
            panic!("not a Module attribute");
        };
        assert!(module.is_open());
        assert_eq!(module.requires[0].requires_flags, ModuleFlags::MANDATED);
        assert_eq!(module.exports[0].exports_to_index, vec![4]);
        assert!(module.opens.is_empty());
        assert_eq!(module.uses_index, vec![5]);
        assert_eq!(module.provides[0].provides_with_index, vec![7]);
    }

    #[test]
    fn it_should_be_able_to_parse_record_components() {
        let info = parse(
            AttributeType::Record,
            &[0x00, 0x01, 0x00, 0x03, 0x00, 0x04, 0x00, 0x00],
        )
        .unwrap();

        assert_eq!(
            info,
            AttributeInfo::Record(vec![RecordComponent {
                name_index: 3,
                descriptor_index: 4,
                attributes: Default::default(),
            }])
        );
    }

    #[test]
    fn it_should_keep_the_source_debug_extension_verbatim() {
        assert_eq!(
            parse(AttributeType::SourceDebugExtension, b"SMAP").unwrap(),
            AttributeInfo::SourceDebugExtension(b"SMAP".to_vec())
        );
    }
}
