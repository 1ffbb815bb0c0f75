use std::io::{Read, Seek};

use super::Parser;
use crate::{
    attributes::{
        Annotation, ElementValue, ElementValuePair, LocalVarTargetEntry, TargetInfo,
        TypeAnnotation, TypePathEntry,
    },
    ClassFileError, Result,
};

impl<R: Read + Seek> Parser<R> {
    pub(super) fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let num_annotations = self.read_u16()?;
        (0..num_annotations)
            .map(|_| self.record(Self::parse_annotation))
            .collect()
    }

    pub(super) fn parse_parameter_annotations(&mut self) -> Result<Vec<Vec<Annotation>>> {
        let num_parameters = self.read_u8()?;
        (0..num_parameters)
            .map(|_| self.parse_annotations())
            .collect()
    }

    pub(super) fn parse_type_annotations(&mut self) -> Result<Vec<TypeAnnotation>> {
        let num_annotations = self.read_u16()?;
        (0..num_annotations)
            .map(|_| self.record(Self::parse_type_annotation))
            .collect()
    }

    fn parse_annotation(&mut self) -> Result<Annotation> {
        let type_index = self.read_u16()?;
        let element_value_pairs = self.parse_element_value_pairs()?;

        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }

    fn parse_element_value_pairs(&mut self) -> Result<Vec<ElementValuePair>> {
        let num_element_value_pairs = self.read_u16()?;
        (0..num_element_value_pairs)
            .map(|_| -> Result<ElementValuePair> {
                let element_name_index = self.read_u16()?;
                let value = self.parse_element_value()?;
                Ok(ElementValuePair {
                    element_name_index,
                    value,
                })
            })
            .collect()
    }

    pub(super) fn parse_element_value(&mut self) -> Result<ElementValue> {
        let tag = self.read_u8()? as char;
        let element_value = match tag {
            'B' => ElementValue::Byte(self.read_u16()?),
            'C' => ElementValue::Char(self.read_u16()?),
            'D' => ElementValue::Double(self.read_u16()?),
            'F' => ElementValue::Float(self.read_u16()?),
            'I' => ElementValue::Int(self.read_u16()?),
            'J' => ElementValue::Long(self.read_u16()?),
            'S' => ElementValue::Short(self.read_u16()?),
            'Z' => ElementValue::Boolean(self.read_u16()?),
            's' => ElementValue::String(self.read_u16()?),
            'e' => ElementValue::Enum {
                type_name_index: self.read_u16()?,
                const_name_index: self.read_u16()?,
            },
            'c' => ElementValue::Class {
                class_info_index: self.read_u16()?,
            },
            '@' => ElementValue::Annotation(self.parse_annotation()?),
            '[' => {
                let num_values = self.read_u16()?;
                ElementValue::Array(
                    (0..num_values)
                        .map(|_| self.parse_element_value())
                        .collect::<Result<_>>()?,
                )
            }
            _ => return Err(ClassFileError::InvalidElementValueTag(tag)),
        };

        Ok(element_value)
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation> {
        let target_type = self.read_u8()?;
        let target_info = self.parse_target_info(target_type)?;
        let path_length = self.read_u8()?;
        let target_path = (0..path_length)
            .map(|_| -> Result<TypePathEntry> {
                Ok(TypePathEntry {
                    type_path_kind: self.read_u8()?,
                    type_argument_index: self.read_u8()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let type_index = self.read_u16()?;
        let element_value_pairs = self.parse_element_value_pairs()?;

        Ok(TypeAnnotation {
            target_type,
            target_info,
            target_path,
            type_index,
            element_value_pairs,
        })
    }

    // Table 4.7.20-A and Table 4.7.20-B
    fn parse_target_info(&mut self, target_type: u8) -> Result<TargetInfo> {
        let target_info = match target_type {
            0x00 | 0x01 => TargetInfo::TypeParameter {
                type_parameter_index: self.read_u8()?,
            },
            0x10 => TargetInfo::Supertype {
                supertype_index: self.read_u16()?,
            },
            0x11 | 0x12 => TargetInfo::TypeParameterBound {
                type_parameter_index: self.read_u8()?,
                bound_index: self.read_u8()?,
            },
            0x13..=0x15 => TargetInfo::Empty,
            0x16 => TargetInfo::FormalParameter {
                formal_parameter_index: self.read_u8()?,
            },
            0x17 => TargetInfo::Throws {
                throws_type_index: self.read_u16()?,
            },
            0x40 | 0x41 => {
                let table_length = self.read_u16()?;
                TargetInfo::LocalVar(
                    (0..table_length)
                        .map(|_| -> Result<LocalVarTargetEntry> {
                            Ok(LocalVarTargetEntry {
                                start_pc: self.read_u16()?,
                                length: self.read_u16()?,
                                index: self.read_u16()?,
                            })
                        })
                        .collect::<Result<_>>()?,
                )
            }
            0x42 => TargetInfo::Catch {
                exception_table_index: self.read_u16()?,
            },
            0x43..=0x46 => TargetInfo::Offset {
                offset: self.read_u16()?,
            },
            0x47..=0x4b => TargetInfo::TypeArgument {
                offset: self.read_u16()?,
                type_argument_index: self.read_u8()?,
            },
            _ => return Err(ClassFileError::InvalidTargetType(target_type)),
        };

        Ok(target_info)
    }
}
