// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.4

#[derive(Debug, Clone, PartialEq)]
pub enum StackMapFrame {
    /// frame_type 0-63
    Same { frame_type: u8 },
    /// frame_type 64-127
    SameLocals1StackItem {
        frame_type: u8,
        stack: VerificationType,
    },
    /// frame_type 247
    SameLocals1StackItemExtended {
        offset_delta: u16,
        stack: VerificationType,
    },
    /// frame_type 248-250
    Chop { frame_type: u8, offset_delta: u16 },
    /// frame_type 251
    SameExtended { offset_delta: u16 },
    /// frame_type 252-254
    Append {
        frame_type: u8,
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },
    /// frame_type 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}
impl StackMapFrame {
    pub const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
    pub const SAME_EXTENDED: u8 = 251;
    pub const FULL_FRAME: u8 = 255;

    pub fn frame_type(&self) -> u8 {
        match self {
            StackMapFrame::Same { frame_type }
            | StackMapFrame::SameLocals1StackItem { frame_type, .. }
            | StackMapFrame::Chop { frame_type, .. }
            | StackMapFrame::Append { frame_type, .. } => *frame_type,
            StackMapFrame::SameLocals1StackItemExtended { .. } => {
                Self::SAME_LOCALS_1_STACK_ITEM_EXTENDED
            }
            StackMapFrame::SameExtended { .. } => Self::SAME_EXTENDED,
            StackMapFrame::Full { .. } => Self::FULL_FRAME,
        }
    }

    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::Same { frame_type } => *frame_type as u16,
            StackMapFrame::SameLocals1StackItem { frame_type, .. } => *frame_type as u16 - 64,
            StackMapFrame::SameLocals1StackItemExtended { offset_delta, .. }
            | StackMapFrame::Chop { offset_delta, .. }
            | StackMapFrame::SameExtended { offset_delta }
            | StackMapFrame::Append { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object { cpool_index: u16 },
    Uninitialized { offset: u16 },
}
impl VerificationType {
    pub fn tag(&self) -> u8 {
        match self {
            VerificationType::Top => 0,
            VerificationType::Integer => 1,
            VerificationType::Float => 2,
            VerificationType::Double => 3,
            VerificationType::Long => 4,
            VerificationType::Null => 5,
            VerificationType::UninitializedThis => 6,
            VerificationType::Object { .. } => 7,
            VerificationType::Uninitialized { .. } => 8,
        }
    }
}

#[cfg(test)]
mod offset_delta_tests {
    use super::*;

    #[test]
    fn it_should_derive_the_delta_from_compact_frame_types() {
        assert_eq!(StackMapFrame::Same { frame_type: 12 }.offset_delta(), 12);
        assert_eq!(
            StackMapFrame::SameLocals1StackItem {
                frame_type: 70,
                stack: VerificationType::Integer
            }
            .offset_delta(),
            6
        );
    }

    #[test]
    fn it_should_report_the_fixed_frame_types() {
        assert_eq!(
            StackMapFrame::SameExtended { offset_delta: 300 }.frame_type(),
            251
        );
        assert_eq!(
            StackMapFrame::Full {
                offset_delta: 0,
                locals: vec![],
                stack: vec![]
            }
            .frame_type(),
            255
        );
    }
}
