// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-6.html

use std::{
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
    iter::FusedIterator,
};

use byteorder::{BigEndian, ByteOrder};

use crate::{
    attributes::{CodeAttribute, LocalVariable},
    constant_pool::{Constant, ConstantPool, CpInfo},
    opcodes::{self, *},
    Result,
};

/// One decoded instruction of a code array.
///
/// Nothing is copied out of the code array. Every query looks at the opcode,
/// the bytes following it and the instruction's start offset. An
/// `Instruction` is only handed out when its whole encoding fits inside the
/// code array.
#[derive(Clone, Copy)]
pub struct Instruction<'a> {
    code: &'a CodeAttribute,
    constant_pool: &'a ConstantPool,
    start: usize,
    length: usize,
}

impl CodeAttribute {
    /// The instruction starting at `start`, `None` when it does not fit.
    pub fn instruction_at<'a>(
        &'a self,
        constant_pool: &'a ConstantPool,
        start: usize,
    ) -> Option<Instruction<'a>> {
        let length = encoded_length(&self.code, start)?;
        if start.checked_add(length)? > self.code.len() {
            return None;
        }

        Some(Instruction {
            code: self,
            constant_pool,
            start,
            length,
        })
    }

    pub fn instructions<'a>(&'a self, constant_pool: &'a ConstantPool) -> Instructions<'a> {
        Instructions {
            code: self,
            constant_pool,
            pc: 0,
        }
    }
}

fn encoded_length(code: &[u8], start: usize) -> Option<usize> {
    let opcode = *code.get(start)?;
    match opcode {
        TABLESWITCH => {
            let padding = switch_padding(start);
            let low = i32_at(code, start + padding + 5)? as i64;
            let high = i32_at(code, start + padding + 9)? as i64;
            let count = usize::try_from(high - low + 1).ok()?;
            count.checked_mul(4)?.checked_add(1 + padding + 12)
        }
        LOOKUPSWITCH => {
            let padding = switch_padding(start);
            let npairs = usize::try_from(i32_at(code, start + padding + 5)?).ok()?;
            npairs.checked_mul(8)?.checked_add(1 + padding + 8)
        }
        WIDE => match *code.get(start + 1)? {
            IINC => Some(6),
            _ => Some(4),
        },
        opcode => opcodes::fixed_length(opcode),
    }
}

// Switch operands start at the next multiple of four.
fn switch_padding(start: usize) -> usize {
    3 - start % 4
}

fn i32_at(code: &[u8], at: usize) -> Option<i32> {
    code.get(at..at.checked_add(4)?).map(BigEndian::read_i32)
}

impl<'a> Instruction<'a> {
    pub fn opcode(&self) -> u8 {
        self.code.code[self.start]
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The whole encoding, opcode included.
    pub fn bytes(&self) -> &'a [u8] {
        &self.code.code[self.start..self.start + self.length]
    }

    pub fn operands(&self) -> &'a [u8] {
        &self.bytes()[1..]
    }

    pub fn code(&self) -> &'a CodeAttribute {
        self.code
    }

    pub fn mnemonic(&self) -> Cow<'static, str> {
        match self.opcode() {
            WIDE => Cow::Owned(format!(
                "{} {}",
                opcodes::mnemonic(WIDE),
                opcodes::mnemonic(self.u8_at(1))
            )),
            opcode => Cow::Borrowed(opcodes::mnemonic(opcode)),
        }
    }

    /// The constant pool or local variable index operand.
    pub fn index(&self) -> Option<u16> {
        let opcode = self.opcode();
        let index = match opcode {
            LDC_W | LDC2_W | GETSTATIC | PUTSTATIC | GETFIELD | PUTFIELD | INVOKEVIRTUAL
            | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE | INVOKEDYNAMIC | NEW
            | ANEWARRAY | CHECKCAST | INSTANCEOF | MULTIANEWARRAY => self.u16_at(1),
            ILOAD_0..=ALOAD_3 => ((opcode - ILOAD_0) % 4) as u16,
            ISTORE_0..=ASTORE_3 => ((opcode - ISTORE_0) % 4) as u16,
            LDC | ILOAD..=ALOAD | ISTORE..=ASTORE | IINC | RET => self.u8_at(1) as u16,
            WIDE => self.u16_at(2),
            _ => return None,
        };
        Some(index)
    }

    /// The branch offset, relative to the start of this instruction.
    pub fn offset(&self) -> i32 {
        match self.opcode() {
            IFEQ..=JSR | IFNULL | IFNONNULL => self.u16_at(1) as i16 as i32,
            GOTO_W | JSR_W => self.i32_at(1),
            _ => 0,
        }
    }

    /// The immediate value pushed or added by the instruction.
    pub fn value(&self) -> i32 {
        let opcode = self.opcode();
        match opcode {
            ICONST_M1..=ICONST_5 => opcode as i32 - ICONST_0 as i32,
            LCONST_0..=LCONST_1 => (opcode - LCONST_0) as i32,
            FCONST_0..=FCONST_2 => (opcode - FCONST_0) as i32,
            DCONST_0..=DCONST_1 => (opcode - DCONST_0) as i32,
            BIPUSH => self.u8_at(1) as i8 as i32,
            SIPUSH => self.u16_at(1) as i16 as i32,
            IINC => self.u8_at(2) as i8 as i32,
            WIDE if self.u8_at(1) == IINC => self.u16_at(4) as i16 as i32,
            _ => 0,
        }
    }

    fn references_constant_pool(&self) -> bool {
        matches!(
            self.opcode(),
            LDC | LDC_W
                | LDC2_W
                | GETSTATIC
                | PUTSTATIC
                | GETFIELD
                | PUTFIELD
                | INVOKEVIRTUAL
                | INVOKESPECIAL
                | INVOKESTATIC
                | INVOKEINTERFACE
                | INVOKEDYNAMIC
                | NEW
                | ANEWARRAY
                | CHECKCAST
                | INSTANCEOF
                | MULTIANEWARRAY
        )
    }

    /// The constant pool entry the instruction operates on. `Ok(None)` for
    /// opcodes without a constant pool operand.
    pub fn indexed_constant_pool_entry(&self) -> Result<Option<&'a CpInfo>> {
        match self.index() {
            Some(index) if self.references_constant_pool() => {
                self.constant_pool.get(index).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Like [`Instruction::indexed_constant_pool_entry`], with the entry resolved.
    pub fn indexed_constant(&self) -> Result<Option<Constant<'a>>> {
        match self.index() {
            Some(index) if self.references_constant_pool() => {
                self.constant_pool.resolve(index).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// The `LocalVariableTable` entry for the slot this instruction loads,
    /// stores or increments.
    pub fn indexed_local_variable(&self) -> Option<&'a LocalVariable> {
        let after = self.start + self.length;
        let pc = match self.opcode() {
            ILOAD..=ALOAD | ILOAD_0..=ALOAD_3 | IINC | RET => self.start,
            // A stored variable only comes into scope after the store.
            ISTORE..=ASTORE | ISTORE_0..=ASTORE_3 => after,
            WIDE => match self.u8_at(1) {
                ISTORE..=ASTORE => after,
                _ => self.start,
            },
            _ => return None,
        };

        self.code.local_variable(self.index()?, pc as u32)
    }

    pub fn default_offset(&self) -> Option<i32> {
        match self.opcode() {
            TABLESWITCH | LOOKUPSWITCH => Some(self.i32_at(self.switch_operands())),
            _ => None,
        }
    }

    pub fn low(&self) -> Option<i32> {
        match self.opcode() {
            TABLESWITCH => Some(self.i32_at(self.switch_operands() + 4)),
            _ => None,
        }
    }

    pub fn high(&self) -> Option<i32> {
        match self.opcode() {
            TABLESWITCH => Some(self.i32_at(self.switch_operands() + 8)),
            _ => None,
        }
    }

    /// Jump offsets of a `tableswitch`, one per value in `low..=high`.
    pub fn jump_offsets(&self) -> Vec<i32> {
        if self.opcode() != TABLESWITCH {
            return vec![];
        }

        let first = self.switch_operands() + 12;
        (first..self.length)
            .step_by(4)
            .map(|at| self.i32_at(at))
            .collect()
    }

    /// `(match, offset)` pairs of a `lookupswitch`.
    pub fn match_offsets(&self) -> Vec<(i32, i32)> {
        if self.opcode() != LOOKUPSWITCH {
            return vec![];
        }

        let first = self.switch_operands() + 8;
        (first..self.length)
            .step_by(8)
            .map(|at| (self.i32_at(at), self.i32_at(at + 4)))
            .collect()
    }

    // Relative position of the default offset.
    fn switch_operands(&self) -> usize {
        1 + switch_padding(self.start)
    }

    fn u8_at(&self, at: usize) -> u8 {
        self.bytes().get(at).copied().unwrap_or_default()
    }

    fn u16_at(&self, at: usize) -> u16 {
        self.bytes()
            .get(at..at + 2)
            .map_or(0, BigEndian::read_u16)
    }

    fn i32_at(&self, at: usize) -> i32 {
        i32_at(self.bytes(), at).unwrap_or_default()
    }

    fn resolved_constant(&self) -> Option<Constant<'a>> {
        self.indexed_constant().ok().flatten()
    }
}

// Instructions referencing the constant pool compare what they reference, so
// the same bytecode compares equal across differently numbered pools.
impl PartialEq for Instruction<'_> {
    fn eq(&self, other: &Self) -> bool {
        if self.opcode() != other.opcode() {
            return false;
        }

        match (self.resolved_constant(), other.resolved_constant()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.operands() == other.operands(),
            _ => false,
        }
    }
}
impl Eq for Instruction<'_> {}
impl Hash for Instruction<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.opcode().hash(state);
        match self.resolved_constant() {
            Some(constant) => constant.hash(state),
            None => self.operands().hash(state),
        }
    }
}

impl fmt::Debug for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("start", &self.start)
            .field("mnemonic", &self.mnemonic())
            .field("operands", &self.operands())
            .finish()
    }
}
impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

/// Walks a code array from offset 0.
pub struct Instructions<'a> {
    code: &'a CodeAttribute,
    constant_pool: &'a ConstantPool,
    pc: usize,
}
impl<'a> Iterator for Instructions<'a> {
    type Item = Instruction<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let code_length = self.code.code.len();
        if self.pc >= code_length {
            return None;
        }

        match self.code.instruction_at(self.constant_pool, self.pc) {
            Some(instruction) => {
                log::trace!("{:5}: {}", self.pc, instruction);
                self.pc += instruction.length();
                Some(instruction)
            }
            None => {
                log::warn!(
                    "Instruction at {} does not fit in the {} byte code array",
                    self.pc,
                    code_length
                );
                self.pc = code_length;
                None
            }
        }
    }
}
impl FusedIterator for Instructions<'_> {}

#[cfg(test)]
mod instruction_tests {
    use super::*;
    use crate::{
        attributes::{Attribute, AttributeInfo, Attributes},
        constant_pool::{ClassInfo, NameAndTypeInfo, RefInfo, StringInfo},
    };

    fn code(bytes: &[u8]) -> CodeAttribute {
        CodeAttribute {
            max_stack: 4,
            max_locals: 4,
            code: bytes.to_vec(),
            exception_table: vec![],
            attributes: Attributes::default(),
        }
    }

    fn pool() -> ConstantPool {
        ConstantPool::new(vec![
            CpInfo::Utf8("java/io/PrintStream".into()),
            CpInfo::Class(ClassInfo { name_index: 1 }),
            CpInfo::Utf8("println".into()),
            CpInfo::Utf8("(Ljava/lang/String;)V".into()),
            CpInfo::NameAndType(NameAndTypeInfo {
                name_index: 3,
                descriptor_index: 4,
            }),
            CpInfo::MethodRef(RefInfo {
                class_index: 2,
                name_and_type_index: 5,
            }),
            CpInfo::Utf8("hello".into()),
            CpInfo::String(StringInfo { string_index: 7 }),
        ])
    }

    #[test]
    fn it_should_resolve_ldc_to_the_referenced_entry() {
        let constant_pool = pool();
        let code = code(&[LDC, 7]);
        let ldc = code.instruction_at(&constant_pool, 0).unwrap();

        assert_eq!(ldc.length(), 2);
        assert_eq!(ldc.index(), Some(7));
        assert_eq!(
            ldc.indexed_constant_pool_entry().unwrap(),
            Some(&CpInfo::Utf8("hello".into()))
        );
    }

    #[test]
    fn it_should_fail_to_resolve_dangling_indices() {
        let constant_pool = pool();
        let code = code(&[LDC_W, 0x00, 0x63]);
        let ldc_w = code.instruction_at(&constant_pool, 0).unwrap();

        assert!(ldc_w.indexed_constant_pool_entry().is_err());
    }

    #[test]
    fn it_should_not_resolve_entries_for_plain_opcodes() {
        let constant_pool = pool();
        let code = code(&[BIPUSH, 7]);
        let bipush = code.instruction_at(&constant_pool, 0).unwrap();

        assert_eq!(bipush.index(), None);
        assert_eq!(bipush.indexed_constant_pool_entry().unwrap(), None);
        assert_eq!(bipush.value(), 7);
    }

    #[test]
    fn it_should_compute_tableswitch_lengths_with_padding() {
        let mut bytes = vec![NOP; 11];
        bytes.push(TABLESWITCH);
        // no padding at offset 11
        bytes.extend_from_slice(&[0, 0, 0, 20, 0, 0, 0, 0, 0, 0, 0, 2]);
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        let constant_pool = pool();
        let code = code(&bytes);

        let switch = code.instruction_at(&constant_pool, 11).unwrap();
        assert_eq!(switch.length(), 1 + 12 + 12);
        assert_eq!(switch.default_offset(), Some(20));
        assert_eq!(switch.low(), Some(0));
        assert_eq!(switch.high(), Some(2));
        assert_eq!(switch.jump_offsets(), vec![1, 2, 3]);
    }

    #[test]
    fn it_should_pad_switches_at_aligned_offsets() {
        let mut bytes = vec![LOOKUPSWITCH, 0, 0, 0];
        bytes.extend_from_slice(&[0, 0, 0, 9, 0, 0, 0, 1, 0, 0, 0, 5, 0xff, 0xff, 0xff, 0xfc]);
        let constant_pool = pool();
        let code = code(&bytes);

        let switch = code.instruction_at(&constant_pool, 0).unwrap();
        assert_eq!(switch.length(), 1 + 3 + 8 + 8);
        assert_eq!(switch.default_offset(), Some(9));
        assert_eq!(switch.match_offsets(), vec![(5, -4)]);
    }

    #[test]
    fn it_should_reject_switches_that_do_not_fit() {
        let constant_pool = pool();
        let code = code(&[TABLESWITCH, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 9]);

        assert!(code.instruction_at(&constant_pool, 0).is_none());
    }

    #[test]
    fn it_should_decode_wide_forms() {
        let constant_pool = pool();
        let code = code(&[WIDE, ILOAD, 0x01, 0x00, WIDE, IINC, 0x00, 0x02, 0xff, 0x9c]);

        let instructions = code.instructions(&constant_pool).collect::<Vec<_>>();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].length(), 4);
        assert_eq!(instructions[0].index(), Some(256));
        assert_eq!(instructions[0].mnemonic(), "wide iload");
        assert_eq!(instructions[1].start(), 4);
        assert_eq!(instructions[1].length(), 6);
        assert_eq!(instructions[1].index(), Some(2));
        assert_eq!(instructions[1].value(), -100);
    }

    #[test]
    fn it_should_decode_implicit_indices_and_constants() {
        let constant_pool = pool();
        let code = code(&[ALOAD_3, ISTORE_2, ICONST_M1, DCONST_1, SIPUSH, 0xff, 0x38]);

        let instructions = code.instructions(&constant_pool).collect::<Vec<_>>();
        assert_eq!(instructions[0].index(), Some(3));
        assert_eq!(instructions[1].index(), Some(2));
        assert_eq!(instructions[2].value(), -1);
        assert_eq!(instructions[3].value(), 1);
        assert_eq!(instructions[4].value(), -200);
    }

    #[test]
    fn it_should_decode_branch_offsets() {
        let constant_pool = pool();
        let code = code(&[GOTO, 0xff, 0xfd, GOTO_W, 0x00, 0x01, 0x00, 0x00, IFNULL, 0x00, 0x05]);

        let offsets = code
            .instructions(&constant_pool)
            .map(|i| i.offset())
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![-3, 65536, 5]);
    }

    #[test]
    fn it_should_stop_at_truncated_instructions() {
        let constant_pool = pool();
        let code = code(&[NOP, SIPUSH, 0x01]);

        let mnemonics = code
            .instructions(&constant_pool)
            .map(|i| i.to_string())
            .collect::<Vec<_>>();
        assert_eq!(mnemonics, vec!["nop"]);
    }

    #[test]
    fn it_should_name_undefined_opcodes() {
        let constant_pool = pool();
        let code = code(&[0xcb]);

        assert_eq!(
            code.instruction_at(&constant_pool, 0).unwrap().mnemonic(),
            opcodes::UNDEFINED
        );
    }

    #[test]
    fn it_should_resolve_local_variables_by_range() {
        let constant_pool = pool();
        let mut code = code(&[ICONST_0, ISTORE_1, ILOAD_1, POP, ICONST_1, ISTORE_1, ILOAD_1, POP]);
        code.attributes = Attributes(vec![Attribute {
            attribute_name_index: 0,
            info: AttributeInfo::LocalVariableTable(vec![
                LocalVariable {
                    start_pc: 2,
                    length: 2,
                    name_index: 3,
                    descriptor_index: 4,
                    index: 1,
                },
                LocalVariable {
                    start_pc: 6,
                    length: 2,
                    name_index: 7,
                    descriptor_index: 4,
                    index: 1,
                },
            ]),
        }]);

        let names = code
            .instructions(&constant_pool)
            .map(|i| i.indexed_local_variable().map(|lv| lv.name_index))
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![None, Some(3), Some(3), None, None, Some(7), Some(7), None]
        );
    }

    #[test]
    fn it_should_compare_references_across_pools() {
        let renumbered = ConstantPool::new(vec![
            CpInfo::Utf8("(Ljava/lang/String;)V".into()),
            CpInfo::Utf8("println".into()),
            CpInfo::NameAndType(NameAndTypeInfo {
                name_index: 2,
                descriptor_index: 1,
            }),
            CpInfo::Utf8("java/io/PrintStream".into()),
            CpInfo::Class(ClassInfo { name_index: 4 }),
            CpInfo::MethodRef(RefInfo {
                class_index: 5,
                name_and_type_index: 3,
            }),
        ]);

        let original = pool();
        let invokevirtual = code(&[INVOKEVIRTUAL, 0x00, 0x06]);
        let invokestatic = code(&[INVOKESTATIC, 0x00, 0x06]);
        let name_and_type = code(&[INVOKEVIRTUAL, 0x00, 0x03]);

        let a = invokevirtual.instruction_at(&original, 0).unwrap();
        let b = invokevirtual.instruction_at(&renumbered, 0).unwrap();
        let c = invokestatic.instruction_at(&renumbered, 0).unwrap();
        let d = name_and_type.instruction_at(&renumbered, 0).unwrap();

        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(b, c);
        assert_ne!(a, d);

        use std::collections::hash_map::DefaultHasher;
        let hash = |i: &Instruction| {
            let mut hasher = DefaultHasher::new();
            i.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn it_should_compare_plain_instructions_by_bytes() {
        let constant_pool = pool();
        let code = code(&[BIPUSH, 5, BIPUSH, 5, BIPUSH, 6]);
        let instructions = code.instructions(&constant_pool).collect::<Vec<_>>();

        assert_eq!(instructions[0], instructions[1]);
        assert_ne!(instructions[1], instructions[2]);
    }
}
