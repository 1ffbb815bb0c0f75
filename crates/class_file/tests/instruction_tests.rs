mod common;

use std::collections::HashSet;

use classlens_class_file::{opcodes::*, ClassFile, Constant, CpInfo, Instruction, MemberRef};
use common::{u16s, ClassBuilder};

fn with_method(bytes: &[u8], signature: &str, f: impl FnOnce(&ClassFile, Vec<Instruction>)) {
    let _ = pretty_env_logger::try_init();
    let class_file = ClassFile::from_bytes(bytes).unwrap();
    let method = class_file.method(signature).unwrap().unwrap();
    f(&class_file, method.instructions().unwrap().collect());
}

// System.out.println("hello"), built with `padding` extra constant pool
// entries in front so indices differ between builds.
fn hello(padding: usize) -> Vec<u8> {
    let mut b = ClassBuilder::with_padding("my/Hello", Some("java/lang/Object"), padding);
    let [out_hi, out_lo] = b
        .field_ref("java/lang/System", "out", "Ljava/io/PrintStream;")
        .to_be_bytes();
    let hello = b.string("hello") as u8;
    let [println_hi, println_lo] = b
        .method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V")
        .to_be_bytes();

    let code = b.code(
        2,
        1,
        &[
            GETSTATIC, out_hi, out_lo, LDC, hello, INVOKEVIRTUAL, println_hi, println_lo, RETURN,
        ],
        &[],
        vec![],
    );
    b.method(0x0009, "main", "([Ljava/lang/String;)V", vec![code]);
    b.build()
}

#[test]
fn test_ldc_resolves_the_referenced_entry() {
    with_method(&hello(0), "main(java.lang.String[])", |class_file, instructions| {
        let ldc = &instructions[1];
        assert_eq!("ldc", ldc.mnemonic());
        assert_eq!(2, ldc.length());

        let index = ldc.index().unwrap();
        assert!(matches!(
            ldc.indexed_constant_pool_entry().unwrap(),
            Some(CpInfo::String(_))
        ));
        assert_eq!(
            Constant::String("hello"),
            class_file.constant_pool.resolve(index).unwrap()
        );
        assert_eq!(
            Some(Constant::String("hello")),
            ldc.indexed_constant().unwrap()
        );
    });
}

#[test]
fn test_member_references() {
    with_method(&hello(0), "main(java.lang.String[])", |_, instructions| {
        assert_eq!(
            Some(Constant::FieldRef(MemberRef {
                class: "java/lang/System",
                name: "out",
                descriptor: "Ljava/io/PrintStream;"
            })),
            instructions[0].indexed_constant().unwrap()
        );
        assert_eq!(
            "java/io/PrintStream.println:(Ljava/lang/String;)V",
            instructions[2].indexed_constant().unwrap().unwrap().to_string()
        );
        assert_eq!(None, instructions[3].indexed_constant().unwrap());
    });
}

#[test]
fn test_equality_across_renumbered_constant_pools() {
    let original = ClassFile::from_bytes(&hello(0)).unwrap();
    let renumbered = ClassFile::from_bytes(&hello(5)).unwrap();
    let instructions = |class_file: &ClassFile| {
        let code = class_file.methods[0].attributes.code().unwrap();
        (code.clone(), class_file.constant_pool.clone())
    };
    let (code_a, pool_a) = instructions(&original);
    let (code_b, pool_b) = instructions(&renumbered);

    assert_ne!(code_a.code, code_b.code);

    let a = code_a.instructions(&pool_a).collect::<Vec<_>>();
    let b = code_b.instructions(&pool_b).collect::<Vec<_>>();
    assert_eq!(a, b);

    let mut set = a.iter().copied().collect::<HashSet<_>>();
    set.extend(b.iter().copied());
    assert_eq!(a.len(), set.len());
}

#[test]
fn test_instructions_differ_by_referent() {
    let mut b = ClassBuilder::new("my/Streams", Some("java/lang/Object"));
    let [out_hi, out_lo] = b
        .field_ref("java/lang/System", "out", "Ljava/io/PrintStream;")
        .to_be_bytes();
    let [err_hi, err_lo] = b
        .field_ref("java/lang/System", "err", "Ljava/io/PrintStream;")
        .to_be_bytes();
    let code = b.code(
        2,
        0,
        &[GETSTATIC, out_hi, out_lo, GETSTATIC, err_hi, err_lo, GETSTATIC, out_hi, out_lo, RETURN],
        &[],
        vec![],
    );
    b.method(0x0008, "streams", "()V", vec![code]);

    with_method(&b.build(), "streams()", |_, instructions| {
        assert_ne!(instructions[0], instructions[1]);
        assert_eq!(instructions[0], instructions[2]);
        assert_ne!(instructions[0], instructions[3]);
    });
}

#[test]
fn test_tableswitch_length() {
    let mut code = vec![NOP; 11];
    code.push(TABLESWITCH);
    code.extend(u16s(&[0, 26, 0, 0, 0, 2]));
    code.extend(u16s(&[0, 25, 0, 25, 0, 25]));
    code.push(RETURN);

    let mut b = ClassBuilder::new("my/Switch", Some("java/lang/Object"));
    let code = b.code(1, 1, &code, &[], vec![]);
    b.method(0x0008, "choose", "()V", vec![code]);

    with_method(&b.build(), "choose()", |_, instructions| {
        assert_eq!(13, instructions.len());

        let switch = &instructions[11];
        assert_eq!(11, switch.start());
        assert_eq!(1 + 12 + 12, switch.length());
        assert_eq!(Some(26), switch.default_offset());
        assert_eq!(vec![25, 25, 25], switch.jump_offsets());
        assert_eq!(36, instructions[12].start());
    });
}

#[test]
fn test_lookupswitch_and_wide() {
    let mut code = vec![WIDE, IINC, 0x01, 0x00, 0x00, 0x05];
    code.extend([LOOKUPSWITCH, 0]);
    code.extend(u16s(&[0, 40, 0, 2, 0, 1, 0, 30, 0, 7, 0, 35]));
    code.push(RETURN);

    let mut b = ClassBuilder::new("my/Switch", Some("java/lang/Object"));
    let code = b.code(1, 300, &code, &[], vec![]);
    b.method(0x0008, "lookup", "()V", vec![code]);

    with_method(&b.build(), "lookup()", |_, instructions| {
        assert_eq!(3, instructions.len());

        assert_eq!("wide iinc", instructions[0].mnemonic());
        assert_eq!(6, instructions[0].length());
        assert_eq!(Some(256), instructions[0].index());
        assert_eq!(5, instructions[0].value());

        let switch = &instructions[1];
        assert_eq!(6, switch.start());
        assert_eq!(1 + 1 + 8 + 16, switch.length());
        assert_eq!(Some(40), switch.default_offset());
        assert_eq!(vec![(1, 30), (7, 35)], switch.match_offsets());
        assert_eq!(None, switch.low());
    });
}

#[test]
fn test_local_variables_and_line_numbers() {
    let mut b = ClassBuilder::new("my/Locals", Some("java/lang/Object"));
    let a = b.utf8("a");
    let second = b.utf8("b");
    let int = b.utf8("I");
    let exception = b.class("java/lang/Exception");

    let local_variables = b.u16_attribute(
        "LocalVariableTable",
        &[2, 2, 2, a, int, 1, 6, 2, second, int, 1],
    );
    let line_numbers = b.u16_attribute("LineNumberTable", &[2, 0, 10, 4, 11]);
    let code = b.code(
        1,
        2,
        &[ICONST_0, ISTORE_1, ILOAD_1, POP, ICONST_1, ISTORE_1, ILOAD_1, POP, RETURN],
        &[[0, 4, 8, exception], [0, 8, 8, 0]],
        vec![local_variables, line_numbers],
    );
    b.method(0x0008, "locals", "()V", vec![code]);
    let bytes = b.build();

    with_method(&bytes, "locals()", |class_file, instructions| {
        let constant_pool = &class_file.constant_pool;
        let names = instructions
            .iter()
            .map(|i| {
                i.indexed_local_variable()
                    .map(|lv| lv.name(constant_pool).unwrap())
            })
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                None,
                Some("a"),
                Some("a"),
                None,
                None,
                Some("b"),
                Some("b"),
                None,
                None
            ],
            names
        );

        let code = instructions[0].code();
        assert_eq!(Some(10), code.line_number_for(0));
        assert_eq!(Some(11), code.line_number_for(5));
        assert_eq!(
            Some("java/lang/Exception"),
            code.exception_table[0]
                .catch_type_name(constant_pool)
                .unwrap()
        );
        assert_eq!(None, code.exception_table[1].catch_type_name(constant_pool).unwrap());
    });
}

#[test]
fn test_instruction_stream_stops_at_truncated_instruction() {
    let mut b = ClassBuilder::new("my/Broken", Some("java/lang/Object"));
    let code = b.code(1, 0, &[NOP, GOTO_W, 0x00], &[], vec![]);
    b.method(0x0008, "broken", "()V", vec![code]);

    with_method(&b.build(), "broken()", |_, instructions| {
        assert_eq!(vec!["nop"], instructions.iter().map(|i| i.to_string()).collect::<Vec<_>>());
    });
}
