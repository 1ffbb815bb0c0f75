use std::{env, fs::File};

use classlens_class_file::ClassFile;
use memmap::Mmap;

fn main() {
    pretty_env_logger::init();

    let path = env::args().nth(1).expect("usage: dump <path/to/Some.class>");
    let file = File::open(path).unwrap();
    let mmap = unsafe { Mmap::map(&file).unwrap() };

    let class_file = ClassFile::from_bytes(&mmap).unwrap();

    println!("{}", class_file.declaration().unwrap());
    println!(
        "  version {}.{}",
        class_file.major_version, class_file.minor_version
    );
    if let Some(source_file) = class_file.source_file().unwrap() {
        println!("  compiled from {}", source_file);
    }

    println!();
    println!("Constant pool:");
    for (index, cp_info) in class_file.constant_pool.entries() {
        match class_file.constant_pool.resolve(index) {
            Ok(constant) => println!("  #{:<5} {}", index, constant),
            Err(e) => {
                log::warn!("#{} does not resolve: {}", index, e);
                println!("  #{:<5} {:?}", index, cp_info);
            }
        }
    }

    println!();
    for field in class_file.fields() {
        println!("{};", field.declaration().unwrap());
    }

    for method in class_file.methods() {
        println!();
        println!("{};", method.declaration().unwrap());

        let Some(code) = method.code() else {
            continue;
        };
        for instruction in code.instructions(&class_file.constant_pool) {
            let line = code
                .line_number_for(instruction.start() as u16)
                .map(|line| format!("line {}", line))
                .unwrap_or_default();

            match instruction.indexed_constant() {
                Ok(Some(constant)) => println!(
                    "  {:5}: {:<16} {:<60} {}",
                    instruction.start(),
                    instruction.mnemonic(),
                    constant,
                    line
                ),
                _ => println!(
                    "  {:5}: {:<16} {:<60} {}",
                    instruction.start(),
                    instruction.mnemonic(),
                    instruction
                        .index()
                        .map(|index| index.to_string())
                        .unwrap_or_default(),
                    line
                ),
            }
        }
    }
}
