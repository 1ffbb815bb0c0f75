#![allow(dead_code)]

use std::collections::HashMap;

use byteorder::{BigEndian, WriteBytesExt};

/// Assembles class files in memory, one constant pool entry at a time.
pub struct ClassBuilder {
    constant_pool: Vec<u8>,
    constant_pool_count: u16,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    pub access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_class: Option<&str>) -> Self {
        Self::with_padding(name, super_class, 0)
    }

    /// Starts the constant pool with `padding` unused entries, so the same
    /// class can be built with different constant pool indices.
    pub fn with_padding(name: &str, super_class: Option<&str>, padding: usize) -> Self {
        let mut builder = Self {
            constant_pool: Vec::new(),
            constant_pool_count: 1,
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            access_flags: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        for i in 0..padding {
            builder.utf8(&format!("padding{}", i));
        }
        builder.this_class = builder.class(name);
        if let Some(super_class) = super_class {
            builder.super_class = builder.class(super_class);
        }
        builder
    }

    fn entry(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.constant_pool_count;
        self.constant_pool.extend_from_slice(bytes);
        self.constant_pool_count += slots;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(index) = self.utf8s.get(value) {
            return *index;
        }

        let mut bytes = vec![1];
        bytes.write_u16::<BigEndian>(value.len() as u16).unwrap();
        bytes.extend_from_slice(value.as_bytes());
        let index = self.entry(&bytes, 1);
        self.utf8s.insert(value.to_owned(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }

        let name_index = self.utf8(name);
        let index = self.u16_entry(7, name_index);
        self.classes.insert(name.to_owned(), index);
        index
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let string_index = self.utf8(value);
        self.u16_entry(8, string_index)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.write_i32::<BigEndian>(value).unwrap();
        self.entry(&bytes, 1)
    }

    pub fn float(&mut self, value: f32) -> u16 {
        let mut bytes = vec![4];
        bytes.write_f32::<BigEndian>(value).unwrap();
        self.entry(&bytes, 1)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5];
        bytes.write_i64::<BigEndian>(value).unwrap();
        self.entry(&bytes, 2)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.u16_pair_entry(12, name_index, descriptor_index)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.u16_pair_entry(9, class_index, name_and_type_index)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        self.u16_pair_entry(10, class_index, name_and_type_index)
    }

    fn u16_entry(&mut self, tag: u8, value: u16) -> u16 {
        let mut bytes = vec![tag];
        bytes.write_u16::<BigEndian>(value).unwrap();
        self.entry(&bytes, 1)
    }

    fn u16_pair_entry(&mut self, tag: u8, first: u16, second: u16) -> u16 {
        let mut bytes = vec![tag];
        bytes.write_u16::<BigEndian>(first).unwrap();
        bytes.write_u16::<BigEndian>(second).unwrap();
        self.entry(&bytes, 1)
    }

    pub fn interface(&mut self, name: &str) -> &mut Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    /// An encoded attribute: name index, length and payload.
    pub fn attribute(&mut self, name: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(self.utf8(name)).unwrap();
        bytes.write_u32::<BigEndian>(payload.len() as u32).unwrap();
        bytes.extend_from_slice(payload);
        bytes
    }

    pub fn u16_attribute(&mut self, name: &str, values: &[u16]) -> Vec<u8> {
        self.attribute(name, &u16s(values))
    }

    pub fn code(
        &mut self,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
        exception_table: &[[u16; 4]],
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.write_u16::<BigEndian>(max_stack).unwrap();
        payload.write_u16::<BigEndian>(max_locals).unwrap();
        payload.write_u32::<BigEndian>(code.len() as u32).unwrap();
        payload.extend_from_slice(code);
        payload
            .write_u16::<BigEndian>(exception_table.len() as u16)
            .unwrap();
        for entry in exception_table {
            payload.extend(u16s(entry));
        }
        payload.extend(counted(attributes));
        self.attribute("Code", &payload)
    }

    pub fn field(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> &mut Self {
        let feature = self.feature(access_flags, name, descriptor, attributes);
        self.fields.push(feature);
        self
    }

    pub fn method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> &mut Self {
        let feature = self.feature(access_flags, name, descriptor, attributes);
        self.methods.push(feature);
        self
    }

    fn feature(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: Vec<Vec<u8>>,
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u16::<BigEndian>(access_flags).unwrap();
        bytes.write_u16::<BigEndian>(self.utf8(name)).unwrap();
        bytes.write_u16::<BigEndian>(self.utf8(descriptor)).unwrap();
        bytes.extend(counted(attributes));
        bytes
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.write_u32::<BigEndian>(0xCAFEBABE).unwrap();
        bytes.write_u16::<BigEndian>(0).unwrap();
        bytes.write_u16::<BigEndian>(52).unwrap();
        bytes
            .write_u16::<BigEndian>(self.constant_pool_count)
            .unwrap();
        bytes.extend_from_slice(&self.constant_pool);
        bytes.write_u16::<BigEndian>(self.access_flags).unwrap();
        bytes.write_u16::<BigEndian>(self.this_class).unwrap();
        bytes.write_u16::<BigEndian>(self.super_class).unwrap();
        bytes
            .write_u16::<BigEndian>(self.interfaces.len() as u16)
            .unwrap();
        bytes.extend(u16s(&self.interfaces));
        bytes.extend(counted(self.fields.clone()));
        bytes.extend(counted(self.methods.clone()));
        bytes.extend(counted(self.attributes.clone()));
        bytes
    }
}

pub fn u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn counted(items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut bytes = (items.len() as u16).to_be_bytes().to_vec();
    for item in items {
        bytes.extend(item);
    }
    bytes
}
