//! Java source rendering of field and method descriptors (§4.3).
//!
//! `type_name("[Ljava/lang/String;")` gives `java.lang.String[]` and
//! `signature("(IJ)V")` gives `(int, long)`.

use crate::{ClassFileError, Result};

/// Turns an internal form name (`java/lang/Object`) into a binary name.
pub fn java_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// The Java type named by a field descriptor.
pub fn type_name(descriptor: &str) -> Result<String> {
    match parse_type(descriptor) {
        Some((name, "")) => Ok(name),
        _ => Err(invalid(descriptor)),
    }
}

/// The parameter list of a method descriptor, e.g. `(int, java.lang.String)`.
pub fn signature(method_descriptor: &str) -> Result<String> {
    Ok(format!(
        "({})",
        parameter_types(method_descriptor)?.join(", ")
    ))
}

pub fn parameter_types(method_descriptor: &str) -> Result<Vec<String>> {
    let (mut parameters, _) = split(method_descriptor)?;

    let mut types = Vec::new();
    while !parameters.is_empty() {
        let (name, rest) = parse_type(parameters).ok_or_else(|| invalid(method_descriptor))?;
        types.push(name);
        parameters = rest;
    }

    Ok(types)
}

pub fn parameter_count(method_descriptor: &str) -> Result<usize> {
    parameter_types(method_descriptor).map(|types| types.len())
}

/// The return type of a method descriptor, `void` included.
pub fn return_type(method_descriptor: &str) -> Result<String> {
    let (_, return_descriptor) = split(method_descriptor)?;
    match return_descriptor {
        "V" => Ok("void".to_owned()),
        other => type_name(other).map_err(|_| invalid(method_descriptor)),
    }
}

fn split(method_descriptor: &str) -> Result<(&str, &str)> {
    method_descriptor
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .ok_or_else(|| invalid(method_descriptor))
}

// Field types allow at most 255 array dimensions (§4.3.2).
const MAX_DIMENSIONS: usize = 255;

fn parse_type(descriptor: &str) -> Option<(String, &str)> {
    let element = descriptor.trim_start_matches('[');
    let dimensions = descriptor.len() - element.len();
    if dimensions > MAX_DIMENSIONS {
        return None;
    }

    let first = *element.as_bytes().first()?;
    if !first.is_ascii() {
        return None;
    }
    let rest = &element[1..];

    let (mut name, rest) = match first {
        b'B' => ("byte".to_owned(), rest),
        b'C' => ("char".to_owned(), rest),
        b'D' => ("double".to_owned(), rest),
        b'F' => ("float".to_owned(), rest),
        b'I' => ("int".to_owned(), rest),
        b'J' => ("long".to_owned(), rest),
        b'S' => ("short".to_owned(), rest),
        b'Z' => ("boolean".to_owned(), rest),
        b'L' => {
            let (name, rest) = rest.split_once(';')?;
            if name.is_empty() {
                return None;
            }
            (java_name(name), rest)
        }
        _ => return None,
    };

    name.push_str(&"[]".repeat(dimensions));
    Some((name, rest))
}

fn invalid(descriptor: &str) -> ClassFileError {
    ClassFileError::InvalidDescriptor(descriptor.to_owned())
}
