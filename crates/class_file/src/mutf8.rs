// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.4.7

/// Decodes the "modified UTF-8" used by `CONSTANT_Utf8_info`.
///
/// Code points are rebuilt as UTF-16 units first, since supplementary
/// characters are stored as two separately encoded surrogates. Malformed
/// sequences decode to U+FFFD.
pub(crate) fn decode(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        // Plain ASCII, the overwhelmingly common case.
        return bytes.iter().map(|b| *b as char).collect();
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let x = bytes[i];
        if x & 0x80 == 0 {
            units.push(x as u16);
            i += 1;
        } else if x & 0xe0 == 0xc0 {
            match bytes.get(i + 1) {
                Some(&y) if y & 0xc0 == 0x80 => {
                    units.push(((x as u16 & 0x1f) << 6) | (y as u16 & 0x3f));
                    i += 2;
                }
                _ => {
                    units.push(char::REPLACEMENT_CHARACTER as u16);
                    i += 1;
                }
            }
        } else if x & 0xf0 == 0xe0 {
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(&y), Some(&z)) if y & 0xc0 == 0x80 && z & 0xc0 == 0x80 => {
                    units.push(
                        ((x as u16 & 0x0f) << 12) | ((y as u16 & 0x3f) << 6) | (z as u16 & 0x3f),
                    );
                    i += 3;
                }
                _ => {
                    units.push(char::REPLACEMENT_CHARACTER as u16);
                    i += 1;
                }
            }
        } else {
            units.push(char::REPLACEMENT_CHARACTER as u16);
            i += 1;
        }
    }

    String::from_utf16_lossy(&units)
}
