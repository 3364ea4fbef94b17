//! Unsigned LEB128, as used by ID and delegated address byte forms.

/// Appends `value` as unsigned LEB128.
pub fn write_unsigned(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

pub fn encode_unsigned(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    write_unsigned(value, &mut out);
    out
}

/// Reads one unsigned LEB128 value and returns it with the number of bytes
/// consumed. Overlong or truncated encodings yield `None`.
pub fn read_unsigned(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    for (idx, byte) in bytes.iter().enumerate() {
        if idx >= 10 {
            return None;
        }
        let low = u64::from(byte & 0x7f);
        let shift = 7 * idx as u32;
        if idx == 9 && low > 1 {
            return None;
        }
        value |= low << shift;
        if byte & 0x80 == 0 {
            // A trailing zero group means the encoding was not minimal.
            if idx > 0 && *byte == 0 {
                return None;
            }
            return Some((value, idx + 1));
        }
    }
    None
}
