//! helpers for building damaged archives in tests

use std::path::Path;

const LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const CENTRAL_HEADER: &[u8] = b"PK\x01\x02";

/// rewrite the compression method of entry `name` in both its local and
/// central directory headers
pub(crate) fn set_entry_method(path: &Path, name: &str, method: u16) {
    let mut data = std::fs::read(path).unwrap();
    let mut patched = 0;

    // (signature, offset of method, offset of name length, offset of name)
    for (sig, method_at, len_at, name_at) in [(LOCAL_HEADER, 8, 26, 30), (CENTRAL_HEADER, 10, 28, 46)] {
        let mut pos = 0;
        while pos + name_at <= data.len() {
            if &data[pos..pos + 4] != sig {
                pos += 1;
                continue;
            }
            let len = u16::from_le_bytes([data[pos + len_at], data[pos + len_at + 1]]) as usize;
            let start = pos + name_at;
            if data.get(start..start + len) == Some(name.as_bytes()) {
                data[pos + method_at..pos + method_at + 2].copy_from_slice(&method.to_le_bytes());
                patched += 1;
            }
            pos += 4;
        }
    }

    assert_eq!(patched, 2, "headers for {name} not found");
    std::fs::write(path, data).unwrap();
}
