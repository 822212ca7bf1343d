//! 8.3 short name encoding.

use alloc::string::String;
use fat32_types::{FsError, Result};

/// Space-padded 11-byte on-disk name: 8 bytes of base, 3 of extension.
pub type ShortName = [u8; 11];

pub const DOT:     ShortName = *b".          ";
pub const DOT_DOT: ShortName = *b"..         ";

/// Encode `name` as a padded, upper-cased 8.3 name.
///
/// The first `.` separates base from extension. Anything past 8 base or
/// 3 extension characters is dropped.
pub fn to_8_3(name: &str) -> ShortName {
    match name {
        "."  => return DOT,
        ".." => return DOT_DOT,
        _ => {}
    }
    let mut out = [b' '; 11];
    let (base, ext) = match name.find('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None    => (name, ""),
    };
    for (i, b) in base.bytes().take(8).enumerate() {
        out[i] = b.to_ascii_uppercase();
    }
    for (i, b) in ext.bytes().filter(|&b| b != b'.').take(3).enumerate() {
        out[8 + i] = b.to_ascii_uppercase();
    }
    out
}

/// Decode an on-disk name, e.g. `"HELLO   TXT"` → `"HELLO.TXT"`.
pub fn from_8_3(raw: &ShortName) -> String {
    let base_end = raw[..8].iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let ext_end  = raw[8..].iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let mut name = String::with_capacity(12);
    name.push_str(&String::from_utf8_lossy(&raw[..base_end]));
    if ext_end > 0 {
        name.push('.');
        name.push_str(&String::from_utf8_lossy(&raw[8..8 + ext_end]));
    }
    name
}

pub fn is_dot_entry(raw: &ShortName) -> bool {
    raw == &DOT || raw == &DOT_DOT
}

/// Reject names that cannot become a new directory entry.
pub fn validate_new(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(FsError::InvalidName);
    }
    if !name.bytes().all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\') {
        return Err(FsError::InvalidName);
    }
    if to_8_3(name)[0] == b' ' {
        return Err(FsError::InvalidName);
    }
    Ok(())
}
