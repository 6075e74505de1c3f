// CLASSIFICATION: COMMUNITY
// Filename: args.rs v0.3
// Date Modified: 2026-10-18
// Author: Lukas Bower
//
// ─────────────────────────────────────────────────────────────
// Bootloader Argument Helpers
//
// Kernel and module lines arrive as one raw string whose first
// word is the file name:
//
//   (hd0,0)/boot/vmlinuz root=/dev/hda1 vga=ext mem=128M
//
// Options are located by plain substring search, the way the
// classic loader does it, so `mem=` also matches inside `xmem=`.
//
// # Public API
// * [`parse_maxint`]     – GRUB-style decimal/hex integer
// * [`kernel_args`]      – argument part of a kernel line
// * [`parse_vga`]        – `vga=` value → video mode word
// * [`parse_mem_limit`]  – `mem=` value → initrd ceiling
// * [`splice_password`]  – password-dialog marker replacement
// ─────────────────────────────────────────────────────────────

use log::{debug, warn};

use crate::bootloader::console::Operator;
use crate::error::BootError;

/// Largest value [`parse_maxint`] accepts.
pub const MAXINT: u32 = 0x7FFF_FFFF;
/// Clamp applied to an overflowing `mem=` value.
pub const LINUX_INITRD_MAX_ADDRESS: u32 = 0x3800_0000;

pub const LINUX_VID_MODE_NORMAL: u16 = 0xFFFF;
pub const LINUX_VID_MODE_EXTENDED: u16 = 0xFFFE;
pub const LINUX_VID_MODE_ASK: u16 = 0xFFFD;

/// Marker that triggers the password prompt.
pub const PASSWORD_MARKER: &str = "--with-password-dialog";
/// Longest password read from the operator.
pub const PASSWORD_MAX_LEN: usize = 10;
/// Token limits of the splice tokenizer.
pub const MAX_TOKENS: usize = 10;
pub const MAX_TOKEN_LEN: usize = 1023;

/// Parse a leading integer: decimal, or hex with a `0x` prefix.
///
/// Returns the value and the unparsed rest. Values above [`MAXINT`] fail
/// with `NumberOverflow`; no digits at all fail with `InvalidNumber`.
pub fn parse_maxint(s: &str) -> Result<(u32, &str), BootError> {
    let (radix, digits) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(rest) => (16, rest),
        None => (10, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(digits.len(), |(i, _)| i);
    if end == 0 {
        return Err(BootError::InvalidNumber(s.to_string()));
    }
    let mut value: u64 = 0;
    for c in digits[..end].chars() {
        value = value * u64::from(radix) + u64::from(c.to_digit(radix).unwrap_or(0));
        if value > u64::from(MAXINT) {
            return Err(BootError::NumberOverflow);
        }
    }
    Ok((value as u32, &digits[end..]))
}

/// Everything after the first word and the whitespace that follows it.
pub fn kernel_args(line: &str) -> &str {
    let line = line.trim_start();
    match line.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => line[i..].trim_start(),
        None => "",
    }
}

/// Value following the first occurrence of `key` (e.g. `"vga="`).
pub fn find_option<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.find(key).map(|i| &line[i + key.len()..])
}

/// Video mode word for a `vga=` value.
pub fn parse_vga(value: &str) -> Result<u16, BootError> {
    if value.starts_with("normal") {
        return Ok(LINUX_VID_MODE_NORMAL);
    }
    if value.starts_with("ext") {
        return Ok(LINUX_VID_MODE_EXTENDED);
    }
    if value.starts_with("ask") {
        return Ok(LINUX_VID_MODE_ASK);
    }
    let (mode, _) = parse_maxint(value)?;
    Ok(mode as u16)
}

/// Initrd ceiling from a kernel line's `mem=` option; 0 means none.
///
/// A `k`, `m` or `g` suffix (any case) shifts by 10, 20 or 30 bits.
/// Overflow, either while parsing or while shifting, clamps to
/// [`LINUX_INITRD_MAX_ADDRESS`]. An unparsable value is ignored.
pub fn parse_mem_limit(line: &str) -> u32 {
    let Some(value) = find_option(line, "mem=") else {
        return 0;
    };
    match parse_maxint(value) {
        Ok((n, rest)) => {
            let shift = match rest.chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('g') => 30,
                Some('m') => 20,
                Some('k') => 10,
                _ => 0,
            };
            if n > MAXINT >> shift {
                LINUX_INITRD_MAX_ADDRESS
            } else {
                n << shift
            }
        }
        Err(BootError::NumberOverflow) => LINUX_INITRD_MAX_ADDRESS,
        Err(e) => {
            debug!("ignoring mem= option: {e}");
            0
        }
    }
}

/// Replace a password-dialog marker in a module line.
///
/// The line is split on whitespace; a token equal to the marker (with or
/// without a trailing `"`) is replaced by `--password '<pw>'` after the
/// operator typed the same password twice. Tokens are rejoined with single
/// spaces. Lines without the marker are returned unchanged.
pub fn splice_password(line: &str, operator: &mut dyn Operator) -> Result<String, BootError> {
    if !line.contains(PASSWORD_MARKER) {
        return Ok(line.to_string());
    }
    let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
    if tokens.len() > MAX_TOKENS {
        return Err(BootError::TooManyTokens(MAX_TOKENS));
    }
    if tokens.iter().any(|t| t.len() > MAX_TOKEN_LEN) {
        return Err(BootError::TokenTooLong(MAX_TOKEN_LEN));
    }

    let quoted_marker = format!("{PASSWORD_MARKER}\"");
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let quoted = token == quoted_marker;
        if token != PASSWORD_MARKER && !quoted {
            out.push(token.to_string());
            continue;
        }
        let password = ask_password(operator);
        out.push(if quoted {
            format!("--password '{password}'\"")
        } else {
            format!("--password '{password}'")
        });
    }
    Ok(out.join(" "))
}

fn ask_password(operator: &mut dyn Operator) -> String {
    loop {
        let first = operator.read_password("  Please enter  password: ", PASSWORD_MAX_LEN);
        let second = operator.read_password("  Please retype password: ", PASSWORD_MAX_LEN);
        if first == second {
            return first;
        }
        warn!("Passwords do not match");
    }
}

// ───────────────────────────── tests ─────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::console::ScriptedOperator;

    #[test]
    fn maxint_decimal_hex_and_limits() {
        assert_eq!(parse_maxint("128M rest").unwrap(), (128, "M rest"));
        assert_eq!(parse_maxint("0x1fz").unwrap(), (0x1f, "z"));
        assert_eq!(parse_maxint("2147483647").unwrap().0, MAXINT);
        assert!(matches!(parse_maxint("2147483648"), Err(BootError::NumberOverflow)));
        assert!(matches!(parse_maxint("abc"), Err(BootError::InvalidNumber(_))));
        assert!(matches!(parse_maxint("0x"), Err(BootError::InvalidNumber(_))));
    }

    #[test]
    fn kernel_args_skip_file_name() {
        assert_eq!(kernel_args("/boot/vmlinuz  root=/dev/hda1 ro"), "root=/dev/hda1 ro");
        assert_eq!(kernel_args("/boot/vmlinuz"), "");
    }

    #[test]
    fn vga_values() {
        assert_eq!(parse_vga("normal").unwrap(), 0xFFFF);
        assert_eq!(parse_vga("ext quiet").unwrap(), 0xFFFE);
        assert_eq!(parse_vga("ask").unwrap(), 0xFFFD);
        assert_eq!(parse_vga("0x317").unwrap(), 0x317);
        assert!(parse_vga("foo").is_err());
    }

    #[test]
    fn mem_limit_units_and_clamps() {
        assert_eq!(parse_mem_limit("k mem=128M"), 128 << 20);
        assert_eq!(parse_mem_limit("k mem=64k"), 64 << 10);
        assert_eq!(parse_mem_limit("k mem=1G"), 1 << 30);
        assert_eq!(parse_mem_limit("k mem=4G"), LINUX_INITRD_MAX_ADDRESS);
        assert_eq!(parse_mem_limit("k mem=99999999999"), LINUX_INITRD_MAX_ADDRESS);
        assert_eq!(parse_mem_limit("k mem=nope"), 0);
        assert_eq!(parse_mem_limit("k root=/dev/hda1"), 0);
    }

    #[test]
    fn password_marker_is_spliced_in_order() {
        let mut op = ScriptedOperator::new().with_passwords(["one", "two", "pw", "pw"]);
        let line = splice_password("/boot/mod  --with-password-dialog  -v", &mut op).unwrap();
        assert_eq!(line, "/boot/mod --password 'pw' -v");
        assert_eq!(op.prompts.len(), 4);

        let mut op = ScriptedOperator::new().with_passwords(["x", "x"]);
        let line = splice_password("mod \"a --with-password-dialog\"", &mut op).unwrap();
        assert_eq!(line, "mod \"a --password 'x'\"");
    }

    #[test]
    fn lines_without_marker_are_untouched() {
        let mut op = ScriptedOperator::new();
        assert_eq!(splice_password("mod  a   b", &mut op).unwrap(), "mod  a   b");
        assert!(op.prompts.is_empty());
    }

    #[test]
    fn token_limits_are_enforced() {
        let mut op = ScriptedOperator::new();
        let many = format!("{PASSWORD_MARKER} {}", "a ".repeat(10));
        assert!(matches!(splice_password(&many, &mut op), Err(BootError::TooManyTokens(10))));
        let long = format!("{PASSWORD_MARKER} {}", "a".repeat(1024));
        assert!(matches!(splice_password(&long, &mut op), Err(BootError::TokenTooLong(_))));
    }
}
