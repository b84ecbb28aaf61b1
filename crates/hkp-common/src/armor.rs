//! OpenPGP ASCII armor for key uploads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crc::{Crc, CRC_24_OPENPGP};

const CRC24: Crc<u32> = Crc::<u32>::new(&CRC_24_OPENPGP);

/// Armor label used for public key uploads.
pub const PUBLIC_KEY_BLOCK: &str = "PGP PUBLIC KEY BLOCK";

/// Width of the base64 body lines.
const LINE_WIDTH: usize = 64;

/// Armors `data` as a public key block.
pub fn armor(data: &[u8]) -> String {
    armor_with_label(PUBLIC_KEY_BLOCK, data)
}

/// Armors `data` under an arbitrary `label`.
///
/// The output has the header line, an empty line, the base64 body wrapped
/// at 64 columns, the CRC-24 checksum line and the footer. Every line is
/// terminated by `\n`.
pub fn armor_with_label(label: &str, data: &[u8]) -> String {
    let body = BASE64.encode(data);
    let crc = CRC24.checksum(data).to_be_bytes();
    let checksum = BASE64.encode(&crc[1..]);

    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 2 * label.len() + 48);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n\n");
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push('=');
    out.push_str(&checksum);
    out.push('\n');
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc24_check_value() {
        assert_eq!(CRC24.checksum(b"123456789"), 0x21CF02);
    }

    #[test]
    fn test_armor_small_block() {
        let armored = armor(&[0x01, 0x02, 0x03]);
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines[0], "-----BEGIN PGP PUBLIC KEY BLOCK-----");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "AQID");
        assert!(lines[3].starts_with('=') && lines[3].len() == 5);
        assert_eq!(lines[4], "-----END PGP PUBLIC KEY BLOCK-----");
        assert!(armored.ends_with("-----\n"));
    }

    #[test]
    fn test_armor_empty_input_checksum() {
        let armored = armor(&[]);
        assert!(armored.contains("\n=twTO\n"));
    }

    #[test]
    fn test_armor_wraps_long_bodies() {
        let data = vec![0xA5u8; 200];
        let armored = armor(&data);
        let body: Vec<&str> = armored
            .lines()
            .skip(2)
            .take_while(|l| !l.starts_with('='))
            .collect();
        assert!(body.iter().all(|l| l.len() <= LINE_WIDTH));
        assert_eq!(body[0].len(), LINE_WIDTH);
        assert_eq!(BASE64.decode(body.concat()).unwrap(), data);
    }
}
