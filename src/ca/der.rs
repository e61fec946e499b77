//! Minimal hand-rolled DER encoding primitives.
//!
//! The certificate and OCSP structures this CA emits are small, fixed
//! shapes (RFC 5280 `TBSCertificate`, RFC 6960 `ResponseData`) - rather
//! than pull in a full ASN.1 derive framework, extensions and the
//! handful of enclosing SEQUENCEs are assembled directly as DER bytes,
//! the same way the Must-Staple extension value itself is a literal
//! `30 03 02 01 05`.

/// Wraps `content` in a DER TLV with the given tag byte.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    encode_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first_nonzero..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// `SEQUENCE { ... }`
pub fn sequence(content: &[u8]) -> Vec<u8> {
    tlv(0x30, content)
}

/// Concatenates DER-encoded fragments, for building up SEQUENCE bodies.
pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// `INTEGER` from a big-endian, non-negative magnitude. A leading `0x00`
/// is inserted if the high bit of the first byte is set, so the value
/// is never misread as negative.
pub fn integer(magnitude: &[u8]) -> Vec<u8> {
    let mut trimmed = magnitude;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed.is_empty() {
        content.push(0);
    } else {
        if trimmed[0] & 0x80 != 0 {
            content.push(0);
        }
        content.extend_from_slice(trimmed);
    }
    tlv(0x02, &content)
}

/// `INTEGER` from a small non-negative value.
pub fn small_integer(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    integer(&bytes[first_nonzero..])
}

/// `BOOLEAN`.
pub fn boolean(value: bool) -> Vec<u8> {
    tlv(0x01, &[if value { 0xFF } else { 0x00 }])
}

/// `OCTET STRING`.
pub fn octet_string(content: &[u8]) -> Vec<u8> {
    tlv(0x04, content)
}

/// `BIT STRING` with zero unused bits.
pub fn bit_string(content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + 1);
    body.push(0);
    body.extend_from_slice(content);
    tlv(0x03, &body)
}

/// `SET { ... }`.
pub fn set(content: &[u8]) -> Vec<u8> {
    tlv(0x31, content)
}

/// `UTF8String`.
pub fn utf8_string(s: &str) -> Vec<u8> {
    tlv(0x0C, s.as_bytes())
}

/// An implicitly-tagged `IA5String`-shaped GeneralName, e.g. `dNSName
/// [2]` or `uniformResourceIdentifier [6]`.
pub fn general_name_ia5(tag: u8, value: &str) -> Vec<u8> {
    tlv(0x80 | tag, value.as_bytes())
}

/// A constructed, implicitly-tagged context value, replacing the inner
/// value's own tag outright (used for `[n] IMPLICIT SEQUENCE`-shaped
/// fields such as `DistributionPointName::fullName`).
pub fn context_implicit_constructed(tag: u8, inner: &[u8]) -> Vec<u8> {
    tlv(0xA0 | tag, inner)
}

/// A constructed, explicitly-tagged context value: `[tag] EXPLICIT inner`.
pub fn context_explicit(tag: u8, inner: &[u8]) -> Vec<u8> {
    tlv(0xA0 | tag, inner)
}

/// `OBJECT IDENTIFIER` from a dotted string, e.g. `"1.3.6.1.5.5.7.1.24"`.
pub fn oid(dotted: &str) -> Vec<u8> {
    let arcs: Vec<u64> = dotted.split('.').map(|a| a.parse().unwrap_or(0)).collect();
    let mut body = Vec::new();
    if arcs.len() >= 2 {
        body.push((arcs[0] * 40 + arcs[1]) as u8);
        for arc in &arcs[2..] {
            encode_base128(*arc, &mut body);
        }
    }
    tlv(0x06, &body)
}

fn encode_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut stack = Vec::new();
    stack.push((value & 0x7F) as u8);
    value >>= 7;
    while value > 0 {
        stack.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    stack.reverse();
    out.extend_from_slice(&stack);
}

/// `GeneralizedTime` in the `YYYYMMDDHHMMSSZ` form RFC 5280 requires for
/// dates from 2050 onward (and which is acceptable for any date).
pub fn generalized_time(t: time::OffsetDateTime) -> Vec<u8> {
    let t = t.to_offset(time::UtcOffset::UTC);
    let s = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    );
    tlv(0x18, s.as_bytes())
}

/// An X.509 `Extension` SEQUENCE: `{ extnID, critical DEFAULT FALSE,
/// extnValue OCTET STRING }`. `critical` is only encoded when `true`,
/// matching the ASN.1 DEFAULT elision rule.
pub fn extension(oid_str: &str, critical: bool, value: &[u8]) -> Vec<u8> {
    let mut body = oid(oid_str);
    if critical {
        body.extend(boolean(true));
    }
    body.extend(octet_string(value));
    sequence(&body)
}
