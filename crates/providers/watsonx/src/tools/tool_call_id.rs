//! Tool-call id normalization for models that only accept 9-character
//! alphanumeric ids (the Mistral family).

const BASE62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_LEN: usize = 9;

fn is_valid(id: &str) -> bool {
    id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// 32-bit `h * 31 + unit` over UTF-16 code units, wrapping.
fn hash_utf16(id: &str) -> i32 {
    id.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    })
}

fn base62(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE62[(n % 62) as usize]);
        n /= 62;
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

/// Map an arbitrary id to `^[a-zA-Z0-9]{9}$`.
///
/// Valid ids are returned unchanged. Distinct inputs may collide.
pub fn to_provider_tool_call_id(id: &str) -> String {
    if is_valid(id) {
        return id.to_string();
    }
    let encoded = base62(i64::from(hash_utf16(id)).unsigned_abs());
    if encoded.len() >= ID_LEN {
        encoded[..ID_LEN].to_string()
    } else {
        format!("{encoded:0>9}")
    }
}

/// Whether outgoing tool-call ids must be remapped for `model_id`.
pub fn requires_tool_call_id_remap(model_id: &str) -> bool {
    model_id.to_ascii_lowercase().contains("mistral")
}
