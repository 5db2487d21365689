/// Maps a locally formatted Kenyan number to international format for SMS
/// dispatch. Storage always keeps the local form.
///
/// `0712345678` -> `+254712345678`, `0112345678` -> `+254112345678`.
pub fn normalize_kenyan_phone(phone: &str) -> String {
    let phone = phone.trim();
    if let Some(rest) = phone.strip_prefix('0') {
        return format!("+254{rest}");
    }
    phone.to_string()
}
