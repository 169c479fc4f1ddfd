//! Sanitization for log messages built from external input.
//!
//! Masks credential-shaped substrings, strips control characters and
//! CR/LF (preventing log injection), and truncates oversized payloads.

use std::path::Path;

/// Maximum sanitized message length in bytes.
const MAX_MESSAGE_BYTES: usize = 10 * 1024;

/// Secret prefixes, longest first so `sk-ant-` wins over `sk-`.
const SECRET_PREFIXES: &[&str] = &["sk-ant-", "sk-proj-", "sk-", "r8_"];

/// Minimum run of key characters after a prefix to treat it as a secret.
const MIN_SECRET_RUN: usize = 20;

/// Mask an API key for safe display.
///
/// Shows only the provider prefix followed by a marker; never reveals
/// suffix characters.
pub fn mask_api_key(api_key: Option<&str>) -> String {
    let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
        return "Not configured".to_string();
    };
    for prefix in SECRET_PREFIXES {
        if key.starts_with(prefix) {
            return format!("{}***configured***", prefix);
        }
    }
    "***configured***".to_string()
}

/// Sanitize a message before it reaches a log sink.
///
/// Applies secret masking, control-character stripping, and 10 KB
/// truncation, in that order.
pub fn sanitize_log_message(message: &str) -> String {
    let masked = mask_secrets(message);
    let stripped = strip_control_chars(&masked);
    truncate_message(stripped)
}

/// Sanitize a path for logging: only the file name is shown.
pub fn sanitize_path(path: &Path) -> String {
    match path.file_name() {
        Some(name) => format!("<path>/{}", name.to_string_lossy()),
        None => "<path>".to_string(),
    }
}

/// Replace credential-shaped substrings with `{prefix}***MASKED***`.
fn mask_secrets(message: &str) -> String {
    let mut result = message.to_string();
    for prefix in SECRET_PREFIXES {
        let mut output = String::with_capacity(result.len());
        let mut rest = result.as_str();
        while let Some(index) = rest.find(prefix) {
            let after = &rest[index + prefix.len()..];
            let run = after
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric())
                .count();
            if run >= MIN_SECRET_RUN {
                output.push_str(&rest[..index]);
                output.push_str(prefix);
                output.push_str("***MASKED***");
                rest = &after[run..];
            } else {
                output.push_str(&rest[..index + prefix.len()]);
                rest = after;
            }
        }
        output.push_str(rest);
        result = output;
    }
    result
}

/// Replace CR/LF with spaces and drop other control characters.
fn strip_control_chars(message: &str) -> String {
    message
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() || ('\u{7f}'..='\u{9f}').contains(&c) => None,
            c => Some(c),
        })
        .collect()
}

/// Truncate to the size cap on a character boundary.
fn truncate_message(mut message: String) -> String {
    if message.len() <= MAX_MESSAGE_BYTES {
        return message;
    }
    let mut cut = MAX_MESSAGE_BYTES;
    while !message.is_char_boundary(cut) {
        cut -= 1;
    }
    message.truncate(cut);
    message.push_str("... [truncated]");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mask_api_key_shows_prefix_only() {
        assert_eq!(
            mask_api_key(Some("sk-ant-REDACTED")),
            "sk-ant-***configured***"
        );
        assert_eq!(
            mask_api_key(Some("sk-0123456789abcdef0123")),
            "sk-***configured***"
        );
        assert_eq!(
            mask_api_key(Some("r8_0123456789abcdef0123")),
            "r8_***configured***"
        );
        assert_eq!(mask_api_key(Some("mystery")), "***configured***");
        assert_eq!(mask_api_key(None), "Not configured");
        assert_eq!(mask_api_key(Some("  ")), "Not configured");
    }

    #[test]
    fn secrets_masked_in_messages() {
        let message = "auth failed for key sk-0123456789abcdefghij0123 on retry";
        let sanitized = sanitize_log_message(message);
        assert!(!sanitized.contains("0123456789abcdefghij"));
        assert!(sanitized.contains("sk-***MASKED***"));

        let anthropic = "using sk-ant-REDACTED today";
        let sanitized = sanitize_log_message(anthropic);
        assert!(sanitized.contains("sk-ant-***MASKED***"));
        assert!(!sanitized.contains("sk-ant-0123"));
    }

    #[test]
    fn short_key_like_strings_left_alone() {
        let message = "sk-short token mentioned";
        assert_eq!(sanitize_log_message(message), message);
    }

    #[test]
    fn control_chars_and_newlines_stripped() {
        let message = "line one\nfake: entry\r\x01end";
        let sanitized = sanitize_log_message(message);
        assert!(!sanitized.contains('\n'));
        assert!(!sanitized.contains('\r'));
        assert!(!sanitized.contains('\x01'));
        assert_eq!(sanitized, "line one fake: entry end");
    }

    #[test]
    fn oversized_messages_truncated() {
        let message = "x".repeat(20 * 1024);
        let sanitized = sanitize_log_message(&message);
        assert!(sanitized.len() < 11 * 1024);
        assert!(sanitized.ends_with("... [truncated]"));
    }

    #[test]
    fn path_sanitization_keeps_filename_only() {
        let path = PathBuf::from("/home/user/private/meeting.mp4");
        assert_eq!(sanitize_path(&path), "<path>/meeting.mp4");
    }
}
