//! Upload validation and filename handling.
//!
//! Validity is decided by filename suffix and byte size only. Image headers are
//! never inspected, so a `.png` full of text passes here and fails later in the
//! processor.

use unicode_normalization::UnicodeNormalization;

use crate::core::errors::ValidationError;

/// Largest accepted single upload (10 MiB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Accepted extensions, compared case-insensitively
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Full check used by single-image removal: name, type and size.
pub fn validate(filename: &str, size: usize) -> Result<(), ValidationError> {
    validate_type(filename)?;
    if size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge { size });
    }
    Ok(())
}

/// Name and type check only. Batch submission uses this and never checks size.
pub fn validate_type(filename: &str) -> Result<(), ValidationError> {
    if filename.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    if !allowed_file(filename) {
        return Err(ValidationError::DisallowedType);
    }
    Ok(())
}

/// True when the text after the last `.` is an allowed extension
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Make a client-supplied filename safe to use as a path component.
///
/// Rules:
/// 1. NFKD-fold, then drop whatever is still non-ASCII (`é` becomes `e`)
/// 2. Replace `/` with a space; `\` is not a separator and gets filtered in step 4
/// 3. Join whitespace-separated parts with `_`
/// 4. Remove everything outside `[A-Za-z0-9_.-]`
/// 5. Trim leading and trailing `.` and `_`
///
/// The result may be empty; callers decide what that means.
pub fn sanitize_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();

    ascii
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Download name for a processed image: `<stem>-nobg.png`
pub fn nobg_filename(original: &str) -> String {
    let safe = sanitize_filename(original);
    let stem = safe.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&safe);
    format!("{}-nobg.png", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions_any_case() {
        for name in ["a.png", "b.JPG", "c.Jpeg", "d.webp", "e.tar.PNG", ".png"] {
            assert!(validate(name, 1).is_ok(), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_rejects_bad_types() {
        for name in ["a.txt", "png", "a.png.exe", "a.", "a.gif"] {
            assert_eq!(
                validate(name, 1),
                Err(ValidationError::DisallowedType),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_rejects_empty_filename() {
        assert_eq!(validate("", 1), Err(ValidationError::EmptyFilename));
        assert_eq!(validate_type(""), Err(ValidationError::EmptyFilename));
    }

    #[test]
    fn test_size_ceiling_is_inclusive() {
        assert!(validate("a.png", MAX_FILE_SIZE).is_ok());
        assert_eq!(
            validate("a.png", MAX_FILE_SIZE + 1),
            Err(ValidationError::TooLarge {
                size: MAX_FILE_SIZE + 1
            })
        );
    }

    #[test]
    fn test_type_check_ignores_size() {
        assert!(validate_type("huge.png").is_ok());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My cool photo.png"), "My_cool_photo.png");
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "etc_passwd.png");
        assert_eq!(sanitize_filename("C:\\Users\\me\\pic.jpg"), "CUsersmepic.jpg");
        assert_eq!(sanitize_filename("café.webp"), "cafe.webp");
        assert_eq!(sanitize_filename("Ｆｉｌｅ №1.png"), "File_No1.png");
        assert_eq!(sanitize_filename("__.hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("???"), "");
    }

    #[test]
    fn test_nobg_filename() {
        assert_eq!(nobg_filename("cat.jpg"), "cat-nobg.png");
        assert_eq!(nobg_filename("my cat.final.webp"), "my_cat.final-nobg.png");
        assert_eq!(nobg_filename("../x.png"), "x-nobg.png");
        assert_eq!(nobg_filename("Crème brûlée.JPG"), "Creme_brulee-nobg.png");
    }
}
