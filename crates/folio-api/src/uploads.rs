//! Size and type limits for uploaded files.

use crate::error::ApiError;
use crate::forms::UploadedFile;

const MB: usize = 1024 * 1024;

/// Project gallery images, covers and profile pictures.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
pub const MAX_IMAGE_BYTES: usize = 10 * MB;

pub const MESSAGE_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const MAX_MESSAGE_IMAGE_BYTES: usize = 3 * MB;

pub const MESSAGE_DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx"];
pub const MAX_MESSAGE_DOCUMENT_BYTES: usize = 5 * MB;

/// Check a picture upload (gallery image, cover, avatar, banner or logo).
pub fn check_image(field: &str, file: &UploadedFile) -> Result<(), ApiError> {
    let ext = file.extension().unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation(
            field,
            format!("Unsupported image type. Allowed: {}.", IMAGE_EXTENSIONS.join(", ")),
        ));
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(ApiError::validation(field, "Image too large (max 10 MB)."));
    }
    Ok(())
}

/// Check a direct-message attachment against the per-kind limits.
pub fn check_message_attachment(file_name: &str, size: usize) -> Result<(), ApiError> {
    let ext = crate::media::extension_of(file_name).unwrap_or_default();

    if MESSAGE_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        if size > MAX_MESSAGE_IMAGE_BYTES {
            return Err(ApiError::validation("attachment", "Image too large (max 3 MB)."));
        }
        return Ok(());
    }
    if MESSAGE_DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        if size > MAX_MESSAGE_DOCUMENT_BYTES {
            return Err(ApiError::validation("attachment", "Document too large (max 5 MB)."));
        }
        return Ok(());
    }

    Err(ApiError::validation(
        "attachment",
        "Unsupported file type. Allowed: jpg, jpeg, png, pdf, doc, docx, xls, xlsx.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn message_image_limits() {
        assert!(check_message_attachment("site.jpg", 2 * MB).is_ok());
        assert!(check_message_attachment("site.PNG", 3 * MB).is_ok());
        assert!(check_message_attachment("site.jpg", 4 * MB).is_err());
    }

    #[test]
    fn message_document_limits() {
        assert!(check_message_attachment("quote.pdf", 4 * MB).is_ok());
        assert!(check_message_attachment("budget.xlsx", 5 * MB).is_ok());
        assert!(check_message_attachment("quote.pdf", 6 * MB).is_err());
    }

    #[test]
    fn unknown_kinds_rejected() {
        assert!(check_message_attachment("setup.exe", 10).is_err());
        assert!(check_message_attachment("anim.gif", 10).is_err());
        assert!(check_message_attachment("noext", 10).is_err());
    }

    #[test]
    fn gallery_images() {
        let file = |name: &str, len: usize| UploadedFile {
            field: "images".into(),
            file_name: name.into(),
            data: Bytes::from(vec![0u8; len]),
        };
        assert!(check_image("images", &file("a.webp", 10)).is_ok());
        assert!(check_image("images", &file("a.svg", 10)).is_err());
        assert!(check_image("images", &file("a.png", MAX_IMAGE_BYTES + 1)).is_err());
    }
}
