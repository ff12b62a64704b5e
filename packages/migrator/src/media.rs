//! Extension → media classification helpers.

use amplify_client::MediaType;

use crate::error::{MigratorError, Result};

pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// Classify an extension as image or video. Accepts an optional leading dot
/// and any case.
pub fn get_media_type(extension: &str) -> Result<MediaType> {
    let ext = normalize(extension);
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(MediaType::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Ok(MediaType::Video)
    } else {
        Err(MigratorError::UnknownExtension(ext))
    }
}

/// MIME content type for a supported extension.
pub fn get_content_type(extension: &str) -> Result<&'static str> {
    match normalize(extension).as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "mp4" => Ok("video/mp4"),
        "mov" => Ok("video/quicktime"),
        "avi" => Ok("video/x-msvideo"),
        other => Err(MigratorError::UnknownExtension(other.to_string())),
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_classify_as_image() {
        for ext in IMAGE_EXTENSIONS {
            assert_eq!(get_media_type(ext).unwrap(), MediaType::Image);
        }
    }

    #[test]
    fn video_extensions_classify_as_video() {
        for ext in VIDEO_EXTENSIONS {
            assert_eq!(get_media_type(ext).unwrap(), MediaType::Video);
        }
    }

    #[test]
    fn classification_ignores_case_and_dot() {
        assert_eq!(get_media_type("JPG").unwrap(), MediaType::Image);
        assert_eq!(get_media_type(".MoV").unwrap(), MediaType::Video);
        assert_eq!(get_media_type(".png").unwrap(), MediaType::Image);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = get_media_type("pdf").unwrap_err();
        assert!(err.to_string().contains("Unknown extension"));
        assert!(get_media_type("").is_err());
    }

    #[test]
    fn content_types() {
        assert_eq!(get_content_type("jpg").unwrap(), "image/jpeg");
        assert_eq!(get_content_type("JPEG").unwrap(), "image/jpeg");
        assert_eq!(get_content_type(".png").unwrap(), "image/png");
        assert_eq!(get_content_type("gif").unwrap(), "image/gif");
        assert_eq!(get_content_type("mp4").unwrap(), "video/mp4");
        assert_eq!(get_content_type(".MOV").unwrap(), "video/quicktime");
        assert_eq!(get_content_type("avi").unwrap(), "video/x-msvideo");
        assert!(get_content_type("pdf").is_err());
    }
}
