//! Form field metadata and validation for posts and comments.

use std::collections::BTreeMap;

use bytes::Bytes;
use imagesize::ImageType;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{entities::GroupRecord, posts};

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str = "Select a valid choice.";
pub const INVALID_IMAGE_MESSAGE: &str = "Upload a valid image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMeta {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub required: bool,
}

pub const TEXT_FIELD: FieldMeta = FieldMeta {
    name: "text",
    label: "Post text",
    help_text: "Text of the new post",
    required: true,
};

pub const GROUP_FIELD: FieldMeta = FieldMeta {
    name: "group",
    label: "Group",
    help_text: "Group the post will belong to",
    required: false,
};

pub const IMAGE_FIELD: FieldMeta = FieldMeta {
    name: "image",
    label: "Image",
    help_text: "",
    required: false,
};

pub const COMMENT_FIELD: FieldMeta = FieldMeta {
    name: "text",
    label: "Comment",
    help_text: "",
    required: true,
};

/// Field errors keyed by field name, in field order of insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw values of the post form as submitted.
#[derive(Debug, Clone, Default)]
pub struct PostFormInput {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<UploadedImage>,
}

#[derive(Debug, Clone)]
pub struct ValidPostForm {
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<UploadedImage>,
}

pub fn validate_post_form(
    input: &PostFormInput,
    groups: &[GroupRecord],
) -> Result<ValidPostForm, FormErrors> {
    let mut errors = FormErrors::default();

    let text = match posts::normalize_text(&input.text) {
        Ok(text) => Some(text),
        Err(_) => {
            errors.add(TEXT_FIELD.name, REQUIRED_MESSAGE);
            None
        }
    };

    let group_id = match input.group.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let chosen = Uuid::parse_str(raw)
                .ok()
                .filter(|id| groups.iter().any(|group| group.id == *id));
            if chosen.is_none() {
                errors.add(GROUP_FIELD.name, INVALID_CHOICE_MESSAGE);
            }
            chosen
        }
    };

    let image = match &input.image {
        Some(upload) if upload.bytes.is_empty() && upload.filename.is_empty() => None,
        Some(upload) => {
            if !is_supported_image(&upload.bytes) {
                errors.add(IMAGE_FIELD.name, INVALID_IMAGE_MESSAGE);
            }
            Some(upload.clone())
        }
        None => None,
    };

    match text {
        Some(text) if errors.is_empty() => Ok(ValidPostForm {
            text,
            group_id,
            image,
        }),
        _ => Err(errors),
    }
}

/// Content sniffing: the upload must carry a GIF, PNG, JPEG or WebP header
/// with readable dimensions.
pub fn is_supported_image(bytes: &[u8]) -> bool {
    let supported = matches!(
        imagesize::image_type(bytes),
        Ok(ImageType::Gif | ImageType::Png | ImageType::Jpeg | ImageType::Webp)
    );
    supported && imagesize::blob_size(bytes).is_ok()
}

pub fn validate_comment(text: &str) -> Result<String, FormErrors> {
    posts::normalize_text(text).map_err(|_| {
        let mut errors = FormErrors::default();
        errors.add(COMMENT_FIELD.name, REQUIRED_MESSAGE);
        errors
    })
}
