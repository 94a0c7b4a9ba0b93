//! Multipart form parsing for the processing endpoints

use super::error::ApiResult;
use crate::canvas::{CanvasSpec, ProductCategory};
use crate::config::parse_flag;
use crate::error::{CanvasError, Result};
use crate::utils::BackgroundColor;
use axum::extract::Multipart;
use std::collections::HashMap;
use std::str::FromStr;

/// Field names treated as file uploads even without a filename
const FILE_FIELDS: [&str; 3] = ["file", "files", "image"];

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Parsed multipart form: uploaded files plus text fields
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part of a multipart body
    ///
    /// # Errors
    /// - Malformed body or body over the request limit
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(ToString::to_string);

            if filename.is_some() || FILE_FIELDS.contains(&name.as_str()) {
                let bytes = field.bytes().await?;
                form.files.push(UploadedFile {
                    filename: filename.unwrap_or_else(|| "upload".to_string()),
                    bytes: bytes.to_vec(),
                });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Build a form from parts, used by tests and the CLI
    #[must_use]
    pub fn from_parts(files: Vec<UploadedFile>, fields: HashMap<String, String>) -> Self {
        Self { files, fields }
    }

    /// The single image of a one-file request
    ///
    /// # Errors
    /// - No file part in the request
    pub fn into_single_file(self) -> Result<(UploadedFile, Self)> {
        let mut form = self;
        if form.files.is_empty() {
            return Err(CanvasError::invalid_input(
                "No image uploaded; send it as a multipart 'file' field",
            ));
        }
        let file = form.files.remove(0);
        Ok((file, form))
    }

    /// Raw text value of a field, `None` when absent or blank
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        self.field(name)
            .map(|value| {
                parse_flag(value).ok_or_else(|| {
                    CanvasError::field_value_error(name, value, "true/false, 1/0, yes/no, on/off")
                })
            })
            .transpose()
    }

    fn number<T: FromStr>(&self, name: &str, valid: &str) -> Result<Option<T>> {
        self.field(name)
            .map(|value| {
                value
                    .parse::<T>()
                    .map_err(|_| CanvasError::field_value_error(name, value, valid))
            })
            .transpose()
    }

    /// Apply `bg_color`, `add_shadow` and `category` to `base`
    ///
    /// # Errors
    /// - Unknown color, category or malformed flag
    pub fn canvas_spec(&self, base: &CanvasSpec) -> Result<CanvasSpec> {
        let mut spec = base.clone();
        if let Some(color) = self.field("bg_color") {
            spec.background = BackgroundColor::parse(color)?;
        }
        if let Some(shadow) = self.flag("add_shadow")? {
            spec.shadow = shadow;
        }
        if let Some(category) = self.field("category") {
            spec.fill_ratio = category.parse::<ProductCategory>()?.fill_ratio();
        }
        Ok(spec)
    }

    /// Common fields plus `width`, `height`, `fill_ratio`, `quality` and `enhance`
    ///
    /// An explicit `fill_ratio` wins over the category's.
    ///
    /// # Errors
    /// - Any field that does not parse or falls outside its range
    pub fn custom_canvas_spec(&self, base: &CanvasSpec) -> Result<CanvasSpec> {
        let mut spec = self.canvas_spec(base)?;
        if let Some(width) = self.number("width", "an integer 100-10000")? {
            spec.width = width;
        }
        if let Some(height) = self.number("height", "an integer 100-10000")? {
            spec.height = height;
        }
        if let Some(fill_ratio) = self.number("fill_ratio", "a number 0.1-1.0")? {
            spec.fill_ratio = fill_ratio;
        }
        if let Some(quality) = self.number("quality", "an integer 1-100")? {
            spec.quality = quality;
        }
        if let Some(enhance) = self.flag("enhance")? {
            spec.enhance = enhance;
        }
        spec.validate()?;
        Ok(spec)
    }
}
