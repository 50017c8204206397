//! Form data and the reader that produces it.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::request::{HttpRequest, ValueMap};

/// A file uploaded through a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    name: String,
    file_name: String,
    content_type: Option<String>,
    content: Arc<[u8]>,
}

impl FormFile {
    /// Creates a file for form field `name`.
    pub fn new(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            content_type: None,
            content: Arc::from(content.into()),
        }
    }

    /// Sets the file's content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The form field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client-supplied file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file's content type.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// The file bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns `true` for an empty file.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// All files of a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFileCollection {
    files: Vec<FormFile>,
}

impl FormFileCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file.
    pub fn push(&mut self, file: FormFile) {
        self.files.push(file);
    }

    /// The first file for field `name`, matched case-insensitively.
    pub fn get(&self, name: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Every file for field `name`.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormFile> {
        self.files
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
    }

    /// Iterates over all files.
    pub fn iter(&self) -> impl Iterator<Item = &FormFile> {
        self.files.iter()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A parsed form: text fields plus uploaded files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormCollection {
    fields: ValueMap,
    files: FormFileCollection,
}

impl FormCollection {
    /// Creates a form from its parts.
    pub fn new(fields: ValueMap, files: FormFileCollection) -> Self {
        Self { fields, files }
    }

    /// The text fields.
    pub fn fields(&self) -> &ValueMap {
        &self.fields
    }

    /// The uploaded files.
    pub fn files(&self) -> &FormFileCollection {
        &self.files
    }

    /// All values of field `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields.get(key)
    }
}

/// Failure reading a form.
#[derive(Debug, Error)]
pub enum FormReadError {
    /// The body stream failed.
    #[error("failed to read the form body: {0}")]
    Io(#[from] io::Error),

    /// The body is not a valid form.
    #[error("invalid form data: {0}")]
    InvalidData(String),
}

/// Parses a request body into a [`FormCollection`].
#[async_trait]
pub trait FormReader: Send + Sync {
    /// Reads the form of `request`.
    async fn read_form(&self, request: &HttpRequest) -> Result<FormCollection, FormReadError>;
}

/// Reads `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedFormReader;

#[async_trait]
impl FormReader for UrlEncodedFormReader {
    async fn read_form(&self, request: &HttpRequest) -> Result<FormCollection, FormReadError> {
        if request
            .content_type()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/"))
        {
            return Err(FormReadError::InvalidData(
                "multipart bodies need a multipart-capable form reader".into(),
            ));
        }

        let body = request.read_body().await?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
            .map_err(|e| FormReadError::InvalidData(e.to_string()))?;
        Ok(FormCollection::new(
            pairs.into_iter().collect(),
            FormFileCollection::new(),
        ))
    }
}
