//! Request bodies that may arrive either as JSON or as `multipart/form-data`.

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::media::extension_of;

/// One file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A fully buffered multipart body, split into text fields and files.
/// Field order is preserved for both.
#[derive(Debug, Default)]
pub struct MultipartForm {
    texts: Vec<(String, String)>,
    files: Vec<UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);

            match file_name {
                Some(file_name) => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read field: {}", e)))?;
                    // Browsers send an empty part for untouched file inputs.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.push(UploadedFile { field: name, file_name, data });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read field: {}", e)))?;
                    form.texts.push((name, value));
                }
            }
        }

        Ok(form)
    }

    /// First text value of a field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// Every text value of a field, in order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.texts.iter().filter(|(k, _)| k == name).map(|(_, v)| v.as_str()).collect()
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == name)
    }

    /// Files under any of `names`, in upload order.
    pub fn files_named(&self, names: &[&str]) -> Vec<&UploadedFile> {
        self.files.iter().filter(|f| names.contains(&f.field.as_str())).collect()
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }
}

/// JSON or multipart body, chosen by `Content-Type`.
pub enum Payload<T> {
    Json(T),
    Form(MultipartForm),
}

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(Payload::Form(MultipartForm::read(multipart).await?))
        } else {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(Payload::Json(body))
        }
    }
}

/// Plain JSON body with rejections reported as `ApiError`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Ok(JsonBody(body))
    }
}
