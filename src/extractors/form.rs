//! Extract submitted form data from a urlencoded or multipart body.

use crate::error::AppError;
use crate::service::input::{FormInput, UploadedFile};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};

/// Form fields in submission order. Multipart parts carrying a file name become
/// uploads; everything else is text.
#[derive(Clone, Debug, Default)]
pub struct Submitted(pub FormInput);

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for Submitted
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Submitted(FormInput::from_pairs(pairs)));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let mut input = FormInput::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                    let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                    input.push_file(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes,
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
                    input.push_text(name, text);
                }
            }
        }
        Ok(Submitted(input))
    }
}
