//! Request extractors that reject with the API error envelope

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::Error;

/// JSON body; a malformed or mistyped body is a validation error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

/// Path parameters; an unparsable segment is a validation error
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct ApiPath<T>(pub T);
