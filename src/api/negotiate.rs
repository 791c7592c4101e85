//! Response format selection through the `Return-Type` header.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{AppError, Result};

pub const RETURN_TYPE_HEADER: &str = "Return-Type";

const JSON: &str = "application/json";
const XML: &str = "application/xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    #[default]
    Json,
    Xml,
}

impl ReturnType {
    pub fn from_header(value: Option<&HeaderValue>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::Json);
        };
        match value.to_str().map(str::trim) {
            Ok(JSON) => Ok(Self::Json),
            Ok(XML) => Ok(Self::Xml),
            _ => Err(AppError::TypeNotAvailable(
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )),
        }
    }

    /// Serializes `value` in this format. `root` names the XML document
    /// element and is ignored for JSON.
    pub fn respond<T: Serialize>(self, root: &str, value: &T) -> Result<Response> {
        match self {
            Self::Json => Ok(Json(value).into_response()),
            Self::Xml => {
                let body = quick_xml::se::to_string_with_root(root, value)
                    .map_err(|e| AppError::Render(e.to_string()))?;
                Ok(([(header::CONTENT_TYPE, XML)], body).into_response())
            }
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ReturnType {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Self::from_header(parts.headers.get(RETURN_TYPE_HEADER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Entry {
        name: String,
        rooms: Vec<String>,
    }

    #[test]
    fn test_header_selection() {
        assert_eq!(ReturnType::from_header(None).unwrap(), ReturnType::Json);
        assert_eq!(
            ReturnType::from_header(Some(&HeaderValue::from_static("application/xml"))).unwrap(),
            ReturnType::Xml
        );
        assert!(matches!(
            ReturnType::from_header(Some(&HeaderValue::from_static("text/csv"))),
            Err(AppError::TypeNotAvailable(t)) if t == "text/csv"
        ));
    }

    #[test]
    fn test_xml_uses_root_name() {
        let entry = Entry {
            name: "10a".into(),
            rooms: vec!["101".into(), "102".into()],
        };
        let body = quick_xml::se::to_string_with_root("Class", &entry).unwrap();
        assert_eq!(body, "<Class><name>10a</name><rooms>101</rooms><rooms>102</rooms></Class>");

        let response = ReturnType::Xml.respond("Class", &entry).unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
    }
}
