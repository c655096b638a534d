use crate::AppState;
use crate::error::ServerError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use headers::HeaderMapExt;
use headers_accept::Accept;
use mediatype::names::{APPLICATION, HTML, JSON, TEXT, XML};
use mediatype::{MediaType, Name};

/// The result representations the query endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// `application/sparql-results+json`, extended with `next`/`stats`.
    W3cJson,
    /// `application/sparql-results+xml`; the continuation travels in a
    /// response header.
    W3cXml,
    /// The compact `application/json` page form.
    CompactJson,
    /// A human-readable page.
    Html,
}

impl ResponseFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            Self::W3cJson => "application/sparql-results+json",
            Self::W3cXml => "application/sparql-results+xml",
            Self::CompactJson => "application/json",
            Self::Html => "text/html",
        }
    }
}

/// Handles the content negotiation for the query endpoint.
impl FromRequestParts<AppState> for ResponseFormat {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        static MEDIA_TYPES: [MediaType<'_>; 5] = [
            MediaType::new(APPLICATION, JSON),
            MediaType::from_parts(
                APPLICATION,
                Name::new_unchecked("sparql-results"),
                Some(Name::new_unchecked("json")),
                &[],
            ),
            MediaType::from_parts(
                APPLICATION,
                Name::new_unchecked("sparql-results"),
                Some(Name::new_unchecked("xml")),
                &[],
            ),
            MediaType::new(APPLICATION, XML),
            MediaType::new(TEXT, HTML),
        ];
        static DEFAULT_MEDIA_TYPE: MediaType<'_> = MediaType::from_parts(
            APPLICATION,
            Name::new_unchecked("sparql-results"),
            Some(Name::new_unchecked("json")),
            &[],
        );

        let accept = parts.headers.typed_get::<Accept>();
        let media_type = content_negotiation(
            accept,
            &MEDIA_TYPES,
            &DEFAULT_MEDIA_TYPE,
            "application/sparql-results+json or text/html",
        )?;

        Ok(match media_type.to_string().as_str() {
            "application/sparql-results+json" => Self::W3cJson,
            "application/sparql-results+xml" | "application/xml" => Self::W3cXml,
            "application/json" => Self::CompactJson,
            "text/html" => Self::Html,
            other => {
                return Err(ServerError::ContentNegotiation(format!(
                    "Could not convert negotiated media type '{other}' to internal representation."
                )));
            }
        })
    }
}

fn content_negotiation<'media>(
    accept: Option<Accept>,
    available: &'media [MediaType<'media>],
    default: &'media MediaType<'media>,
    example: &str,
) -> Result<MediaType<'media>, ServerError> {
    let Some(accept) = accept else {
        return Ok(default.clone());
    };

    match accept.negotiate(available) {
        None => Err(ServerError::ContentNegotiation(format!(
            "The accept header does not provide any accepted format like {example}."
        ))),
        Some(result) => Ok(result.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    static MEDIA_TYPES: [MediaType<'_>; 2] = [
        MediaType::new(APPLICATION, JSON),
        MediaType::new(TEXT, HTML),
    ];
    static DEFAULT_MEDIA_TYPE: MediaType<'_> = MediaType::new(APPLICATION, JSON);

    fn accept(value: &'static str) -> Option<Accept> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static(value));
        headers.typed_get::<Accept>()
    }

    #[test]
    fn no_accept_returns_default() {
        let result =
            content_negotiation(None, &MEDIA_TYPES, &DEFAULT_MEDIA_TYPE, "json");
        assert_eq!(result.unwrap(), MediaType::new(APPLICATION, JSON));
    }

    #[test]
    fn negotiation_picks_a_match() {
        let result = content_negotiation(
            accept("text/html"),
            &MEDIA_TYPES,
            &DEFAULT_MEDIA_TYPE,
            "json",
        );
        assert_eq!(result.unwrap(), MediaType::new(TEXT, HTML));
    }

    #[test]
    fn negotiation_rejects_unavailable_formats() {
        let result = content_negotiation(
            accept("image/png"),
            &MEDIA_TYPES,
            &DEFAULT_MEDIA_TYPE,
            "json",
        );
        assert!(result.is_err());
    }
}
