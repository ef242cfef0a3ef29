//! Try-on requests and their wire shapes.

use crate::assets::ImageRef;
use crate::collaborators::StoredBlob;
use crate::core::GenerationId;
use crate::errors::InputError;
use serde::{Deserialize, Serialize};

/// Field name of the person image in requests.
pub const PERSON_FIELD: &str = "personImageRef";
/// Field name of the garment list in requests.
pub const GARMENTS_FIELD: &str = "garmentImageRefs";

/// A validated try-on request.
///
/// Garments are applied in order; when two garments cover the same slot the
/// later one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryOnRequest {
    person: ImageRef,
    garments: Vec<ImageRef>,
}

impl TryOnRequest {
    /// Creates a request from parsed references.
    pub fn new(person: ImageRef, garments: Vec<ImageRef>) -> Result<Self, InputError> {
        if garments.is_empty() {
            return Err(InputError::missing(GARMENTS_FIELD));
        }
        Ok(Self { person, garments })
    }

    /// Parses a request from caller-supplied strings.
    pub fn parse<S: AsRef<str>>(person: &str, garments: &[S]) -> Result<Self, InputError> {
        let person = ImageRef::parse(person, PERSON_FIELD)?;
        let garments = garments
            .iter()
            .enumerate()
            .map(|(i, g)| ImageRef::parse(g.as_ref(), &format!("{GARMENTS_FIELD}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(person, garments)
    }

    /// Returns the person image.
    #[must_use]
    pub fn person(&self) -> &ImageRef {
        &self.person
    }

    /// Returns the garments in application order.
    #[must_use]
    pub fn garments(&self) -> &[ImageRef] {
        &self.garments
    }
}

/// JSON body of a try-on request.
///
/// Also accepts the older `person_image_gcs_uri` / `apparel_gcs_uris` names.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnPayload {
    /// Person image reference.
    #[serde(default, alias = "person_image_gcs_uri")]
    pub person_image_ref: Option<String>,
    /// Garment image references, in application order.
    #[serde(default, alias = "apparel_gcs_uris")]
    pub garment_image_refs: Vec<String>,
}

impl TryFrom<TryOnPayload> for TryOnRequest {
    type Error = InputError;

    fn try_from(payload: TryOnPayload) -> Result<Self, Self::Error> {
        let person = payload
            .person_image_ref
            .ok_or_else(|| InputError::missing(PERSON_FIELD))?;
        Self::parse(&person, &payload.garment_image_refs)
    }
}

/// What `submit` returns once stage 1 has finished.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Public URL of the composite.
    pub image_url: String,
    /// Token for polling the video.
    pub generation_id: GenerationId,
    /// The stored composite.
    #[serde(skip)]
    pub artifact: StoredBlob,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::GcsUri;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_keeps_garment_order() {
        let request =
            TryOnRequest::parse("gs://b/p.png", &["gs://b/shirt.png", "gs://b/jacket.png"]).unwrap();
        assert_eq!(request.person(), &ImageRef::Gcs(GcsUri::new("b", "p.png")));
        assert_eq!(
            request.garments(),
            &[
                ImageRef::Gcs(GcsUri::new("b", "shirt.png")),
                ImageRef::Gcs(GcsUri::new("b", "jacket.png")),
            ]
        );
    }

    #[test]
    fn test_empty_garments_rejected() {
        let err = TryOnRequest::parse::<&str>("gs://b/p.png", &[]).unwrap_err();
        assert_eq!(err, InputError::missing(GARMENTS_FIELD));
    }

    #[test]
    fn test_blank_person_rejected() {
        let err = TryOnRequest::parse("", &["gs://b/shirt.png"]).unwrap_err();
        assert_eq!(err, InputError::missing(PERSON_FIELD));
    }

    #[test]
    fn test_blank_garment_names_its_index() {
        let err = TryOnRequest::parse("gs://b/p.png", &["gs://b/shirt.png", " "]).unwrap_err();
        assert_eq!(err, InputError::missing("garmentImageRefs[1]"));
    }

    #[test]
    fn test_payload_camel_case() {
        let payload: TryOnPayload = serde_json::from_str(
            r#"{"personImageRef": "gs://b/p.png", "garmentImageRefs": ["gs://b/s.png"]}"#,
        )
        .unwrap();
        let request = TryOnRequest::try_from(payload).unwrap();
        assert_eq!(request.garments().len(), 1);
    }

    #[test]
    fn test_payload_legacy_names() {
        let payload: TryOnPayload = serde_json::from_str(
            r#"{"person_image_gcs_uri": "https://storage.googleapis.com/b/p.png", "apparel_gcs_uris": ["gs://b/s.png"]}"#,
        )
        .unwrap();
        let request = TryOnRequest::try_from(payload).unwrap();
        assert_eq!(request.person(), &ImageRef::Gcs(GcsUri::new("b", "p.png")));
    }

    #[test]
    fn test_payload_missing_person() {
        let payload: TryOnPayload =
            serde_json::from_str(r#"{"garmentImageRefs": ["gs://b/s.png"]}"#).unwrap();
        assert_eq!(
            TryOnRequest::try_from(payload).unwrap_err(),
            InputError::missing(PERSON_FIELD)
        );
    }

    #[test]
    fn test_submission_serializes_camel_case() {
        let submission = Submission {
            image_url: "https://storage.googleapis.com/b/vto/a.png".into(),
            generation_id: GenerationId::from("g-1"),
            artifact: StoredBlob {
                key: "vto/a.png".into(),
                uri: "gs://b/vto/a.png".into(),
                public_url: "https://storage.googleapis.com/b/vto/a.png".into(),
                content_type: "image/png".into(),
                size: 3,
                md5_hash: None,
            },
        };
        let value = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "imageUrl": "https://storage.googleapis.com/b/vto/a.png",
                "generationId": "g-1"
            })
        );
    }
}
