//! Stage 1: layering garments onto the person image.

use crate::assets::{ImageRef, InlineImage};
use crate::collaborators::Compositor;
use crate::errors::CompositionError;

/// Applies `garments` to `person` one at a time.
///
/// The first call dresses `person`; every later call dresses the previous
/// output. Calls never overlap. A failure is tagged with the index of the
/// garment being applied.
pub async fn compose_layers(
    compositor: &dyn Compositor,
    person: &ImageRef,
    garments: &[ImageRef],
) -> Result<InlineImage, CompositionError> {
    let mut current: Option<InlineImage> = None;

    for (layer, garment) in garments.iter().enumerate() {
        let base = match current.take() {
            Some(image) => ImageRef::Inline(image),
            None => person.clone(),
        };

        let composed = compositor
            .compose(&base, garment)
            .await
            .map_err(|err| err.at_layer(layer))?;

        tracing::debug!(
            layer,
            garment = %garment.describe(),
            bytes = composed.len(),
            "Garment applied"
        );
        current = Some(composed);
    }

    current.ok_or_else(|| CompositionError::new("no garments to apply"))
}
