pub mod cancel;
pub mod error;
pub mod multi_layer;
pub mod single_layer;
#[cfg(test)]
pub mod test_utils;

use indicatif::ProgressBar;
use std::path::PathBuf;

use self::cancel::CancelFlag;
use crate::{
    geofile::feature::VectorLayer,
    kml::{
        description::{feature_description, placemark_name, DescriptionAttributes},
        document::{KmlDocumentWriter, Placemark},
    },
    kmz::photos::PhotoCatalog,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub output_path: PathBuf,
    pub placemark_count: usize,
    pub photo_count: usize,
}

/// Where the photos of a layer come from.
pub struct PhotoSource<'a> {
    pub field: &'a str,
    pub catalog: &'a mut PhotoCatalog,
}

/// Write one placemark per feature of a WGS84 layer, checking for cancellation before each one.
fn write_layer_placemarks(
    document: &mut KmlDocumentWriter,
    layer: &VectorLayer,
    attributes: DescriptionAttributes,
    mut photos: Option<PhotoSource>,
    cancel: &CancelFlag,
) -> anyhow::Result<()> {
    let bar = ProgressBar::new(layer.features.len() as u64);
    for (index, feature) in layer.features.iter().enumerate() {
        cancel.check()?;
        let photo_href = match photos.as_mut() {
            Some(photos) => feature
                .attribute_value(photos.field)
                .and_then(|raw_path| photos.catalog.register(raw_path)),
            None => None,
        };
        let skip_field = photos.as_ref().map(|photos| photos.field);
        let (name, name_field) = placemark_name(feature, skip_field, index);
        let description =
            feature_description(feature, attributes, name_field, photo_href.as_deref());
        document.write_placemark(&Placemark {
            name,
            description,
            geometry: feature.geometry.as_ref(),
            heights: feature.heights.as_deref(),
        });
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(())
}
