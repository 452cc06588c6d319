use std::path::{Path, PathBuf};

use super::{
    cancel::CancelFlag, error::ExportError, write_layer_placemarks, ExportSummary, PhotoSource,
};
use crate::{
    crs::wgs84::reproject_layer_to_wgs84,
    geofile::feature::VectorLayer,
    kml::{description::DescriptionAttributes, document::KmlDocumentWriter},
    kmz::{archive::KmzArchive, photos::PhotoCatalog},
};

pub const DEFAULT_LAYER_NAME: &str = "Layer with Photos";

#[derive(Debug, Clone, PartialEq)]
pub struct LayerWithPhotosParams {
    /// Attribute holding the photo file path of each feature.
    pub photo_field: String,
    /// Name of the KML document.
    pub name: String,
    /// List all attributes in the placemark descriptions, otherwise only the one naming the placemark.
    pub include_all_attributes: bool,
    /// Directory that relative photo paths are resolved against.
    pub photo_base_dir: Option<PathBuf>,
}

impl LayerWithPhotosParams {
    pub fn new(photo_field: &str) -> Self {
        Self {
            photo_field: photo_field.to_string(),
            name: DEFAULT_LAYER_NAME.to_string(),
            include_all_attributes: true,
            photo_base_dir: None,
        }
    }
}

/// Export a layer to a KMZ, embedding the photo referenced by each feature.
///
/// Features whose photo is missing or unreadable are exported without an image. The KMZ only
/// replaces `output_path` once it is complete, a failed or cancelled export leaves nothing behind.
pub fn export_layer_with_photos(
    layer: VectorLayer,
    params: &LayerWithPhotosParams,
    output_path: &Path,
    cancel: &CancelFlag,
) -> anyhow::Result<ExportSummary> {
    if !layer.has_field(&params.photo_field) {
        return Err(ExportError::MissingPhotoField {
            field: params.photo_field.clone(),
            layer: layer.name.clone(),
        }
        .into());
    }
    let mut archive = KmzArchive::create(output_path)?;
    let layer = reproject_layer_to_wgs84(layer)?;

    log::info!(
        "Exporting {} features of layer '{}' with photos from field \"{}\"",
        layer.features.len(),
        layer.name,
        params.photo_field
    );
    let mut catalog = PhotoCatalog::new(params.photo_base_dir.clone());
    let mut document = KmlDocumentWriter::new(&params.name, Some("Layer exported with photos"));
    let attributes = if params.include_all_attributes {
        DescriptionAttributes::All
    } else {
        DescriptionAttributes::NameOnly
    };
    write_layer_placemarks(
        &mut document,
        &layer,
        attributes,
        Some(PhotoSource {
            field: &params.photo_field,
            catalog: &mut catalog,
        }),
        cancel,
    )?;
    let placemark_count = document.placemark_count();
    archive.add_document(&document.finish())?;

    log::info!("Copying {} photos", catalog.photos().len());
    let mut photo_count = 0;
    for photo in catalog.photos() {
        cancel.check()?;
        if archive.add_file(&photo.archive_path, &photo.source)? {
            photo_count += 1;
        }
    }
    let output_path = archive.finish()?;

    log::info!(
        "KMZ file created at {:?} with {} placemarks and {} photos",
        output_path,
        placemark_count,
        photo_count
    );
    Ok(ExportSummary {
        output_path,
        placemark_count,
        photo_count,
    })
}
