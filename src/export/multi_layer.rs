use std::path::Path;

use super::{cancel::CancelFlag, error::ExportError, write_layer_placemarks, ExportSummary};
use crate::{
    crs::wgs84::reproject_layer_to_wgs84,
    geofile::feature::VectorLayer,
    kml::{description::DescriptionAttributes, document::KmlDocumentWriter},
    kmz::archive::KmzArchive,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeParams {
    /// Name of the KML document. Defaults to the output file stem.
    pub name: Option<String>,
    pub include_all_attributes: bool,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            name: None,
            include_all_attributes: true,
        }
    }
}

/// Merge layers into a single KMZ, one KML folder per layer in the given order. Layers may have
/// different geometry types.
pub fn export_layers_merged(
    layers: Vec<VectorLayer>,
    params: &MergeParams,
    output_path: &Path,
    cancel: &CancelFlag,
) -> anyhow::Result<ExportSummary> {
    if layers.is_empty() {
        return Err(ExportError::NoLayers.into());
    }
    let mut archive = KmzArchive::create(output_path)?;

    let document_name = match &params.name {
        Some(name) => name.clone(),
        None => output_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let attributes = if params.include_all_attributes {
        DescriptionAttributes::All
    } else {
        DescriptionAttributes::NameOnly
    };
    let layer_count = layers.len();
    let mut document = KmlDocumentWriter::new(&document_name, None);
    for (index, layer) in layers.into_iter().enumerate() {
        cancel.check()?;
        log::info!(
            "Processing layer {}/{}: '{}' with {} features",
            index + 1,
            layer_count,
            layer.name,
            layer.features.len()
        );
        let layer = reproject_layer_to_wgs84(layer)?;
        document.open_folder(&layer.name);
        write_layer_placemarks(&mut document, &layer, attributes, None, cancel)?;
        document.close_folder();
    }
    let placemark_count = document.placemark_count();
    archive.add_document(&document.finish())?;
    let output_path = archive.finish()?;

    log::info!(
        "KMZ file created at {:?} with {} layers and {} placemarks",
        output_path,
        layer_count,
        placemark_count
    );
    Ok(ExportSummary {
        output_path,
        placemark_count,
        photo_count: 0,
    })
}
