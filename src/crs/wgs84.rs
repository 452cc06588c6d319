use anyhow::anyhow;
use geo::CoordsIter;
use proj::Transform;

use super::crs_utils::{is_wgs84, wgs84_authority_string};
use crate::geofile::feature::VectorLayer;

pub fn within_wgs84_bounds(geometry: &geo::Geometry) -> bool {
    geometry.coords_iter().all(|coord| {
        coord.x.is_finite()
            && coord.y.is_finite()
            && (-180.0..=180.0).contains(&coord.x)
            && (-90.0..=90.0).contains(&coord.y)
    })
}

/// Project all geometries of the layer to WGS84 lon/lat, which is the only CRS KML supports.
///
/// A layer without a CRS is assumed to be WGS84 already. Geometries which fail to project, or whose
/// coordinates end up outside the WGS84 bounds, are removed from their feature so that the feature
/// can still be exported without a location.
pub fn reproject_layer_to_wgs84(mut layer: VectorLayer) -> anyhow::Result<VectorLayer> {
    let source_crs = layer.crs.clone();
    match source_crs.as_deref() {
        None => log::warn!(
            "Layer '{}' does not declare a CRS, assuming WGS84 coordinates",
            layer.name
        ),
        Some(crs) if is_wgs84(crs) => {
            log::debug!("Layer '{}' is already in WGS84", layer.name)
        }
        Some(crs) => {
            log::info!(
                "Projecting layer '{}' from {} to {}",
                layer.name,
                crs,
                wgs84_authority_string()
            );
            let projection = proj::Proj::new_known_crs(crs, &wgs84_authority_string(), None)
                .map_err(|err| {
                    anyhow!("Could not create projection from {} to WGS84, {}", crs, err)
                })?;
            for feature in layer.features.iter_mut() {
                if let Some(geometry) = feature.geometry.take() {
                    match geometry.transformed(&projection) {
                        Ok(projected) => feature.geometry = Some(projected),
                        Err(err) => {
                            log::warn!(
                                "Could not project geometry of feature {:?}, {}",
                                feature.fid,
                                err
                            );
                            feature.heights = None;
                        }
                    }
                }
            }
        }
    }

    for feature in layer.features.iter_mut() {
        let out_of_bounds = match &feature.geometry {
            Some(geometry) => !within_wgs84_bounds(geometry),
            None => false,
        };
        if out_of_bounds {
            log::warn!(
                "Feature {:?} of layer '{}' is outside of the WGS84 bounds, exporting it without geometry",
                feature.fid,
                layer.name
            );
            feature.geometry = None;
            feature.heights = None;
        }
    }
    layer.crs = Some(wgs84_authority_string());
    Ok(layer)
}
