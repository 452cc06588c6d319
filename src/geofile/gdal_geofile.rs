use anyhow::{anyhow, Context};
use gdal::vector::{FieldValue, LayerAccess};
use std::path::Path;

use super::feature::{Attribute, Feature, VectorLayer};
use crate::crs::crs_utils::spatial_ref_to_crs_definition;

/// Read one vector layer from any OGR-readable geofile.
///
/// # Arguments
/// * filepath - path of the dataset, e.g. a GeoPackage, GeoJSON or Shapefile.
/// * layer_name - the layer to read. Required when the dataset holds more than one layer.
///
/// # Returns
/// The layer with its CRS definition, field schema and all features. Features whose geometry type
/// cannot be converted are kept without a geometry.
pub fn read_layer_from_geofile(
    filepath: &Path,
    layer_name: Option<&str>,
) -> anyhow::Result<VectorLayer> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)
        .with_context(|| format!("Opening geofile {:?}", filepath))?;

    let mut layer = match layer_name {
        Some(layer_name) => dataset
            .layer_by_name(layer_name)
            .with_context(|| format!("Layer '{}' not found in {:?}", layer_name, filepath))?,
        None => {
            let layer_count = dataset.layer_count();
            if 1 != layer_count {
                return Err(anyhow!(
                    "Found {} layers in {:?}, a layer name is required unless there is exactly one.",
                    layer_count,
                    filepath
                ));
            }
            dataset.layer(0)?
        }
    };

    let crs = match layer.spatial_ref() {
        Ok(spatial_ref) => Some(spatial_ref_to_crs_definition(&spatial_ref)?),
        Err(_) => None,
    };
    let mut vector_layer = VectorLayer::new(&layer.name(), None);
    vector_layer.crs = crs;
    vector_layer.fields = layer.defn().fields().map(|field| field.name()).collect();

    log::info!(
        "Reading {} features from layer '{}' of {:?}",
        layer.feature_count(),
        vector_layer.name,
        filepath
    );
    for gdal_feature in layer.features() {
        let attributes = gdal_feature
            .fields()
            .map(|(name, value)| Attribute {
                name,
                value: value.map(field_value_to_string),
            })
            .collect();
        let mut feature = Feature {
            fid: gdal_feature.fid(),
            attributes,
            ..Default::default()
        };
        // A null geometry is reported as an error by GDAL, keep the feature without geometry.
        if let Ok(gdal_geometry) = gdal_feature.geometry_by_index(0) {
            match convert_geometry(gdal_geometry) {
                Ok(Some((geometry, heights))) => {
                    feature.geometry = Some(geometry);
                    feature.heights = heights;
                }
                Ok(None) => {}
                Err(err) => log::warn!(
                    "Feature {:?} of layer '{}' keeps no geometry: {}",
                    feature.fid,
                    vector_layer.name,
                    err
                ),
            }
        }
        vector_layer.features.push(feature);
    }
    Ok(vector_layer)
}

#[allow(unreachable_patterns)]
fn field_value_to_string(value: FieldValue) -> String {
    fn join<T: ToString>(values: Vec<T>) -> String {
        values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<String>>()
            .join(", ")
    }
    match value {
        FieldValue::StringValue(value) => value,
        FieldValue::IntegerValue(value) => value.to_string(),
        FieldValue::Integer64Value(value) => value.to_string(),
        FieldValue::RealValue(value) => value.to_string(),
        FieldValue::StringListValue(values) => values.join(", "),
        FieldValue::IntegerListValue(values) => join(values),
        FieldValue::Integer64ListValue(values) => join(values),
        FieldValue::RealListValue(values) => join(values),
        FieldValue::DateValue(value) => value.format("%Y-%m-%d").to_string(),
        FieldValue::DateTimeValue(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        other => format!("{:?}", other),
    }
}

/// Convert a GDAL geometry to a geo geometry plus its vertex heights if it has Z.
/// Returns `None` for empty geometries.
fn convert_geometry(
    geometry: &gdal::vector::Geometry,
) -> anyhow::Result<Option<(geo::Geometry, Option<Vec<f64>>)>> {
    if geometry.is_empty() {
        return Ok(None);
    }
    let has_z = unsafe { gdal_sys::OGR_GT_HasZ(geometry.geometry_type()) } != 0;
    let mut heights = Vec::new();
    let converted = convert_geometry_part(geometry, &mut heights)?;
    Ok(Some((converted, if has_z { Some(heights) } else { None })))
}

fn convert_geometry_part(
    geometry: &gdal::vector::Geometry,
    heights: &mut Vec<f64>,
) -> anyhow::Result<geo::Geometry> {
    use gdal::vector::OGRwkbGeometryType::*;
    let flat_type = unsafe { gdal_sys::OGR_GT_Flatten(geometry.geometry_type()) };
    let geometry = match flat_type {
        wkbPoint => {
            let (x, y, z) = geometry
                .get_point_vec()
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Point without coordinates"))?;
            heights.push(z);
            geo::Geometry::Point(geo::Point::new(x, y))
        }
        wkbLineString | wkbLinearRing => {
            geo::Geometry::LineString(convert_line_string(geometry, heights))
        }
        wkbPolygon => geo::Geometry::Polygon(convert_polygon(geometry, heights)?),
        wkbMultiPoint => {
            let mut points = Vec::new();
            for index in 0..geometry.geometry_count() {
                if let geo::Geometry::Point(point) =
                    convert_geometry_part(&geometry.get_geometry(index), heights)?
                {
                    points.push(point);
                }
            }
            geo::Geometry::MultiPoint(geo::MultiPoint::new(points))
        }
        wkbMultiLineString => geo::Geometry::MultiLineString(geo::MultiLineString::new(
            (0..geometry.geometry_count())
                .map(|index| convert_line_string(&geometry.get_geometry(index), heights))
                .collect(),
        )),
        wkbMultiPolygon => {
            let mut polygons = Vec::new();
            for index in 0..geometry.geometry_count() {
                polygons.push(convert_polygon(&geometry.get_geometry(index), heights)?);
            }
            geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons))
        }
        wkbGeometryCollection => {
            let mut members = Vec::new();
            for index in 0..geometry.geometry_count() {
                members.push(convert_geometry_part(&geometry.get_geometry(index), heights)?);
            }
            geo::Geometry::GeometryCollection(geo::GeometryCollection::new_from(members))
        }
        other => {
            return Err(anyhow!(
                "Unsupported geometry type {}",
                gdal::vector::geometry_type_to_name(other)
            ))
        }
    };
    Ok(geometry)
}

fn convert_line_string(geometry: &gdal::vector::Geometry, heights: &mut Vec<f64>) -> geo::LineString {
    geometry
        .get_point_vec()
        .into_iter()
        .map(|(x, y, z)| {
            heights.push(z);
            (x, y)
        })
        .collect()
}

fn convert_polygon(
    geometry: &gdal::vector::Geometry,
    heights: &mut Vec<f64>,
) -> anyhow::Result<geo::Polygon> {
    let ring_count = geometry.geometry_count();
    if 0 == ring_count {
        return Err(anyhow!("Polygon without an exterior ring"));
    }
    let exterior = convert_line_string(&geometry.get_geometry(0), heights);
    let interiors = (1..ring_count)
        .map(|index| convert_line_string(&geometry.get_geometry(index), heights))
        .collect();
    Ok(geo::Polygon::new(exterior, interiors))
}
