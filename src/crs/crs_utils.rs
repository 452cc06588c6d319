pub type EpsgCode = u32;

pub const WGS84_EPSG_CODE: EpsgCode = 4326;

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}

pub fn wgs84_authority_string() -> String {
    epsg_code_to_authority_string(WGS84_EPSG_CODE)
}

/// Describe a GDAL spatial reference in a form PROJ accepts. Prefers the "AUTHORITY:CODE" string, and
/// falls back to WKT for CRSs without an authority code (e.g. ones defined inline in a Shapefile .prj).
pub fn spatial_ref_to_crs_definition(
    spatial_ref: &gdal::spatial_ref::SpatialRef,
) -> anyhow::Result<String> {
    match (spatial_ref.auth_name(), spatial_ref.auth_code()) {
        (Ok(auth_name), Ok(auth_code)) => Ok(format!("{}:{}", auth_name, auth_code)),
        _ => Ok(spatial_ref.to_wkt()?),
    }
}

/// Whether a CRS definition names WGS84 lon/lat, i.e. coordinates can be written to KML unchanged.
pub fn is_wgs84(crs_definition: &str) -> bool {
    let normalized = crs_definition.trim().to_ascii_uppercase().replace(' ', "");
    normalized == wgs84_authority_string() || normalized == "OGC:CRS84" || normalized == "WGS84"
}
