pub mod crs_utils;
pub mod wgs84;
