use geo::CoordsIter;

const INDENT: &str = "  ";

/// Turn a geometry into KML geometry elements, one line per entry with relative indentation.
///
/// # Arguments
/// * geometry - geometry in WGS84 lon/lat.
/// * heights - optional per-vertex heights in `CoordsIter` order. Written as absolute altitudes when
///     given, otherwise every altitude is 0. Ignored with a warning if the count does not match the
///     geometry's vertex count.
pub fn geometry_to_kml_lines(geometry: &geo::Geometry, heights: Option<&[f64]>) -> Vec<String> {
    let geometry = normalize_geometry(geometry);
    let heights = match heights {
        Some(heights) if heights.len() == geometry.coords_iter().count() => Some(heights),
        Some(heights) => {
            log::warn!(
                "Got {} heights for a geometry with {} vertices, writing altitude 0",
                heights.len(),
                geometry.coords_iter().count()
            );
            None
        }
        None => None,
    };
    let mut writer = GeometryWriter {
        lines: Vec::new(),
        heights,
        cursor: 0,
    };
    writer.write(&geometry, 0);
    writer.lines
}

/// Replace the geo-only shapes which have no KML counterpart with their general forms.
fn normalize_geometry(geometry: &geo::Geometry) -> geo::Geometry {
    match geometry {
        geo::Geometry::Line(line) => {
            geo::Geometry::LineString(geo::LineString::from(vec![line.start, line.end]))
        }
        geo::Geometry::Rect(rect) => geo::Geometry::Polygon(rect.to_polygon()),
        geo::Geometry::Triangle(triangle) => geo::Geometry::Polygon(triangle.to_polygon()),
        geo::Geometry::GeometryCollection(collection) => geo::Geometry::GeometryCollection(
            geo::GeometryCollection::new_from(collection.iter().map(normalize_geometry).collect()),
        ),
        other => other.clone(),
    }
}

struct GeometryWriter<'a> {
    lines: Vec<String>,
    heights: Option<&'a [f64]>,
    cursor: usize,
}

impl<'a> GeometryWriter<'a> {
    fn push(&mut self, depth: usize, line: &str) {
        self.lines.push(format!("{}{}", INDENT.repeat(depth), line));
    }

    fn write(&mut self, geometry: &geo::Geometry, depth: usize) {
        match geometry {
            geo::Geometry::Point(point) => self.write_point(point, depth),
            geo::Geometry::LineString(line_string) => self.write_line_string(line_string, depth),
            geo::Geometry::Polygon(polygon) => self.write_polygon(polygon, depth),
            geo::Geometry::MultiPoint(multi_point) => {
                self.push(depth, "<MultiGeometry>");
                for point in multi_point.iter() {
                    self.write_point(point, depth + 1);
                }
                self.push(depth, "</MultiGeometry>");
            }
            geo::Geometry::MultiLineString(multi_line_string) => {
                self.push(depth, "<MultiGeometry>");
                for line_string in multi_line_string.iter() {
                    self.write_line_string(line_string, depth + 1);
                }
                self.push(depth, "</MultiGeometry>");
            }
            geo::Geometry::MultiPolygon(multi_polygon) => {
                self.push(depth, "<MultiGeometry>");
                for polygon in multi_polygon.iter() {
                    self.write_polygon(polygon, depth + 1);
                }
                self.push(depth, "</MultiGeometry>");
            }
            geo::Geometry::GeometryCollection(collection) => {
                self.push(depth, "<MultiGeometry>");
                for member in collection.iter() {
                    self.write(member, depth + 1);
                }
                self.push(depth, "</MultiGeometry>");
            }
            // Removed by normalize_geometry.
            geo::Geometry::Line(_) | geo::Geometry::Rect(_) | geo::Geometry::Triangle(_) => {
                self.write(&normalize_geometry(geometry), depth)
            }
        }
    }

    fn write_altitude_mode(&mut self, depth: usize) {
        if self.heights.is_some() {
            self.push(depth, "<altitudeMode>absolute</altitudeMode>");
        }
    }

    fn coordinates(&mut self, coords: impl Iterator<Item = (f64, f64)>) -> String {
        let mut tuples = Vec::new();
        for (x, y) in coords {
            let altitude = match self.heights {
                Some(heights) => heights[self.cursor],
                None => 0.0,
            };
            self.cursor += 1;
            tuples.push(format!("{},{},{}", x, y, altitude));
        }
        format!("<coordinates>{}</coordinates>", tuples.join(" "))
    }

    fn write_point(&mut self, point: &geo::Point, depth: usize) {
        self.push(depth, "<Point>");
        self.write_altitude_mode(depth + 1);
        let coordinates = self.coordinates(std::iter::once((point.x(), point.y())));
        self.push(depth + 1, &coordinates);
        self.push(depth, "</Point>");
    }

    fn write_line_string(&mut self, line_string: &geo::LineString, depth: usize) {
        self.push(depth, "<LineString>");
        self.write_altitude_mode(depth + 1);
        let coordinates = self.coordinates(line_string.coords().map(|coord| (coord.x, coord.y)));
        self.push(depth + 1, &coordinates);
        self.push(depth, "</LineString>");
    }

    fn write_ring(&mut self, boundary: &str, ring: &geo::LineString, depth: usize) {
        self.push(depth, &format!("<{}>", boundary));
        self.push(depth + 1, "<LinearRing>");
        let coordinates = self.coordinates(ring.coords().map(|coord| (coord.x, coord.y)));
        self.push(depth + 2, &coordinates);
        self.push(depth + 1, "</LinearRing>");
        self.push(depth, &format!("</{}>", boundary));
    }

    fn write_polygon(&mut self, polygon: &geo::Polygon, depth: usize) {
        self.push(depth, "<Polygon>");
        self.write_altitude_mode(depth + 1);
        self.write_ring("outerBoundaryIs", polygon.exterior(), depth + 1);
        for interior in polygon.interiors() {
            self.write_ring("innerBoundaryIs", interior, depth + 1);
        }
        self.push(depth, "</Polygon>");
    }
}
