use super::geometry::geometry_to_kml_lines;
use super::markup::{cdata, escape_xml};

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

pub struct Placemark<'a> {
    pub name: String,
    /// HTML shown in the placemark balloon.
    pub description: String,
    /// WGS84 geometry. Placemarks without geometry are valid KML and show up in the list only.
    pub geometry: Option<&'a geo::Geometry>,
    pub heights: Option<&'a [f64]>,
}

/// Builds a KML document as a string: one `Document` holding placemarks, optionally grouped in folders.
pub struct KmlDocumentWriter {
    buffer: String,
    depth: usize,
    open_folders: usize,
    placemark_count: usize,
}

impl KmlDocumentWriter {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        let mut writer = Self {
            buffer: String::new(),
            depth: 0,
            open_folders: 0,
            placemark_count: 0,
        };
        writer.push(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        writer.push(&format!(r#"<kml xmlns="{}">"#, KML_NAMESPACE));
        writer.depth += 1;
        writer.push("<Document>");
        writer.depth += 1;
        writer.push(&format!("<name>{}</name>", escape_xml(name)));
        if let Some(description) = description {
            writer.push(&format!("<description>{}</description>", escape_xml(description)));
        }
        writer
    }

    fn push(&mut self, line: &str) {
        for _ in 0..self.depth {
            self.buffer.push_str("  ");
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
    }

    pub fn open_folder(&mut self, name: &str) {
        self.push("<Folder>");
        self.depth += 1;
        self.push(&format!("<name>{}</name>", escape_xml(name)));
        self.open_folders += 1;
    }

    pub fn close_folder(&mut self) {
        if 0 == self.open_folders {
            log::warn!("close_folder called without an open folder");
            return;
        }
        self.open_folders -= 1;
        self.depth -= 1;
        self.push("</Folder>");
    }

    pub fn write_placemark(&mut self, placemark: &Placemark) {
        self.push("<Placemark>");
        self.depth += 1;
        self.push(&format!("<name>{}</name>", escape_xml(&placemark.name)));
        if !placemark.description.is_empty() {
            self.push(&format!(
                "<description>{}</description>",
                cdata(&placemark.description)
            ));
        }
        if let Some(geometry) = placemark.geometry {
            for line in geometry_to_kml_lines(geometry, placemark.heights) {
                self.push(&line);
            }
        }
        self.depth -= 1;
        self.push("</Placemark>");
        self.placemark_count += 1;
    }

    pub fn placemark_count(&self) -> usize {
        self.placemark_count
    }

    /// Close any open folders and the document, returning the KML text.
    pub fn finish(mut self) -> String {
        while 0 < self.open_folders {
            self.close_folder();
        }
        self.depth -= 1;
        self.push("</Document>");
        self.depth -= 1;
        self.push("</kml>");
        self.buffer
    }
}
