/// A single attribute of a feature. The value is already rendered for display, `None` is a null value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub fid: Option<u64>,
    /// XY geometry. `None` for features without a (supported) geometry.
    pub geometry: Option<geo::Geometry>,
    /// Per-vertex heights when the source geometry has Z, in the order the vertices are visited by
    /// `geo::CoordsIter`: polygon exterior before interiors, collection members in order.
    pub heights: Option<Vec<f64>>,
    /// Attributes in schema order.
    pub attributes: Vec<Attribute>,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            geometry: Some(value),
            ..Default::default()
        }
    }
}

impl Feature {
    pub fn with_attribute(mut self, name: &str, value: Option<&str>) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .and_then(|attribute| attribute.value.as_deref())
    }
}

/// An in-memory vector layer.
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    pub name: String,
    /// CRS definition understood by PROJ, e.g. "EPSG:3857" or a WKT string. `None` if the source
    /// did not declare one.
    pub crs: Option<String>,
    /// Field names of the attribute schema, in order.
    pub fields: Vec<String>,
    pub features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new(name: &str, crs: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            crs: crs.map(str::to_string),
            ..Default::default()
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    /// Append a feature, registering any attribute names not yet in the schema.
    pub fn push_feature(&mut self, feature: Feature) {
        for attribute in &feature.attributes {
            if !self.has_field(&attribute.name) {
                self.fields.push(attribute.name.clone());
            }
        }
        self.features.push(feature);
    }
}
