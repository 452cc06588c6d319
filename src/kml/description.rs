use super::markup::escape_xml;
use crate::geofile::feature::Feature;

/// Which attributes a placemark description lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionAttributes {
    /// Every attribute of the feature, in schema order.
    All,
    /// Only the attribute the placemark is named after.
    NameOnly,
}

/// Name a placemark after the first non-null attribute, skipping `skip_field` (the photo path
/// field). Falls back to "Feature <fid>".
///
/// # Returns
/// The name and the attribute it was taken from, if any.
pub fn placemark_name<'a>(
    feature: &'a Feature,
    skip_field: Option<&str>,
    fallback_index: usize,
) -> (String, Option<&'a str>) {
    feature
        .attributes
        .iter()
        .filter(|attribute| Some(attribute.name.as_str()) != skip_field)
        .find_map(|attribute| {
            attribute
                .value
                .as_ref()
                .map(|value| (value.clone(), Some(attribute.name.as_str())))
        })
        .unwrap_or_else(|| {
            let id = feature.fid.unwrap_or(fallback_index as u64);
            (format!("Feature {}", id), None)
        })
}

/// Build the HTML shown in a placemark balloon: an attribute table, then the photo if there is one.
pub fn feature_description(
    feature: &Feature,
    attributes: DescriptionAttributes,
    name_field: Option<&str>,
    photo_href: Option<&str>,
) -> String {
    let rows: Vec<(&str, Option<&str>)> = feature
        .attributes
        .iter()
        .filter(|attribute| match attributes {
            DescriptionAttributes::All => true,
            DescriptionAttributes::NameOnly => Some(attribute.name.as_str()) == name_field,
        })
        .map(|attribute| (attribute.name.as_str(), attribute.value.as_deref()))
        .collect();

    let mut description = String::new();
    if !rows.is_empty() {
        description.push_str(&attribute_table(&rows));
        description.push_str("<br/>");
    }
    if let Some(photo_href) = photo_href {
        description.push_str(&format!(
            "<img src=\"{}\" style=\"max-width:720px;\" />",
            escape_xml(photo_href)
        ));
    }
    description
}

pub fn attribute_table(rows: &[(&str, Option<&str>)]) -> String {
    let mut table = String::from(
        "<table border='1' style='border-collapse: collapse;'><tr><th>Attribute</th><th>Value</th></tr>",
    );
    for (name, value) in rows {
        table.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_xml(name),
            escape_xml(value.unwrap_or(""))
        ));
    }
    table.push_str("</table>");
    table
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{feature_description, placemark_name, DescriptionAttributes};
    use crate::geofile::feature::Feature;

    fn feature() -> Feature {
        Feature::default()
            .with_attribute("photo", Some("C:\\photos\\a.jpg"))
            .with_attribute("comment", None)
            .with_attribute("name", Some("Gate <north>"))
            .with_attribute("depth", Some("12.5"))
    }

    #[rstest]
    fn test_placemark_name_skips_photo_and_null_fields() {
        let feature = feature();
        let (name, field) = placemark_name(&feature, Some("photo"), 0);
        assert_eq!(name, "Gate <north>");
        assert_eq!(field, Some("name"));
    }

    #[rstest]
    #[case(Some(7), 3, "Feature 7")]
    #[case(None, 3, "Feature 3")]
    fn test_placemark_name_fallback(
        #[case] fid: Option<u64>,
        #[case] index: usize,
        #[case] expected: &str,
    ) {
        let mut feature = Feature::default().with_attribute("comment", None);
        feature.fid = fid;
        assert_eq!(placemark_name(&feature, None, index), (expected.to_string(), None));
    }

    #[rstest]
    fn test_all_attributes_are_rows() {
        let feature = feature();
        let description =
            feature_description(&feature, DescriptionAttributes::All, Some("name"), None);
        for attribute in &feature.attributes {
            assert!(description.contains(&format!("<tr><td>{}</td>", attribute.name)));
        }
        assert!(description.contains("<td>Gate &lt;north&gt;</td>"));
        assert!(description.contains("<tr><td>comment</td><td></td></tr>"));
        assert!(!description.contains("<img"));
    }

    #[rstest]
    fn test_name_only_with_photo() {
        let feature = feature();
        let description = feature_description(
            &feature,
            DescriptionAttributes::NameOnly,
            Some("name"),
            Some("Photos/a.jpg"),
        );
        assert_eq!(description.matches("<tr><td>").count(), 1);
        assert!(description.contains("<tr><td>name</td>"));
        assert!(description.ends_with("<img src=\"Photos/a.jpg\" style=\"max-width:720px;\" />"));
    }

    #[rstest]
    fn test_name_only_without_name_field_has_no_table() {
        let feature = Feature::default().with_attribute("comment", None);
        let description =
            feature_description(&feature, DescriptionAttributes::NameOnly, None, None);
        assert_eq!(description, "");
    }
}
