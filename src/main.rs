extern crate log;
pub mod crs;
pub mod export;
pub mod geofile;
pub mod kml;
pub mod kmz;
use crate::export::cancel::CancelFlag;
use crate::export::multi_layer::{export_layers_merged, MergeParams};
use crate::export::single_layer::{
    export_layer_with_photos, LayerWithPhotosParams, DEFAULT_LAYER_NAME,
};
use crate::export::ExportSummary;
use crate::geofile::feature::VectorLayer;
use crate::geofile::gdal_geofile::read_layer_from_geofile;
use anyhow::{anyhow, Context};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Export vector layers to KMZ files, optionally embedding photos.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,

    /// Output KMZ path, overrides `output_kmz_path` of the config file.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize, Debug, PartialEq)]
struct LayerSource {
    filepath: PathBuf,
    /// Layer to read from a dataset holding several layers.
    layer_name: Option<String>,
    /// Name to show in the KMZ instead of the layer's own name.
    display_name: Option<String>,
}

#[derive(Deserialize, Debug, PartialEq)]
enum ExportConfig {
    LayerWithPhotos {
        layer: LayerSource,
        photo_field: String,
        name: Option<String>,
        include_all_attributes: Option<bool>,
        /// Relative photo paths are resolved against this directory, defaults to the directory of
        /// the layer's geofile.
        photo_base_dir: Option<PathBuf>,
    },
    MultipleLayers {
        layers: Vec<LayerSource>,
        name: Option<String>,
        include_all_attributes: Option<bool>,
    },
}

#[derive(Deserialize, Debug, PartialEq)]
struct Config {
    output_kmz_path: PathBuf,
    export: ExportConfig,
}

fn read_layer(source: &LayerSource) -> anyhow::Result<VectorLayer> {
    let mut layer = read_layer_from_geofile(&source.filepath, source.layer_name.as_deref())
        .with_context(|| format!("Reading layer from {:?}", source.filepath))?;
    if let Some(display_name) = &source.display_name {
        layer.name = display_name.clone();
    }
    log::info!("Read {} features from '{}'", layer.features.len(), layer.name);
    Ok(layer)
}

fn run_export(config: &Config, cancel: &CancelFlag) -> anyhow::Result<ExportSummary> {
    match &config.export {
        ExportConfig::LayerWithPhotos {
            layer,
            photo_field,
            name,
            include_all_attributes,
            photo_base_dir,
        } => {
            let params = LayerWithPhotosParams {
                photo_field: photo_field.clone(),
                name: name.clone().unwrap_or_else(|| DEFAULT_LAYER_NAME.to_string()),
                include_all_attributes: include_all_attributes.unwrap_or(true),
                photo_base_dir: photo_base_dir
                    .clone()
                    .or_else(|| layer.filepath.parent().map(Path::to_path_buf)),
            };
            export_layer_with_photos(read_layer(layer)?, &params, &config.output_kmz_path, cancel)
        }
        ExportConfig::MultipleLayers {
            layers,
            name,
            include_all_attributes,
        } => {
            let mut vector_layers = Vec::new();
            for source in layers {
                cancel.check()?;
                vector_layers.push(read_layer(source)?);
            }
            let params = MergeParams {
                name: name.clone(),
                include_all_attributes: include_all_attributes.unwrap_or(true),
            };
            export_layers_merged(vector_layers, &params, &config.output_kmz_path, cancel)
        }
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(&args.config_filepath)?;
    let mut config: Config = serde_yaml::from_str(&config_contents)
        .with_context(|| format!("Parsing config file {}", &args.config_filepath))?;
    if let Some(output) = args.output {
        config.output_kmz_path = output;
    }

    let cancel = CancelFlag::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("Received interrupt, cancelling export");
        handler_cancel.cancel();
    })
    .context("Setting Ctrl+C handler")?;

    let summary = run_export(&config, &cancel)?;
    log::info!(
        "Wrote {} placemarks and {} photos to {:?}",
        summary.placemark_count,
        summary.photo_count,
        summary.output_path
    );
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::{fs, path::PathBuf};
    use testdir::testdir;

    use super::{run_export, Config, ExportConfig, LayerSource};
    use crate::export::{
        cancel::CancelFlag,
        test_utils::{entry_names, read_kml},
    };

    #[rstest]
    fn test_parse_layer_with_photos_config() {
        let config: Config = serde_yaml::from_str(
            r#"
output_kmz_path: out/site.kmz
export:
  LayerWithPhotos:
    layer:
      filepath: data/photos.gpkg
    photo_field: photo
    include_all_attributes: false
"#,
        )
        .unwrap();
        assert_eq!(config.output_kmz_path, PathBuf::from("out/site.kmz"));
        assert_eq!(
            config.export,
            ExportConfig::LayerWithPhotos {
                layer: LayerSource {
                    filepath: PathBuf::from("data/photos.gpkg"),
                    layer_name: None,
                    display_name: None,
                },
                photo_field: "photo".to_string(),
                name: None,
                include_all_attributes: Some(false),
                photo_base_dir: None,
            }
        );
    }

    #[rstest]
    fn test_parse_multiple_layers_config() {
        let config: Config = serde_yaml::from_str(
            r#"
output_kmz_path: site.kmz
export:
  MultipleLayers:
    name: Site
    layers:
      - filepath: data/site.gpkg
        layer_name: parcels
      - filepath: data/wells.geojson
        display_name: Wells
"#,
        )
        .unwrap();
        match config.export {
            ExportConfig::MultipleLayers { layers, name, .. } => {
                assert_eq!(name.as_deref(), Some("Site"));
                assert_eq!(layers.len(), 2);
                assert_eq!(layers[0].layer_name.as_deref(), Some("parcels"));
                assert_eq!(layers[1].display_name.as_deref(), Some("Wells"));
            }
            other => panic!("Unexpected export config {:?}", other),
        }
    }

    fn write_photo_layer(test_dir: &std::path::Path) -> PathBuf {
        let mut with_photo =
            geojson::Feature::from(geojson::Geometry::new(geojson::Value::Point(vec![10.0, 45.0])));
        with_photo.set_property("name", "Gate");
        with_photo.set_property("photo", "photos\\gate.jpg");
        let mut without_photo =
            geojson::Feature::from(geojson::Geometry::new(geojson::Value::Point(vec![10.5, 45.5])));
        without_photo.set_property("name", "Fence");
        without_photo.set_property("photo", "photos/fence.jpg");
        let feature_collection: geojson::FeatureCollection =
            vec![with_photo, without_photo].into_iter().collect();

        let layer_path = test_dir.join("survey.geojson");
        fs::write(
            &layer_path,
            geojson::GeoJson::from(feature_collection).to_string(),
        )
        .unwrap();
        fs::create_dir(test_dir.join("photos")).unwrap();
        fs::write(test_dir.join("photos").join("gate.jpg"), b"jpeg").unwrap();
        layer_path
    }

    #[rstest]
    fn test_run_layer_with_photos_from_geofile() {
        let test_dir = testdir!();
        let layer_path = write_photo_layer(&test_dir);
        let config = Config {
            output_kmz_path: test_dir.join("survey.kmz"),
            export: ExportConfig::LayerWithPhotos {
                layer: LayerSource {
                    filepath: layer_path,
                    layer_name: None,
                    display_name: None,
                },
                photo_field: "photo".to_string(),
                name: None,
                include_all_attributes: None,
                photo_base_dir: None,
            },
        };

        let summary = run_export(&config, &CancelFlag::new()).unwrap();
        assert_eq!(summary.placemark_count, 2);
        assert_eq!(summary.photo_count, 1);
        assert_eq!(
            entry_names(&config.output_kmz_path),
            vec!["doc.kml", "Photos/gate.jpg"]
        );
        let kml = read_kml(&config.output_kmz_path);
        assert_eq!(kml.matches("<img ").count(), 1);
        assert!(kml.contains("<coordinates>10,45,0</coordinates>"));
    }

    #[rstest]
    fn test_run_multiple_layers_renames_folder() {
        let test_dir = testdir!();
        let layer_path = write_photo_layer(&test_dir);
        let config = Config {
            output_kmz_path: test_dir.join("merged.kmz"),
            export: ExportConfig::MultipleLayers {
                layers: vec![LayerSource {
                    filepath: layer_path,
                    layer_name: None,
                    display_name: Some("Survey points".to_string()),
                }],
                name: None,
                include_all_attributes: None,
            },
        };

        let summary = run_export(&config, &CancelFlag::new()).unwrap();
        assert_eq!(summary.placemark_count, 2);
        let kml = read_kml(&config.output_kmz_path);
        assert!(kml.contains("<name>Survey points</name>"));
        assert!(kml.contains("<name>merged</name>"));
    }

    #[rstest]
    fn test_run_with_unreadable_layer_fails_without_output() {
        let test_dir = testdir!();
        let config = Config {
            output_kmz_path: test_dir.join("merged.kmz"),
            export: ExportConfig::MultipleLayers {
                layers: vec![LayerSource {
                    filepath: test_dir.join("missing.gpkg"),
                    layer_name: None,
                    display_name: None,
                }],
                name: None,
                include_all_attributes: None,
            },
        };
        assert!(run_export(&config, &CancelFlag::new()).is_err());
        assert!(!config.output_kmz_path.exists());
    }
}
