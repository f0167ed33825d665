//! The steps run for each country before and after SPIDER.
use crate::clip::clip_country_data;
use crate::country::clean_country_name;
use crate::exclusion::{ExclusionEngine, ExclusionParameters, ExternalEngine, calculate_exclusions};
use crate::hexagon::{CountryBoundary, Technology, assign_country, attach_counts, remove_extra_hexagons};
use crate::hydro::{HydroSource, existing_plants, plants_to_features, read_hydro_plants};
use crate::id::IsoCode;
use crate::output::{ensure_nonempty_file, remove_stale_file};
use crate::settings::Settings;
use crate::template::write_country_config;
use crate::toolkit::{GdalToolkit, GeoToolkit, WGS84};
use crate::vector::{
    read_country_boundaries, read_hexagons, read_points, write_feature_collection, write_hexagons,
};
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use log::{info, warn};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Name of the layer hydropower plants are written to
const HYDRO_LAYER_NAME: &str = "dams";

/// Runs the pipeline's steps against a project directory
pub struct Pipeline {
    workspace: Workspace,
    settings: Settings,
    toolkit: Box<dyn GeoToolkit>,
    engine: Box<dyn ExclusionEngine>,
}

impl Pipeline {
    /// Create a [`Pipeline`] which uses GDAL and the configured exclusion command
    pub fn new(workspace: Workspace, settings: Settings) -> Result<Self> {
        let engine = ExternalEngine::new(&settings.exclusion_command)?;
        Ok(Self::with_backends(
            workspace,
            settings,
            Box::new(GdalToolkit::default()),
            Box::new(engine),
        ))
    }

    /// Create a [`Pipeline`] with the given geoprocessing toolkit and exclusion engine
    pub fn with_backends(
        workspace: Workspace,
        settings: Settings,
        toolkit: Box<dyn GeoToolkit>,
        engine: Box<dyn ExclusionEngine>,
    ) -> Self {
        Self {
            workspace,
            settings,
            toolkit,
            engine,
        }
    }

    /// The project directory layout
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Write the existing hydropower plants from a database as a layer for SPIDER
    pub fn prepare_hydro(&self, source: HydroSource) -> Result<PathBuf> {
        let input_path = match source {
            HydroSource::Global => &self.settings.hydro_global,
            HydroSource::Jrc => &self.settings.hydro_jrc,
        };
        let input_path = self.workspace.resolve(input_path);
        info!("Preparing hydropower plants from {}", input_path.display());

        let plants = existing_plants(read_hydro_plants(&input_path, source)?);
        let scratch = tempfile::tempdir()?;
        let plants_path = scratch.path().join("plants.geojson");
        write_feature_collection(&plants_path, plants_to_features(&plants, source))?;

        let output_path = self
            .workspace
            .spider_data_dir()
            .join(source.output_file_name());
        self.toolkit
            .convert_vector(
                &plants_path,
                &output_path,
                Some(WGS84),
                Some(HYDRO_LAYER_NAME),
            )
            .with_context(|| format!("Could not create {}", output_path.display()))?;
        ensure_nonempty_file(&output_path)?;
        info!("Hydropower plants saved to {}", output_path.display());

        Ok(output_path)
    }

    /// Stage a country's data, calculate its exclusions and write its SPIDER config
    pub fn prep_country(&self, name: &str, template: &Value) -> Result<()> {
        info!("Prepping spider and glaes data files for {name}...");
        let country = clip_country_data(self.toolkit.as_ref(), &self.workspace, &self.settings, name)?;
        info!("Glaes and spider data files prepped!");

        info!("Calculating land exclusions for {name}");
        let files = self.workspace.country_files(&country.id);
        calculate_exclusions(
            self.engine.as_ref(),
            &files,
            country.epsg,
            &ExclusionParameters::from(&self.settings),
            self.settings.exclude_protected_areas,
        )?;
        info!("Finished calculating land exclusions!");

        let config_path =
            write_country_config(template, &country.id, &self.workspace.spider_prep_dir())?;
        info!("Config file saved as {}", config_path.display());

        Ok(())
    }

    /// Prep every country in turn, preparing hydropower plants first if requested
    pub fn prep(&self, names: &[String], hydro: bool, template: &Value) -> Result<()> {
        self.workspace.create_dirs()?;
        if hydro {
            self.prepare_hydro(HydroSource::Global)?;
        }

        for name in names {
            self.prep_country(name, template)
                .with_context(|| format!("Failed to prep {name}"))?;
        }

        Ok(())
    }

    /// Convert a placement layer to EPSG:4326 and read its points
    fn read_placements(&self, file_path: &Path, scratch: &Path) -> Result<Vec<geo::Point<f64>>> {
        let converted = scratch.join("placements.geojson");
        self.toolkit
            .convert_vector(file_path, &converted, Some(WGS84), None)
            .with_context(|| format!("Could not convert {}", file_path.display()))?;

        read_points(&converted)
    }

    /// Load the world boundaries used to tag hexagons with their country
    pub fn load_world(&self) -> Result<Vec<CountryBoundary>> {
        let source = self.workspace.resolve(&self.settings.world_boundaries);
        let scratch = tempfile::tempdir()?;
        let converted = scratch.path().join("world.geojson");
        self.toolkit
            .convert_vector(&source, &converted, Some(WGS84), None)
            .with_context(|| format!("Could not convert {}", source.display()))?;

        read_country_boundaries(&converted, &self.settings.world_name_field)
    }

    /// Attach placement counts to a country's hexagons, then tag and deduplicate them.
    ///
    /// Returns false if there were no hexagons to write, in which case nothing is written. Outputs
    /// from any previous run are removed first.
    pub fn finalise_country(
        &self,
        name: &str,
        iso_code: &IsoCode,
        world: &[CountryBoundary],
    ) -> Result<bool> {
        info!("Combining GLAES and SPIDER data for {name}!");
        let id = clean_country_name(name);
        let files = self.workspace.country_files(&id);
        let output_path = self.workspace.hexagons_with_country(iso_code);
        remove_stale_file(&files.hex_final())?;
        remove_stale_file(&output_path)?;

        let mut hexagons = read_hexagons(&files.spider_hexagons())?;
        let scratch = tempfile::tempdir()?;
        for (technology, placements) in [
            (Technology::Wind, files.turbine_placements()),
            (Technology::Pv, files.pv_placements()),
        ] {
            let points = self.read_placements(&placements, scratch.path())?;
            info!(" - {} {technology} placements", points.len());
            attach_counts(&mut hexagons, technology, &points);
        }

        if !write_hexagons(&files.hex_final(), &hexagons)? {
            return Ok(false);
        }

        let tagged = assign_country(&hexagons, world);
        let kept = remove_extra_hexagons(tagged, &id);
        if !write_hexagons(&output_path, &kept)? {
            return Ok(false);
        }
        info!("Hexagons saved to {}", output_path.display());

        Ok(true)
    }

    /// Finalise each country, paired with its ISO code.
    ///
    /// Countries with no hexagons are skipped.
    pub fn finalise(&self, countries: &[(String, IsoCode)]) -> Result<()> {
        self.workspace.create_dirs()?;
        let world = self.load_world()?;
        for (name, iso_code) in countries {
            let written = self
                .finalise_country(name, iso_code, &world)
                .with_context(|| format!("Failed to finalise {name}"))?;
            if !written {
                warn!("Skipped {name}");
            }
        }

        Ok(())
    }
}

/// Write a SPIDER config for each country from the template
pub fn write_configs(names: &[String], template: &Value, output_dir: &Path) -> Result<Vec<PathBuf>> {
    names
        .iter()
        .map(|name| {
            let path = write_country_config(template, &clean_country_name(name), output_dir)?;
            info!("Config file for {name} saved as {}", path.display());
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::ExclusionJob;
    use crate::fixture::{FakeToolkit, fake_toolkit};
    use crate::hexagon::Hexagon;
    use crate::template::load_template;
    use crate::vector::read_feature_collection;
    use geo::MultiPolygon;
    use rstest::rstest;
    use serde_json::json;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    /// Writes placeholder files for every output
    struct FakeEngine;

    impl ExclusionEngine for FakeEngine {
        fn run(&self, job: &ExclusionJob) -> Result<()> {
            for output in job.outputs() {
                fs::write(output, "data")?;
            }
            Ok(())
        }
    }

    fn pipeline(dir: &TempDir, toolkit: FakeToolkit) -> Pipeline {
        Pipeline::with_backends(
            Workspace::new(dir.path()),
            Settings::default(),
            Box::new(toolkit),
            Box::new(FakeEngine),
        )
    }

    fn square(x: f64, y: f64) -> serde_json::Value {
        json!([[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]])
    }

    fn write_json(path: &Path, value: &serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, value.to_string()).unwrap();
    }

    fn polygon_features(features: &[(serde_json::Value, serde_json::Value)]) -> serde_json::Value {
        let features: Vec<_> = features
            .iter()
            .map(|(coordinates, properties)| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Polygon", "coordinates": coordinates},
                    "properties": properties,
                })
            })
            .collect();
        json!({"type": "FeatureCollection", "features": features})
    }

    fn point_features(points: &[[f64; 2]]) -> serde_json::Value {
        let features: Vec<_> = points
            .iter()
            .map(|point| {
                json!({
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": point},
                    "properties": {},
                })
            })
            .collect();
        json!({"type": "FeatureCollection", "features": features})
    }

    /// Two hexagons for Kenya, the second of which straddles the border with Tanzania
    fn write_finalise_inputs(pipeline: &Pipeline) {
        let workspace = pipeline.workspace();
        let files = workspace.country_files(&"Kenya".into());
        write_json(
            &files.spider_hexagons(),
            &polygon_features(&[
                (square(0.0, 0.0), json!({"h3_index": "a"})),
                (square(1.0, 0.0), json!({"h3_index": "b"})),
            ]),
        );
        write_json(
            &files.turbine_placements(),
            &point_features(&[[0.5, 0.5], [0.25, 0.25], [1.5, 0.5], [9.0, 9.0]]),
        );
        write_json(&files.pv_placements(), &point_features(&[[1.5, 0.5]]));
        write_json(
            &workspace.resolve(&Settings::default().world_boundaries),
            &polygon_features(&[
                (
                    json!([[[-1.0, -1.0], [1.5, -1.0], [1.5, 2.0], [-1.0, 2.0], [-1.0, -1.0]]]),
                    json!({"NAME": "Kenya"}),
                ),
                (
                    json!([[[1.5, -1.0], [4.0, -1.0], [4.0, 2.0], [1.5, 2.0], [1.5, -1.0]]]),
                    json!({"NAME": "Tanzania"}),
                ),
            ]),
        );
    }

    #[rstest]
    fn test_finalise(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        write_finalise_inputs(&pipeline);

        pipeline
            .finalise(&[("Kenya".to_string(), IsoCode::new("KEN"))])
            .unwrap();

        let files = pipeline.workspace().country_files(&"Kenya".into());
        let counted = read_hexagons(&files.hex_final()).unwrap();
        assert_eq!(
            counted
                .iter()
                .map(|hexagon| (hexagon.theo_turbines, hexagon.theo_pv))
                .collect::<Vec<_>>(),
            [(2, 0), (1, 1)]
        );

        let final_path = pipeline
            .workspace()
            .hexagons_with_country(&IsoCode::new("KEN"));
        let collection = read_feature_collection(&final_path).unwrap();
        assert_eq!(collection.features.len(), 2);
        for feature in &collection.features {
            assert_eq!(feature.property("country"), Some(&json!("Kenya")));
        }
        assert_eq!(
            collection.features[1].property("h3_index"),
            Some(&json!("b"))
        );
    }

    #[rstest]
    fn test_finalise_no_hexagons(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        write_finalise_inputs(&pipeline);
        let files = pipeline.workspace().country_files(&"Kenya".into());
        write_json(&files.spider_hexagons(), &polygon_features(&[]));

        // Outputs left over from an earlier run
        pipeline.workspace().create_dirs().unwrap();
        let final_path = pipeline
            .workspace()
            .hexagons_with_country(&IsoCode::new("KEN"));
        fs::write(files.hex_final(), "STALE").unwrap();
        fs::write(&final_path, "STALE").unwrap();

        let world = pipeline.load_world().unwrap();
        assert!(
            !pipeline
                .finalise_country("Kenya", &IsoCode::new("KEN"), &world)
                .unwrap()
        );
        assert!(!files.hex_final().exists());
        assert!(!final_path.exists());
    }

    #[rstest]
    fn test_finalise_no_hexagons_in_country(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        write_finalise_inputs(&pipeline);
        let files = pipeline.workspace().country_files(&"Kenya".into());
        write_json(
            &files.spider_hexagons(),
            &polygon_features(&[(square(20.0, 20.0), json!({"h3_index": "z"}))]),
        );
        pipeline.workspace().create_dirs().unwrap();
        let final_path = pipeline
            .workspace()
            .hexagons_with_country(&IsoCode::new("KEN"));
        fs::write(&final_path, "STALE").unwrap();

        let world = pipeline.load_world().unwrap();
        assert!(
            !pipeline
                .finalise_country("Kenya", &IsoCode::new("KEN"), &world)
                .unwrap()
        );
        assert!(files.hex_final().is_file());
        assert!(!final_path.exists());
    }

    #[rstest]
    fn test_finalise_continues_after_empty_country(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        write_finalise_inputs(&pipeline);

        // Uganda has no hexagons
        let uganda = pipeline.workspace().country_files(&"Uganda".into());
        write_json(&uganda.spider_hexagons(), &polygon_features(&[]));
        write_json(&uganda.turbine_placements(), &point_features(&[]));
        write_json(&uganda.pv_placements(), &point_features(&[]));

        pipeline
            .finalise(&[
                ("Uganda".to_string(), IsoCode::new("UGA")),
                ("Kenya".to_string(), IsoCode::new("KEN")),
            ])
            .unwrap();

        let workspace = pipeline.workspace();
        assert!(!workspace.hexagons_with_country(&IsoCode::new("UGA")).exists());
        assert!(
            workspace
                .country_files(&"Kenya".into())
                .hex_final()
                .is_file()
        );
        let collection =
            read_feature_collection(&workspace.hexagons_with_country(&IsoCode::new("KEN")))
                .unwrap();
        assert_eq!(collection.features.len(), 2);
    }

    #[rstest]
    fn test_finalise_hexagons_outside_country(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        write_finalise_inputs(&pipeline);

        // Tagged hexagons only belong to other countries
        let hexagons: Vec<Hexagon> = read_hexagons(
            &pipeline
                .workspace()
                .country_files(&"Kenya".into())
                .spider_hexagons(),
        )
        .unwrap();
        let world = pipeline.load_world().unwrap();
        let tagged = assign_country(&hexagons[1..], &world[1..]);
        assert!(remove_extra_hexagons(tagged, &"Kenya".into()).is_empty());
    }

    #[rstest]
    fn test_prep(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        let template = load_template(None, false).unwrap();

        pipeline
            .prep(&["Côte d'Ivoire".to_string()], false, &template)
            .unwrap();

        let files = pipeline
            .workspace()
            .country_files(&"CotedIvoire".into());
        assert!(files.land_cover().is_file());
        assert!(files.pv_placements().is_file());
        let config = fs::read_to_string(files.spider_config()).unwrap();
        assert!(config.contains("CotedIvoire"));
        assert!(!config.contains("Country"));
    }

    #[rstest]
    fn test_prep_unknown_country() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, FakeToolkit::new(MultiPolygon::new(Vec::new())));
        let template = load_template(None, false).unwrap();
        assert!(
            pipeline
                .prep(&["Atlantis".to_string()], false, &template)
                .is_err()
        );
    }

    #[rstest]
    fn test_prepare_hydro(fake_toolkit: FakeToolkit) {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(&dir, fake_toolkit);
        pipeline.workspace().create_dirs().unwrap();
        let csv_path = pipeline
            .workspace()
            .resolve(&Settings::default().hydro_global);
        fs::create_dir_all(csv_path.parent().unwrap()).unwrap();
        fs::write(
            &csv_path,
            "id,lat,lon,name,type,capacity,avg_annual_generation_GWh,head,country_code\n\
             1,-0.5,36.9,Dam A,HDAM,100,400,80,KEN\n\
             2,-0.6,37.0,Dam B,HDAM,50,,,KEN\n",
        )
        .unwrap();

        let output_path = pipeline.prepare_hydro(HydroSource::Global).unwrap();
        assert_eq!(
            output_path,
            pipeline
                .workspace()
                .spider_data_dir()
                .join("hydropower_dams.gpkg")
        );

        // The fake toolkit copies the GeoJSON through unchanged
        let collection = read_feature_collection(&output_path).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert_eq!(collection.features[0].property("name"), Some(&json!("Dam A")));
    }

    #[test]
    fn test_write_configs() {
        let dir = tempdir().unwrap();
        let template = load_template(None, true).unwrap();
        let names = ["Kenya".to_string(), "Dem. Rep. Congo".to_string()];
        let paths = write_configs(&names, &template, dir.path()).unwrap();
        assert_eq!(
            paths,
            [
                dir.path().join("Kenya_config.yml"),
                dir.path().join("DemRepCongo_config.yml")
            ]
        );
    }
}
