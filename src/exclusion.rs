//! Land exclusions and placement of wind turbines and PV plants.
//!
//! The calculation itself is done by an exclusion engine (GLAES). We describe the work as an
//! [`ExclusionJob`], a fixed sequence of steps, and hand it to an [`ExclusionEngine`]. The steps
//! are applied cumulatively, so PV placement sees every exclusion wind placement saw plus
//! agricultural land.
use crate::output::{ensure_nonempty_file, remove_stale_file};
use crate::settings::Settings;
use crate::toolkit::run_program;
use crate::units::{Degrees, Metres, Separation};
use crate::workspace::CountryFiles;
use anyhow::{Context, Result, ensure};
use log::info;
use serde::Serialize;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Land cover classes which are excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandCover {
    /// Herbaceous wetland
    Wetland,
    /// Urban and built-up
    BuiltUp,
    /// Permanent water bodies
    Water,
    /// Cultivated and managed vegetation
    Agriculture,
}

impl LandCover {
    /// The class value in the land cover raster
    pub fn value(self) -> u8 {
        match self {
            Self::Wetland => 90,
            Self::BuiltUp => 50,
            Self::Water => 80,
            Self::Agriculture => 40,
        }
    }
}

/// A single step for the exclusion engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExclusionStep {
    /// Exclude everything within `buffer` of the features in a vector layer
    ExcludeVector {
        /// The vector layer
        source: PathBuf,
        /// Buffer around the features
        buffer: Metres,
    },
    /// Exclude raster pixels with the given value
    ExcludeRaster {
        /// The raster
        source: PathBuf,
        /// Pixel value to exclude
        value: u8,
    },
    /// Save the current exclusions as a raster
    Save {
        /// Output raster
        output: PathBuf,
    },
    /// Place items on the remaining land and save their locations as points
    Distribute {
        /// Minimum distance between items
        separation: Separation,
        /// Direction of the long axis, if the separation is axial
        #[serde(skip_serializing_if = "Option::is_none")]
        axial_direction: Option<Degrees>,
        /// Output point layer
        output: PathBuf,
    },
}

impl ExclusionStep {
    /// The file this step writes, if any
    pub fn output(&self) -> Option<&Path> {
        match self {
            Self::Save { output } | Self::Distribute { output, .. } => Some(output),
            Self::ExcludeVector { .. } | Self::ExcludeRaster { .. } => None,
        }
    }
}

impl fmt::Display for ExclusionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludeVector { source, buffer } => {
                write!(f, "exclude {} with buffer {buffer}", source.display())
            }
            Self::ExcludeRaster { source, value } => {
                write!(f, "exclude value {value} of {}", source.display())
            }
            Self::Save { output } => write!(f, "save exclusions to {}", output.display()),
            Self::Distribute {
                separation, output, ..
            } => write!(
                f,
                "distribute items {separation} apart to {}",
                output.display()
            ),
        }
    }
}

/// Everything the exclusion engine needs for one country
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionJob {
    /// The region (country boundary) to work within
    pub region: PathBuf,
    /// EPSG code of the region's UTM zone
    pub srs: u32,
    /// Raster resolution
    pub pixel_size: Metres,
    /// The steps, in the order they are applied
    pub steps: Vec<ExclusionStep>,
}

impl ExclusionJob {
    /// Every file the engine should produce
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.steps.iter().filter_map(ExclusionStep::output)
    }
}

/// Parameters for the exclusion calculation
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionParameters {
    /// Turbine rotor radius
    pub turbine_radius: Metres,
    /// Raster resolution
    pub pixel_size: Metres,
    /// Buffer around the coastline
    pub coast_buffer: Metres,
    /// Buffer around protected areas
    pub protected_area_buffer: Metres,
    /// Minimum distance between PV plants
    pub pv_separation: Metres,
    /// Direction of the long axis of the turbine footprint
    pub turbine_axial_direction: Degrees,
}

impl From<&Settings> for ExclusionParameters {
    fn from(settings: &Settings) -> Self {
        Self {
            turbine_radius: settings.turbine_radius,
            pixel_size: settings.pixel_size,
            coast_buffer: settings.coast_buffer,
            protected_area_buffer: settings.protected_area_buffer,
            pv_separation: settings.pv_separation,
            turbine_axial_direction: settings.turbine_axial_direction,
        }
    }
}

impl ExclusionParameters {
    /// Turbine spacing: ten rotor radii along the axial direction and five across it
    pub fn turbine_separation(&self) -> Separation {
        Separation::Axial(self.turbine_radius * 10.0, self.turbine_radius * 5.0)
    }
}

/// Build the job for a country.
///
/// The order of the steps matters. Wind exclusions are saved and turbines placed before
/// agricultural land is excluded for PV. If `include_protected_areas` is false the protected area
/// step is left out and the others keep their order.
pub fn build_job(
    files: &CountryFiles,
    epsg: u32,
    params: &ExclusionParameters,
    include_protected_areas: bool,
) -> ExclusionJob {
    let land_cover = files.land_cover();
    let exclude_land_cover = |class: LandCover| ExclusionStep::ExcludeRaster {
        source: land_cover.clone(),
        value: class.value(),
    };

    let mut steps = vec![ExclusionStep::ExcludeVector {
        source: files.oceans(),
        buffer: params.coast_buffer,
    }];
    if include_protected_areas {
        steps.push(ExclusionStep::ExcludeVector {
            source: files.protected_areas(),
            buffer: params.protected_area_buffer,
        });
    }
    steps.extend([
        exclude_land_cover(LandCover::Wetland),
        exclude_land_cover(LandCover::BuiltUp),
        exclude_land_cover(LandCover::Water),
        ExclusionStep::Save {
            output: files.wind_exclusions(),
        },
        ExclusionStep::Distribute {
            separation: params.turbine_separation(),
            axial_direction: Some(params.turbine_axial_direction),
            output: files.turbine_placements(),
        },
        exclude_land_cover(LandCover::Agriculture),
        ExclusionStep::Save {
            output: files.pv_exclusions(),
        },
        ExclusionStep::Distribute {
            separation: Separation::Uniform(params.pv_separation),
            axial_direction: None,
            output: files.pv_placements(),
        },
    ]);

    ExclusionJob {
        region: files.boundary_utm(),
        srs: epsg,
        pixel_size: params.pixel_size,
        steps,
    }
}

/// Something which can carry out an [`ExclusionJob`]
pub trait ExclusionEngine {
    /// Run all the steps in the job, writing their outputs
    fn run(&self, job: &ExclusionJob) -> Result<()>;
}

/// An [`ExclusionEngine`] run as an external command.
///
/// The job is written to a JSON file whose path is passed as the final argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEngine {
    command: Vec<String>,
}

impl ExternalEngine {
    /// Create an [`ExternalEngine`] from a program and its leading arguments
    pub fn new(command: &[String]) -> Result<Self> {
        ensure!(!command.is_empty(), "No exclusion command given");
        Ok(Self {
            command: command.to_vec(),
        })
    }
}

impl ExclusionEngine for ExternalEngine {
    fn run(&self, job: &ExclusionJob) -> Result<()> {
        let dir = tempfile::tempdir()?;
        let job_path = dir.path().join("job.json");
        fs::write(&job_path, serde_json::to_string_pretty(job)?)
            .context("Could not write exclusion job")?;

        let (program, leading_args) = self
            .command
            .split_first()
            .context("No exclusion command given")?;
        let mut args: Vec<OsString> = leading_args.iter().map(Into::into).collect();
        args.push(job_path.into_os_string());
        run_program(Path::new(program), &args)
    }
}

/// Calculate exclusions and placements for a country.
///
/// Outputs from previous runs are removed first, then each output is checked once the engine
/// finishes.
pub fn calculate_exclusions(
    engine: &dyn ExclusionEngine,
    files: &CountryFiles,
    epsg: u32,
    params: &ExclusionParameters,
    include_protected_areas: bool,
) -> Result<()> {
    let job = build_job(files, epsg, params, include_protected_areas);
    for output in job.outputs() {
        remove_stale_file(output)?;
    }

    for step in &job.steps {
        info!(" - {step}");
    }
    engine.run(&job).context("Exclusion engine failed")?;

    for output in job.outputs() {
        ensure_nonempty_file(output)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::CountryID;
    use crate::workspace::Workspace;
    use rstest::{fixture, rstest};
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Records the jobs it is given and writes placeholder outputs
    #[derive(Default)]
    struct MockEngine {
        jobs: RefCell<Vec<ExclusionJob>>,
        write_outputs: bool,
    }

    impl ExclusionEngine for MockEngine {
        fn run(&self, job: &ExclusionJob) -> Result<()> {
            if self.write_outputs {
                for output in job.outputs() {
                    fs::write(output, "data")?;
                }
            }
            self.jobs.borrow_mut().push(job.clone());
            Ok(())
        }
    }

    #[fixture]
    fn files() -> CountryFiles {
        Workspace::new(Path::new("project")).country_files(&CountryID::new("Kenya"))
    }

    #[fixture]
    fn params() -> ExclusionParameters {
        ExclusionParameters::from(&Settings::default())
    }

    #[rstest]
    fn test_build_job_order(files: CountryFiles, params: ExclusionParameters) {
        let job = build_job(&files, 32737, &params, true);
        assert_eq!(job.region, files.boundary_utm());
        assert_eq!(job.srs, 32737);
        assert_eq!(job.pixel_size, Metres(100.0));

        let clc = files.land_cover();
        assert_eq!(
            job.steps,
            [
                ExclusionStep::ExcludeVector {
                    source: files.oceans(),
                    buffer: Metres(250.0)
                },
                ExclusionStep::ExcludeVector {
                    source: files.protected_areas(),
                    buffer: Metres(250.0)
                },
                ExclusionStep::ExcludeRaster {
                    source: clc.clone(),
                    value: 90
                },
                ExclusionStep::ExcludeRaster {
                    source: clc.clone(),
                    value: 50
                },
                ExclusionStep::ExcludeRaster {
                    source: clc.clone(),
                    value: 80
                },
                ExclusionStep::Save {
                    output: files.wind_exclusions()
                },
                ExclusionStep::Distribute {
                    separation: Separation::Axial(Metres(1500.0), Metres(750.0)),
                    axial_direction: Some(Degrees(45.0)),
                    output: files.turbine_placements()
                },
                ExclusionStep::ExcludeRaster {
                    source: clc,
                    value: 40
                },
                ExclusionStep::Save {
                    output: files.pv_exclusions()
                },
                ExclusionStep::Distribute {
                    separation: Separation::Uniform(Metres(440.0)),
                    axial_direction: None,
                    output: files.pv_placements()
                },
            ]
        );
    }

    #[rstest]
    fn test_build_job_without_protected_areas(files: CountryFiles, params: ExclusionParameters) {
        let with = build_job(&files, 32737, &params, true);
        let without = build_job(&files, 32737, &params, false);
        assert_eq!(without.steps.len(), with.steps.len() - 1);
        assert_eq!(without.steps[0], with.steps[0]);
        assert_eq!(without.steps[1..], with.steps[2..]);
    }

    #[rstest]
    fn test_turbine_separation_scales_with_radius(mut params: ExclusionParameters) {
        params.turbine_radius = Metres(80.0);
        assert_eq!(
            params.turbine_separation(),
            Separation::Axial(Metres(800.0), Metres(400.0))
        );
    }

    #[rstest]
    fn test_job_json(files: CountryFiles, params: ExclusionParameters) {
        let job = build_job(&files, 32737, &params, false);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["srs"], 32737);
        assert_eq!(json["steps"][0]["type"], "exclude_vector");
        assert_eq!(json["steps"][0]["buffer"], 250.0);
        assert_eq!(json["steps"][1]["type"], "exclude_raster");
        assert_eq!(json["steps"][1]["value"], 90);
        assert_eq!(json["steps"][5]["separation"], serde_json::json!([1500.0, 750.0]));
        assert_eq!(json["steps"][5]["axial_direction"], 45.0);
        assert!(json["steps"][8].get("axial_direction").is_none());
    }

    #[rstest]
    fn test_job_outputs(files: CountryFiles, params: ExclusionParameters) {
        let job = build_job(&files, 32737, &params, true);
        let outputs: Vec<_> = job.outputs().collect();
        assert_eq!(
            outputs,
            [
                files.wind_exclusions().as_path(),
                files.turbine_placements().as_path(),
                files.pv_exclusions().as_path(),
                files.pv_placements().as_path(),
            ]
        );
    }

    #[rstest]
    fn test_calculate_exclusions(params: ExclusionParameters) {
        let dir = tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        workspace.create_dirs().unwrap();
        let files = workspace.country_files(&CountryID::new("Kenya"));

        let engine = MockEngine {
            write_outputs: true,
            ..MockEngine::default()
        };
        calculate_exclusions(&engine, &files, 32737, &params, true).unwrap();
        assert_eq!(engine.jobs.borrow().len(), 1);
        assert!(files.pv_placements().is_file());
    }

    #[rstest]
    fn test_calculate_exclusions_missing_output(params: ExclusionParameters) {
        let dir = tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        workspace.create_dirs().unwrap();
        let files = workspace.country_files(&CountryID::new("Kenya"));

        // Outputs left over from a previous run don't count
        fs::write(files.pv_placements(), "old").unwrap();
        let engine = MockEngine::default();
        assert!(calculate_exclusions(&engine, &files, 32737, &params, true).is_err());
        assert!(!files.pv_placements().exists());
    }

    #[test]
    fn test_external_engine_empty_command() {
        assert!(ExternalEngine::new(&[]).is_err());
    }
}
