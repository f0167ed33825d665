//! The directory layout of a project and the names of the files each country uses.
use crate::id::{CountryID, IsoCode};
use crate::output::create_output_directory;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// OSM layers staged for SPIDER, as (name of shapefile in the OSM extract, output suffix)
pub const OSM_LAYERS: [(&str, &str); 3] = [
    ("gis_osm_water_a_free_1.shp", "waterbodies"),
    ("gis_osm_roads_free_1.shp", "roads"),
    ("gis_osm_waterways_free_1.shp", "waterways"),
];

/// The layout of a project directory.
///
/// Raw inputs live under `data/`. Everything else is written by the pipeline (or by GLAES and
/// SPIDER) into the folders below:
///
/// | Folder             | Contents                                  |
/// |--------------------|-------------------------------------------|
/// | `glaes/data`       | Clipped inputs for the exclusion engine   |
/// | `glaes/processed`  | Exclusion rasters and placements          |
/// | `spider/prep/data` | Clipped inputs for SPIDER                 |
/// | `spider/prep`      | SPIDER configs and hexagons               |
/// | `geox/data`        | Final hexagons                            |
#[derive(Debug, Clone, PartialEq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a [`Workspace`] rooted at `root`
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The project directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path from the settings file.
    ///
    /// Relative paths are taken to be relative to the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Folder for the exclusion engine's inputs
    pub fn glaes_data_dir(&self) -> PathBuf {
        self.root.join("glaes").join("data")
    }

    /// Folder for the exclusion engine's outputs
    pub fn glaes_processed_dir(&self) -> PathBuf {
        self.root.join("glaes").join("processed")
    }

    /// Folder for SPIDER's configs and hexagon outputs
    pub fn spider_prep_dir(&self) -> PathBuf {
        self.root.join("spider").join("prep")
    }

    /// Folder for SPIDER's input data
    pub fn spider_data_dir(&self) -> PathBuf {
        self.spider_prep_dir().join("data")
    }

    /// Folder for the final hexagons
    pub fn geox_data_dir(&self) -> PathBuf {
        self.root.join("geox").join("data")
    }

    /// Create all the output folders
    pub fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.glaes_data_dir(),
            self.glaes_processed_dir(),
            self.spider_data_dir(),
            self.geox_data_dir(),
        ] {
            create_output_directory(&dir)?;
        }

        Ok(())
    }

    /// Get the paths of the files used for a country
    pub fn country_files(&self, id: &CountryID) -> CountryFiles {
        CountryFiles {
            id: id.clone(),
            glaes_data: self.glaes_data_dir(),
            glaes_processed: self.glaes_processed_dir(),
            spider_prep: self.spider_prep_dir(),
            spider_data: self.spider_data_dir(),
            geox_data: self.geox_data_dir(),
        }
    }

    /// Path to the tagged and deduplicated hexagons for the country with this ISO code
    pub fn hexagons_with_country(&self, iso_code: &IsoCode) -> PathBuf {
        self.geox_data_dir()
            .join(format!("hexagons_with_country_{iso_code}.geojson"))
    }
}

/// Paths to the files for a single country.
///
/// All file names are keyed on the country's cleaned identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryFiles {
    id: CountryID,
    glaes_data: PathBuf,
    glaes_processed: PathBuf,
    spider_prep: PathBuf,
    spider_data: PathBuf,
    geox_data: PathBuf,
}

impl CountryFiles {
    fn file_name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.id)
    }

    /// The UTM zone's EPSG code, as text
    pub fn epsg(&self) -> PathBuf {
        self.glaes_data.join(self.file_name("_EPSG.txt"))
    }

    /// Country boundary in its UTM zone
    pub fn boundary_utm(&self) -> PathBuf {
        self.glaes_data.join(self.file_name(".geojson"))
    }

    /// Buffered country boundary in its UTM zone
    pub fn buffer(&self) -> PathBuf {
        self.glaes_data.join(self.file_name("_buff.geojson"))
    }

    /// Oceans clipped to the buffered country
    pub fn oceans(&self) -> PathBuf {
        self.glaes_data.join(self.file_name("_oceans.geojson"))
    }

    /// Protected areas in the country's UTM zone
    pub fn protected_areas(&self) -> PathBuf {
        self.glaes_data.join(self.file_name("_protected_areas.geojson"))
    }

    /// Land cover raster cropped to the country
    pub fn land_cover(&self) -> PathBuf {
        self.glaes_data.join(self.file_name("_CLC.tif"))
    }

    /// Exclusion raster for wind
    pub fn wind_exclusions(&self) -> PathBuf {
        self.glaes_processed.join(self.file_name("_wind_exclusions.tif"))
    }

    /// Exclusion raster for PV
    pub fn pv_exclusions(&self) -> PathBuf {
        self.glaes_processed.join(self.file_name("_pv_exclusions.tif"))
    }

    /// Turbine placements
    pub fn turbine_placements(&self) -> PathBuf {
        self.glaes_processed
            .join(self.file_name("_turbine_placements.shp"))
    }

    /// PV placements
    pub fn pv_placements(&self) -> PathBuf {
        self.glaes_processed.join(self.file_name("_pv_placements.shp"))
    }

    /// Oceans layer for SPIDER
    pub fn spider_oceans(&self) -> PathBuf {
        self.spider_data.join(self.file_name("_oceans.gpkg"))
    }

    /// An OSM layer for SPIDER (e.g. "roads")
    pub fn spider_osm_layer(&self, layer: &str) -> PathBuf {
        self.spider_data
            .join(self.file_name(&format!("_{layer}.gpkg")))
    }

    /// Country boundary in EPSG:4326 for SPIDER
    pub fn spider_boundary(&self) -> PathBuf {
        self.spider_data.join(self.file_name(".gpkg"))
    }

    /// The SPIDER config
    pub fn spider_config(&self) -> PathBuf {
        self.spider_prep.join(self.file_name("_config.yml"))
    }

    /// Hexagons produced by SPIDER
    pub fn spider_hexagons(&self) -> PathBuf {
        self.spider_prep.join(self.file_name("_hex.geojson"))
    }

    /// Hexagons with placement counts attached
    pub fn hex_final(&self) -> PathBuf {
        self.geox_data.join(self.file_name("_hex_final.geojson"))
    }
}
