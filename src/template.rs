//! Per-country SPIDER configuration files made from a template.
//!
//! A template is an ordinary SPIDER config in which the country's name is written as `Country`.
//! Each string in the document has that placeholder replaced with the cleaned country name. Two
//! templates are compiled into the program, one with and one without hydropower features.
use crate::id::CountryID;
use anyhow::{Context, Result};
use deunicode::deunicode;
use include_dir::{Dir, include_dir};
use serde_yaml::Value;
use serde_yaml::value::TaggedValue;
use std::fs;
use std::path::{Path, PathBuf};

/// The directory containing the built-in templates
pub const TEMPLATES_DIR: Dir = include_dir!("templates");

/// The token replaced by the country name
pub const PLACEHOLDER: &str = "Country";

/// The built-in template without hydropower
pub const DEFAULT_TEMPLATE_NAME: &str = "Country_config.yml";

/// The built-in template with hydropower features
pub const HYDRO_TEMPLATE_NAME: &str = "Country_config_hydro.yml";

/// Get the name of the built-in template to use
pub fn builtin_template_name(hydro: bool) -> &'static str {
    if hydro {
        HYDRO_TEMPLATE_NAME
    } else {
        DEFAULT_TEMPLATE_NAME
    }
}

/// Get the contents of a built-in template by file name
pub fn builtin_template(name: &str) -> Option<&'static str> {
    TEMPLATES_DIR
        .get_file(name)
        .and_then(|file| file.contents_utf8())
}

/// Load a template, either from `path` or, if it's not given, from the built-in templates
pub fn load_template(path: Option<&Path>, hydro: bool) -> Result<Value> {
    if let Some(path) = path {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not read template {}", path.display()))?;
        return serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid YAML in template {}", path.display()));
    }

    let name = builtin_template_name(hydro);
    let contents = builtin_template(name).with_context(|| format!("Missing template {name}"))?;
    serde_yaml::from_str(contents).with_context(|| format!("Invalid YAML in template {name}"))
}

/// Replace the placeholder in every string of a YAML document.
///
/// Mapping keys are left alone; values in mappings and elements of sequences are visited
/// recursively at any depth. Strings are transliterated to ASCII before the placeholder is
/// replaced. Everything else is copied unchanged. The input document is not modified, so the same
/// template can be reused for any number of countries.
pub fn substitute(node: &Value, replacement: &str) -> Value {
    match node {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .iter()
                .map(|(key, value)| (key.clone(), substitute(value, replacement)))
                .collect(),
        ),
        Value::Sequence(sequence) => Value::Sequence(
            sequence
                .iter()
                .map(|item| substitute(item, replacement))
                .collect(),
        ),
        Value::String(s) => Value::String(deunicode(s).replace(PLACEHOLDER, replacement)),
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: substitute(&tagged.value, replacement),
        })),
        Value::Null | Value::Bool(_) | Value::Number(_) => node.clone(),
    }
}

/// Get the file name of the SPIDER config for a country
pub fn config_file_name(country_id: &CountryID) -> String {
    format!("{country_id}_config.yml")
}

/// Fill in the template for a country and write it to `output_dir`, returning the new file's path
pub fn write_country_config(
    template: &Value,
    country_id: &CountryID,
    output_dir: &Path,
) -> Result<PathBuf> {
    let config = substitute(template, country_id.as_str());
    let file_path = output_dir.join(config_file_name(country_id));
    let contents = serde_yaml::to_string(&config)?;
    fs::write(&file_path, contents)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    #[fixture]
    fn template() -> Value {
        serde_yaml::from_str(
            "
aoi: data/Country.gpkg
hex_res: 5
target_res: 7.5
exclude_countries: false
missing: ~
Country: the key is not replaced
features:
  - name: road_dist
    file: data/Country_roads.gpkg
    weights: [1, 2, 3]
  - nested:
      deeper:
        - - Country/Country_deepest.gpkg
note: !label Country
",
        )
        .unwrap()
    }

    /// Collect every string leaf reachable from a node
    fn string_leaves(node: &Value, out: &mut Vec<String>) {
        match node {
            Value::Mapping(mapping) => mapping.values().for_each(|v| string_leaves(v, out)),
            Value::Sequence(sequence) => sequence.iter().for_each(|v| string_leaves(v, out)),
            Value::Tagged(tagged) => string_leaves(&tagged.value, out),
            Value::String(s) => out.push(s.clone()),
            _ => {}
        }
    }

    #[rstest]
    fn test_substitute_replaces_every_string(template: Value) {
        let config = substitute(&template, "Kenya");
        let mut leaves = Vec::new();
        string_leaves(&config, &mut leaves);
        assert!(!leaves.is_empty());
        assert!(leaves.iter().all(|leaf| !leaf.contains(PLACEHOLDER)));
        assert_eq!(config["aoi"], Value::from("data/Kenya.gpkg"));
        assert_eq!(
            config["features"][1]["nested"]["deeper"][0][0],
            Value::from("Kenya/Kenya_deepest.gpkg")
        );
    }

    #[rstest]
    fn test_substitute_keeps_other_values(template: Value) {
        let config = substitute(&template, "Kenya");
        assert_eq!(config["hex_res"], template["hex_res"]);
        assert_eq!(config["target_res"], template["target_res"]);
        assert_eq!(config["exclude_countries"], template["exclude_countries"]);
        assert_eq!(config["missing"], Value::Null);
        assert_eq!(
            config["features"][0]["weights"],
            template["features"][0]["weights"]
        );
        assert_eq!(config["Country"], Value::from("the key is not replaced"));
    }

    #[rstest]
    fn test_substitute_tagged(template: Value) {
        let Value::Tagged(tagged) = &substitute(&template, "Kenya")["note"] else {
            panic!("Tag was lost");
        };
        assert_eq!(tagged.tag, "label");
        assert_eq!(tagged.value, Value::from("Kenya"));
    }

    #[rstest]
    fn test_substitute_does_not_modify_template(template: Value) {
        let before = template.clone();
        let _ = substitute(&template, "Kenya");
        assert_eq!(template, before);
    }

    #[test]
    fn test_substitute_transliterates_leaves() {
        let config = substitute(&Value::from("Côte/Country.gpkg"), "CotedIvoire");
        assert_eq!(config, Value::from("Cote/CotedIvoire.gpkg"));
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_builtin_templates(#[case] hydro: bool) {
        let template = load_template(None, hydro).unwrap();
        assert!(template.is_mapping());

        let mut leaves = Vec::new();
        string_leaves(&template, &mut leaves);
        assert!(leaves.iter().any(|leaf| leaf.contains(PLACEHOLDER)));
    }

    #[test]
    fn test_load_template_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("template.yml");
        fs::write(&path, "output: Country_hex.geojson\n").unwrap();
        let template = load_template(Some(&path), false).unwrap();
        assert_eq!(template["output"], Value::from("Country_hex.geojson"));
    }

    #[test]
    fn test_load_template_missing_file() {
        let dir = tempdir().unwrap();
        assert!(load_template(Some(&dir.path().join("nope.yml")), false).is_err());
    }

    #[rstest]
    fn test_write_country_config(template: Value) {
        let dir = tempdir().unwrap();
        let id = CountryID::new("SaoTomeandPrincipe");
        let path = write_country_config(&template, &id, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("SaoTomeandPrincipe_config.yml"));

        let written: Value = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, substitute(&template, "SaoTomeandPrincipe"));
    }
}
