// Boundary files: reading, merging the joined rows, writing.

use std::collections::HashSet;

use geo::{Centroid, Geometry};
use geojson::{Feature, FeatureCollection, GeoJson};

use crate::atlas::inset::{find_inset, insets_from_config};
use crate::atlas::*;

fn property_to_string(v: Option<&JSValue>) -> String {
    match v {
        Some(JSValue::String(s)) => s.clone(),
        Some(JSValue::Number(n)) => n.to_string(),
        Some(JSValue::Bool(b)) => b.to_string(),
        _ => "".to_string(),
    }
}

fn cell_to_json(cell: &Cell) -> JSValue {
    match cell {
        Cell::Number(x) => json!(x),
        Cell::Text(s) => json!(s),
        Cell::Missing => JSValue::Null,
    }
}

pub fn read_geojson(path: &str) -> AtlasResult<FeatureCollection> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let fc: FeatureCollection = contents.parse().context(ParsingGeoJsonSnafu { path })?;
    debug!("read_geojson: {}: {} features", path, fc.features.len());
    Ok(fc)
}

/// Attaches the rows of the table to the features of a boundary file.
///
/// Each feature gets the key, every column of its row and a label point.
/// With an inner join, features without a row are dropped. With an outer
/// join, they are kept with null values and `"missing": true`.
pub fn merge_geometry(path: &str, gc: &GeometryConfig, table: &Table) -> AtlasResult<FeatureCollection> {
    let key_spec = validate_key(&gc.key)?;
    let join = validate_join(&gc.join)?;
    let insets = insets_from_config(&gc.insets);
    let skip_invalid = gc.skip_invalid_keys.unwrap_or(false);
    let fc = read_geojson(path)?;

    let mut features: Vec<Feature> = Vec::new();
    let mut seen: HashSet<CanonicalKey> = HashSet::new();
    for (idx, feature) in fc.features.into_iter().enumerate() {
        let geometry = match feature.geometry {
            Some(g) => g,
            None => {
                debug!("merge_geometry: feature {} has no geometry, dropping it", idx);
                continue;
            }
        };
        let mut props = feature.properties.unwrap_or_default();

        let raw_key: Vec<String> = key_spec
            .columns()
            .iter()
            .map(|c| property_to_string(props.get(*c)))
            .collect();
        let raw_refs: Vec<&str> = raw_key.iter().map(|s| s.as_str()).collect();
        let key = match key_spec.normalize(&raw_refs) {
            Ok(k) => k,
            Err(e) if skip_invalid => {
                warn!("merge_geometry: feature {}: skipping: {}", idx, e);
                continue;
            }
            Err(e) => {
                return Err(e).context(InvalidKeySnafu {
                    path,
                    lineno: idx + 1,
                })
            }
        };

        let row = table.rows.get(&key);
        if row.is_none() && join == JoinKind::Inner {
            debug!("merge_geometry: no row for feature {}", key);
            continue;
        }

        let mut geom: Geometry<f64> = geometry.value.try_into().context(ParsingGeoJsonSnafu { path })?;
        if let Some(inset) = find_inset(&insets, &props) {
            debug!("merge_geometry: moving {} ({}={})", key, inset.property, inset.value);
            inset.apply(&mut geom);
        }
        if let Some(c) = geom.centroid() {
            props.insert("label_x".to_string(), json!(c.x()));
            props.insert("label_y".to_string(), json!(c.y()));
        }

        props.insert("key".to_string(), json!(key.as_str()));
        match row {
            Some(cells) => {
                for (column, cell) in table.columns.iter().zip(cells) {
                    props.insert(column.clone(), cell_to_json(cell));
                }
            }
            None => {
                for column in table.columns.iter() {
                    props.insert(column.clone(), JSValue::Null);
                }
                props.insert("missing".to_string(), json!(true));
            }
        }
        seen.insert(key);

        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&geom))),
            id: feature.id,
            properties: Some(props),
            foreign_members: None,
        });
    }

    let unmatched = table.rows.keys().filter(|k| !seen.contains(*k)).count();
    if unmatched > 0 {
        warn!("merge_geometry: {} rows have no feature in {}", unmatched, path);
    }
    info!("merge_geometry: {}: {} features", path, features.len());
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

pub fn write_geojson(path: &str, fc: &FeatureCollection) -> AtlasResult<()> {
    let out = GeoJson::from(fc.clone());
    fs::write(path, out.to_string()).context(WritingOutputSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn states_path() -> String {
        let p: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "data", "states.geojson"]
            .iter()
            .collect();
        p.display().to_string()
    }

    fn table() -> Table {
        let mut rows: BTreeMap<CanonicalKey, Vec<Cell>> = BTreeMap::new();
        rows.insert(CanonicalKey("AK".to_string()), vec![Cell::Text("republican".to_string())]);
        rows.insert(CanonicalKey("OH".to_string()), vec![Cell::Text("republican".to_string())]);
        Table {
            name: "winners".to_string(),
            columns: vec!["winner".to_string()],
            rows,
        }
    }

    fn config(join: &str) -> GeometryConfig {
        serde_json::from_value(json!({
            "filePath": "states.geojson",
            "key": {"parts": [{"column": "NAME", "rules": ["stateName"]}]},
            "join": join
        }))
        .unwrap()
    }

    #[test]
    fn inner_merge_drops_unmatched_features() {
        let fc = merge_geometry(&states_path(), &config("inner"), &table()).unwrap();
        assert_eq!(fc.features.len(), 2);
        let ak = &fc.features[0];
        assert_eq!(ak.property("key"), Some(&json!("AK")));
        assert_eq!(ak.property("winner"), Some(&json!("republican")));
        // Alaska keeps its centre through the scaling, then moves by the offset.
        let x = ak.property("label_x").and_then(|v| v.as_f64()).unwrap();
        let y = ak.property("label_y").and_then(|v| v.as_f64()).unwrap();
        assert!(x.abs() < 1e-3);
        assert!((y + 3000000.0).abs() < 1e-3);
        // Ohio has no inset.
        let oh = &fc.features[1];
        let x = oh.property("label_x").and_then(|v| v.as_f64()).unwrap();
        assert!((x - 1150000.0).abs() < 1e-3);
    }

    #[test]
    fn outer_merge_marks_missing_rows() {
        let fc = merge_geometry(&states_path(), &config("outer"), &table()).unwrap();
        assert_eq!(fc.features.len(), 3);
        let missing: Vec<&Feature> = fc
            .features
            .iter()
            .filter(|f| f.property("missing") == Some(&json!(true)))
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].property("winner"), Some(&JSValue::Null));
    }
}
