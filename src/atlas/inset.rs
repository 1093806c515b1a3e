// Repositions territories that are drawn away from their true location on
// national maps.

use geo::{Geometry, Scale, Translate};

use crate::atlas::*;

/// One entry of the inset table.
#[derive(PartialEq, Debug, Clone)]
pub struct Inset {
    pub property: String,
    pub value: String,
    pub scale: (f64, f64),
    pub translate: (f64, f64),
}

impl Inset {
    /// Scales about the centre of the bounding rectangle, then translates.
    pub fn apply(&self, geom: &mut Geometry<f64>) {
        if self.scale != (1.0, 1.0) {
            geom.scale_xy_mut(self.scale.0, self.scale.1);
        }
        geom.translate_mut(self.translate.0, self.translate.1);
    }
}

/// The insets of the usual US state map in the EPSG:2163 projection.
pub fn default_insets() -> Vec<Inset> {
    vec![
        Inset {
            property: "NAME".to_string(),
            value: "Alaska".to_string(),
            scale: (0.6, 0.6),
            translate: (1700000.0, -5000000.0),
        },
        Inset {
            property: "NAME".to_string(),
            value: "Hawaii".to_string(),
            scale: (1.0, 1.0),
            translate: (6000000.0, -1800000.0),
        },
    ]
}

pub fn insets_from_config(config: &Option<Vec<InsetConfig>>) -> Vec<Inset> {
    match config {
        None => default_insets(),
        Some(l) => l
            .iter()
            .map(|c| Inset {
                property: c.property.clone(),
                value: c.value.clone(),
                scale: c.scale.map(|[x, y]| (x, y)).unwrap_or((1.0, 1.0)),
                translate: c.translate.map(|[x, y]| (x, y)).unwrap_or((0.0, 0.0)),
            })
            .collect(),
    }
}

/// The first inset whose property matches. String and numeric property values
/// are compared through their text form.
pub fn find_inset<'a>(insets: &'a [Inset], properties: &JSMap<String, JSValue>) -> Option<&'a Inset> {
    insets.iter().find(|inset| match properties.get(&inset.property) {
        Some(JSValue::String(s)) => *s == inset.value,
        Some(JSValue::Number(n)) => n.to_string() == inset.value,
        _ => false,
    })
}
