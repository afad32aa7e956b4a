//! Atom contribution rendering.
//!
//! All records of a batch share one symmetric color scale, so colors are
//! comparable across rows. Rendering settings are passed in explicitly.

use crate::chem::depict::depict_svg;
use crate::chem::{smiles, Canonicalizer, Molecule};
use crate::models::pipeline::AtomContributions;
use crate::resolver::ResolvedRecord;
use crate::types::{ResultTable, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caption under the color-bar legend
pub const LEGEND_CAPTION: &str = "Color scale";
/// Prefix of table cells whose text is not a structure
pub const NOT_PARSABLE: &str = "Not parsable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Depiction width in pixels
    pub width: u32,
    /// Depiction height in pixels
    pub height: u32,
    /// Number of color steps in the legend bar
    pub colorbar_steps: usize,
    /// Decimal places of legend tick labels
    pub label_precision: usize,
    pub orientation: Orientation,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 200,
            colorbar_steps: 10,
            label_precision: 2,
            orientation: Orientation::Horizontal,
        }
    }
}

/// Symmetric diverging scale: blue for negative, white at zero, red for positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn symmetric(limit: f64) -> Self {
        let limit = limit.abs();
        Self {
            min: -limit,
            max: limit,
        }
    }

    /// Scale spanning the largest absolute contribution of all records
    pub fn global(contributions: &[AtomContributions]) -> Self {
        let limit = contributions
            .iter()
            .flat_map(|record| record.values())
            .flat_map(|atoms| atoms.values())
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        Self::symmetric(limit)
    }

    /// Position of `value` on the scale in `[0, 1]`
    pub fn position(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !value.is_finite() {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    /// CSS hex color of `value`
    pub fn color(&self, value: f64) -> String {
        let t = self.position(value);
        let (r, g, b) = if t < 0.5 {
            let c = (2.0 * t * 255.0).round() as u8;
            (c, c, 255)
        } else {
            let c = (2.0 * (1.0 - t) * 255.0).round() as u8;
            (255, c, c)
        };
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// Renderings of one batch
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBatch {
    pub scale: ColorScale,
    /// One HTML snippet per record
    pub cells: Vec<String>,
    /// Color-bar legend HTML
    pub legend: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContributionRenderer {
    config: RendererConfig,
}

impl ContributionRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Render every record on a shared scale, plus the legend
    pub fn render_batch(
        &self,
        fields: &[String],
        records: &[ResolvedRecord],
        contributions: &[AtomContributions],
    ) -> RenderedBatch {
        let scale = ColorScale::global(contributions);
        let empty = AtomContributions::new();
        let cells = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let record_contributions = contributions.get(i).unwrap_or(&empty);
                self.render_record(fields, record, record_contributions, &scale)
            })
            .collect();
        RenderedBatch {
            scale,
            cells,
            legend: self.render_legend(&scale),
        }
    }

    /// HTML snippet with one colored depiction per molecule field
    pub fn render_record(
        &self,
        fields: &[String],
        record: &ResolvedRecord,
        contributions: &AtomContributions,
        scale: &ColorScale,
    ) -> String {
        let mut html = String::from("<div class='coloratom'>");
        for (field, value) in fields.iter().zip(&record.values) {
            let Some(mol) = value.as_molecule() else {
                continue;
            };
            let atoms = contributions.get(field);
            let fills: Vec<String> = (0..mol.atom_count())
                .map(|atom| {
                    let v = atoms.and_then(|a| a.get(&atom)).copied().unwrap_or(0.0);
                    scale.color(v)
                })
                .collect();
            html.push_str(&depict_svg(mol, &fills, self.config.width, self.config.height));
        }
        html.push_str("</div>");
        html
    }

    /// Color bar from `scale.min` to `scale.max` with min/zero/max labels
    pub fn render_legend(&self, scale: &ColorScale) -> String {
        let steps = self.config.colorbar_steps.max(2);
        let precision = self.config.label_precision;
        let (bar_len, thickness) = (self.config.width.max(100) as f64, 16.0);
        let horizontal = self.config.orientation == Orientation::Horizontal;
        let (width, height) = if horizontal {
            (bar_len + 20.0, thickness + 24.0)
        } else {
            (thickness + 70.0, bar_len + 20.0)
        };
        let cell = bar_len / steps as f64;

        let mut svg =
            format!("<svg xmlns='http://www.w3.org/2000/svg' width='{width:.0}' height='{height:.0}'>");
        for step in 0..steps {
            let value = scale.min + (scale.max - scale.min) * (step as f64 + 0.5) / steps as f64;
            let fill = scale.color(value);
            if horizontal {
                svg.push_str(&format!(
                    "<rect x='{:.1}' y='0' width='{:.1}' height='{thickness}' fill='{fill}'/>",
                    10.0 + cell * step as f64,
                    cell
                ));
            } else {
                // vertical bars grow upwards
                svg.push_str(&format!(
                    "<rect x='0' y='{:.1}' width='{thickness}' height='{:.1}' fill='{fill}'/>",
                    10.0 + bar_len - cell * (step as f64 + 1.0),
                    cell
                ));
            }
        }
        for (fraction, value) in [(0.0, scale.min), (0.5, 0.0), (1.0, scale.max)] {
            let label = format!("{value:.precision$}");
            if horizontal {
                svg.push_str(&format!(
                    "<text x='{:.1}' y='{:.1}' font-size='10' text-anchor='middle'>{label}</text>",
                    10.0 + bar_len * fraction,
                    thickness + 14.0
                ));
            } else {
                svg.push_str(&format!(
                    "<text x='{:.1}' y='{:.1}' font-size='10' dominant-baseline='central'>{label}</text>",
                    thickness + 6.0,
                    10.0 + bar_len * (1.0 - fraction)
                ));
            }
        }
        svg.push_str("</svg>");

        format!(
            "<span style='text-align:center'>{svg}<p style='margin:0; padding:0;'>{LEGEND_CAPTION}</p></span>"
        )
    }

    /// Replace every cell of the named columns with an SVG depiction of its
    /// structure. Cells that do not parse become `Not parsable <value>`.
    /// Null cells and columns missing from the table are left alone.
    pub fn depict_columns<C: Canonicalizer>(
        &self,
        table: &mut ResultTable,
        columns: &[String],
        canonicalizer: &C,
    ) {
        for column in columns {
            table.map_column(column, |value| self.depict_cell(value, canonicalizer));
        }
    }

    fn depict_cell<C: Canonicalizer>(&self, value: Value, canonicalizer: &C) -> Value {
        let text = match value {
            Value::Null => return Value::Null,
            Value::Molecule(mol) => return Value::Text(self.depict(&mol)),
            other => other.to_string(),
        };
        let canonical = smiles::parse(&text)
            .map_err(|e| e.to_string())
            .and_then(|mol| {
                canonicalizer
                    .canonicalize_retrying(&mol)
                    .map_err(|e| e.to_string())
            });
        match canonical {
            Ok(mol) => Value::Text(self.depict(&mol)),
            Err(reason) => {
                debug!(value = %text, reason = %reason, "Cell is not a structure");
                Value::Text(format!("{NOT_PARSABLE} {text}"))
            }
        }
    }

    fn depict(&self, mol: &Molecule) -> String {
        depict_svg(mol, &[], self.config.width, self.config.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::GraphCanonicalizer;
    use crate::resolver::FieldResolver;
    use std::collections::BTreeMap;

    fn record_with_max(max: f64) -> AtomContributions {
        let mut atoms = BTreeMap::new();
        atoms.insert(0, max / 2.0);
        atoms.insert(1, -max);
        let mut record = AtomContributions::new();
        record.insert("SMILES".to_string(), atoms);
        record
    }

    #[test]
    fn test_global_scale_uses_batch_maximum() {
        let batch: Vec<_> = [2.0, 5.0, 1.0].into_iter().map(record_with_max).collect();
        let scale = ColorScale::global(&batch);
        assert_eq!(scale, ColorScale { min: -5.0, max: 5.0 });
    }

    #[test]
    fn test_scale_colors() {
        let scale = ColorScale::symmetric(2.0);
        assert_eq!(scale.color(0.0), "#ffffff");
        assert_eq!(scale.color(2.0), "#ff0000");
        assert_eq!(scale.color(-2.0), "#0000ff");
        assert_eq!(scale.color(10.0), "#ff0000");
    }

    #[test]
    fn test_zero_scale_is_neutral() {
        let scale = ColorScale::global(&[]);
        assert_eq!(scale, ColorScale::symmetric(0.0));
        assert_eq!(scale.color(3.0), "#ffffff");
    }

    #[test]
    fn test_legend_labels_and_caption() {
        let renderer = ContributionRenderer::new(RendererConfig {
            colorbar_steps: 4,
            label_precision: 1,
            ..RendererConfig::default()
        });
        let legend = renderer.render_legend(&ColorScale::symmetric(5.0));
        assert!(legend.contains(">-5.0<"));
        assert!(legend.contains(">0.0<"));
        assert!(legend.contains(">5.0<"));
        assert!(legend.ends_with("Color scale</p></span>"));
        assert_eq!(legend.matches("<rect").count(), 4);
    }

    #[test]
    fn test_records_share_scale() {
        let resolver = FieldResolver::new();
        let fields = vec!["SMILES".to_string()];
        let batch = resolver.resolve_text("CC\nCC", &fields);
        let contributions = vec![record_with_max(1.0), record_with_max(4.0)];

        let renderer = ContributionRenderer::default();
        let rendered = renderer.render_batch(&fields, &batch.records, &contributions);
        assert_eq!(rendered.scale, ColorScale::symmetric(4.0));
        assert_eq!(rendered.cells.len(), 2);
        // -1.0 on a +-4 scale is light blue, not saturated
        assert!(rendered.cells[0].contains(&ColorScale::symmetric(4.0).color(-1.0)));
        assert!(rendered.cells[1].contains("fill='#0000ff'"));
        assert!(rendered.cells.iter().all(|c| c.starts_with("<div class='coloratom'><svg")));
    }

    #[test]
    fn test_depict_columns() {
        let mut table = ResultTable::new(vec!["SMILES".into(), "Solvent".into()]);
        table
            .push_row(vec![Value::Text("OCC".into()), Value::Category("water".into())])
            .unwrap();
        table
            .push_row(vec![Value::Text("C1CC".into()), Value::Category("DMSO".into())])
            .unwrap();
        table.push_row(vec![Value::Null]).unwrap();

        let renderer = ContributionRenderer::new(RendererConfig {
            width: 200,
            height: 100,
            ..RendererConfig::default()
        });
        let columns = vec!["SMILES".to_string(), "Absent".to_string()];
        renderer.depict_columns(&mut table, &columns, &GraphCanonicalizer);

        let depicted = table.get(0, "SMILES").and_then(Value::as_text).unwrap();
        assert!(depicted.starts_with("<svg"));
        assert!(depicted.contains("width='200' height='100'"));
        assert_eq!(depicted.matches("<circle").count(), 3);
        assert_eq!(
            table.get(1, "SMILES"),
            Some(&Value::Text("Not parsable C1CC".to_string()))
        );
        assert_eq!(table.get(2, "SMILES"), Some(&Value::Null));
        assert_eq!(table.get(0, "Solvent"), Some(&Value::Category("water".into())));
        assert_eq!(table.columns(), &["SMILES", "Solvent"]);
    }
}
