//! 2D coordinates and SVG depiction

use super::molecule::{BondOrder, Molecule};

const BOND_LENGTH: f64 = 1.0;
const LAYOUT_STEPS: usize = 300;
const ATOM_RADIUS: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Deterministic force-directed layout in bond-length units
pub fn layout(mol: &Molecule) -> Vec<Point> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let radius = 0.3 * n as f64 + BOND_LENGTH;
    let mut points: Vec<Point> = (0..n)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / n as f64;
            Point {
                x: radius * angle.cos(),
                y: radius * angle.sin(),
            }
        })
        .collect();

    for step in 0..LAYOUT_STEPS {
        let temperature = 0.2 * (1.0 - step as f64 / LAYOUT_STEPS as f64) + 0.005;
        let mut shift = vec![(0.0f64, 0.0f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy) = (points[i].x - points[j].x, points[i].y - points[j].y);
                let dist = (dx * dx + dy * dy).sqrt().max(0.01);
                let force = 0.4 / (dist * dist);
                shift[i].0 += dx / dist * force;
                shift[i].1 += dy / dist * force;
                shift[j].0 -= dx / dist * force;
                shift[j].1 -= dy / dist * force;
            }
        }
        for bond in mol.bonds() {
            let (i, j) = (bond.a, bond.b);
            let (dx, dy) = (points[j].x - points[i].x, points[j].y - points[i].y);
            let dist = (dx * dx + dy * dy).sqrt().max(0.01);
            let force = 2.0 * (dist - BOND_LENGTH);
            shift[i].0 += dx / dist * force;
            shift[i].1 += dy / dist * force;
            shift[j].0 -= dx / dist * force;
            shift[j].1 -= dy / dist * force;
        }

        for (point, (sx, sy)) in points.iter_mut().zip(shift) {
            let len = (sx * sx + sy * sy).sqrt();
            if len > 0.0 {
                let capped = len.min(temperature);
                point.x += sx / len * capped;
                point.y += sy / len * capped;
            }
        }
    }
    points
}

/// Render the molecule as an inline SVG; `fills` holds one CSS color per atom
pub fn depict_svg(mol: &Molecule, fills: &[String], width: u32, height: u32) -> String {
    let points = fit(&layout(mol), width as f64, height as f64);
    let mut svg = format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{width}' height='{height}' viewBox='0 0 {width} {height}'>"
    );

    for bond in mol.bonds() {
        let (a, b) = (points[bond.a], points[bond.b]);
        let offsets: &[f64] = match bond.order {
            BondOrder::Single | BondOrder::Aromatic => &[0.0],
            BondOrder::Double => &[-2.5, 2.5],
            BondOrder::Triple => &[-4.0, 0.0, 4.0],
            BondOrder::Quadruple => &[-5.0, -1.7, 1.7, 5.0],
        };
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = (dx * dx + dy * dy).sqrt().max(0.01);
        let (nx, ny) = (-dy / len, dx / len);
        for offset in offsets {
            let dash = if bond.order == BondOrder::Aromatic {
                " stroke-dasharray='4,2'"
            } else {
                ""
            };
            svg.push_str(&format!(
                "<line x1='{:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='#333' stroke-width='1.5'{dash}/>",
                a.x + nx * offset,
                a.y + ny * offset,
                b.x + nx * offset,
                b.y + ny * offset,
            ));
        }
    }

    for (index, (atom, point)) in mol.atoms().iter().zip(&points).enumerate() {
        let fill = fills.get(index).map(String::as_str).unwrap_or("#ffffff");
        svg.push_str(&format!(
            "<circle cx='{:.1}' cy='{:.1}' r='{ATOM_RADIUS}' fill='{fill}' stroke='#999' stroke-width='0.5'><title>{}{}</title></circle>",
            point.x, point.y, atom.symbol, index
        ));
        if atom.atomic_number != 6 || atom.charge != 0 {
            let charge = match atom.charge {
                0 => String::new(),
                1 => "+".to_string(),
                -1 => "-".to_string(),
                c if c > 0 => format!("{c}+"),
                c => format!("{}-", c.unsigned_abs()),
            };
            svg.push_str(&format!(
                "<text x='{:.1}' y='{:.1}' font-size='10' text-anchor='middle' dominant-baseline='central'>{}{}</text>",
                point.x, point.y, atom.symbol, charge
            ));
        }
    }
    svg.push_str("</svg>");
    svg
}

/// Scale and translate layout points into the drawing area
fn fit(points: &[Point], width: f64, height: f64) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    let margin = ATOM_RADIUS * 2.0;
    let (min_x, max_x) = bounds(points.iter().map(|p| p.x));
    let (min_y, max_y) = bounds(points.iter().map(|p| p.y));
    let span_x = (max_x - min_x).max(1e-6);
    let span_y = (max_y - min_y).max(1e-6);
    let scale = ((width - 2.0 * margin) / span_x)
        .min((height - 2.0 * margin) / span_y)
        .min(40.0);
    let offset_x = (width - (max_x - min_x) * scale) / 2.0;
    let offset_y = (height - (max_y - min_y) * scale) / 2.0;
    points
        .iter()
        .map(|p| Point {
            x: offset_x + (p.x - min_x) * scale,
            y: offset_y + (p.y - min_y) * scale,
        })
        .collect()
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chem::smiles;

    #[test]
    fn test_layout_is_deterministic_and_spreads_atoms() {
        let mol = smiles::parse("c1ccccc1O").unwrap();
        let first = layout(&mol);
        assert_eq!(first, layout(&mol));
        for bond in mol.bonds() {
            let (a, b) = (first[bond.a], first[bond.b]);
            let dist = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
            assert!(dist > 0.5 && dist < 2.0, "bond length {dist}");
        }
    }

    #[test]
    fn test_svg_contains_atoms_and_bonds() {
        let mol = smiles::parse("C=O").unwrap();
        let fills = vec!["#ff0000".to_string(), "#0000ff".to_string()];
        let svg = depict_svg(&mol, &fills, 200, 100);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<line").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains("#ff0000"));
        assert!(svg.contains(">O</text>"));
    }

    #[test]
    fn test_single_atom_is_centered() {
        let mol = smiles::parse("C").unwrap();
        let points = fit(&layout(&mol), 200.0, 100.0);
        assert!((points[0].x - 100.0).abs() < 1e-6);
        assert!((points[0].y - 50.0).abs() < 1e-6);
    }
}
