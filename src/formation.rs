//! Formation resources: loaded tables and generated patterns
//!
//! A formation is an ordered list of target points, one per drone index.
//! Loaded formations live in CSV tables addressed by
//! `{dimensionality}/{agent_count}_{name}.csv`; generated patterns cover
//! the built-in commands (default grid, spiral, random scatter).

use crate::types::{Result, SwarmError, Vec3};
use rand::Rng;
use std::path::{Path, PathBuf};

/// A loaded formation table
#[derive(Debug, Clone, PartialEq)]
pub struct Formation {
    /// One target point per drone index
    pub points: Vec<Vec3>,
    /// True for 2D tables, whose z must be filled in by the caller
    pub planar: bool,
}

impl Formation {
    /// Number of drones this formation addresses
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the formation has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with a uniform z substituted for planar formations.
    /// 3D formations are returned unchanged.
    pub fn with_height(&self, z: f32) -> Vec<Vec3> {
        if self.planar {
            self.points.iter().map(|p| Vec3::new(p.x, p.y, z)).collect()
        } else {
            self.points.clone()
        }
    }
}

/// Reads formation tables from a base directory.
#[derive(Debug, Clone)]
pub struct FormationLoader {
    base_dir: PathBuf,
}

impl FormationLoader {
    /// Create a loader rooted at `base_dir`
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Load a formation by id, e.g. `"2D/3_default"` for a three-drone
    /// planar formation named `default`.
    ///
    /// Rows are one drone each, columns numeric `x, y[, z]`. 2D tables
    /// must carry exactly two columns, 3D tables exactly three.
    pub fn load(&self, formation_id: &str) -> Result<Formation> {
        let planar = match formation_id.split('/').next() {
            Some("2D") => true,
            Some("3D") => false,
            _ => {
                return Err(SwarmError::FormationNotFound(formation_id.into()));
            }
        };

        let path = self.base_dir.join(format!("{formation_id}.csv"));
        if !path.is_file() {
            return Err(SwarmError::FormationNotFound(formation_id.into()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| SwarmError::FormationFormat(format!("{formation_id}: {e}")))?;

        let expected_cols = if planar { 2 } else { 3 };
        let mut points = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record =
                record.map_err(|e| SwarmError::FormationFormat(format!("{formation_id}: {e}")))?;
            if record.len() != expected_cols {
                return Err(SwarmError::FormationFormat(format!(
                    "{formation_id}: row {row} has {} columns, expected {expected_cols}",
                    record.len()
                )));
            }

            let mut coords = [0.0f32; 3];
            for (col, field) in record.iter().enumerate() {
                coords[col] = field.parse::<f32>().map_err(|_| {
                    SwarmError::FormationFormat(format!(
                        "{formation_id}: row {row} column {col}: not a number: {field:?}"
                    ))
                })?;
            }
            points.push(Vec3::new(coords[0], coords[1], coords[2]));
        }

        Ok(Formation { points, planar })
    }

    /// Compose the id for a count/name pair, trying 3D before 2D.
    ///
    /// Returns the first id for which a table exists, or
    /// `FormationNotFound` naming the 2D candidate.
    pub fn resolve(&self, count: usize, name: &str) -> Result<String> {
        for dim in ["3D", "2D"] {
            let id = format!("{dim}/{count}_{name}");
            if self.base_dir.join(format!("{id}.csv")).is_file() {
                return Ok(id);
            }
        }
        Err(SwarmError::FormationNotFound(format!("2D/{count}_{name}")))
    }
}

/// Centered grid, row-major, at a uniform height. Used as the default
/// (go-home) formation.
pub fn grid_points(count: usize, spacing: f32, height: f32) -> Vec<Vec3> {
    let side = libm::ceilf(libm::sqrtf(count as f32)).max(1.0) as usize;
    let rows = count.div_ceil(side);
    let offset_x = (side as f32 - 1.0) / 2.0 * spacing;
    let offset_y = (rows as f32 - 1.0) / 2.0 * spacing;

    (0..count)
        .map(|i| {
            let row = i / side;
            let col = i % side;
            Vec3::new(
                col as f32 * spacing - offset_x,
                row as f32 * spacing - offset_y,
                height,
            )
        })
        .collect()
}

/// Rising spiral around the origin
pub fn spiral_points(count: usize, radius: f32, turn_step: f32, height_step: f32, base_height: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 * turn_step;
            Vec3::new(
                libm::cosf(angle) * radius,
                libm::sinf(angle) * radius,
                base_height + i as f32 * height_step,
            )
        })
        .collect()
}

/// Uniform random scatter inside a square of half-width `extent`,
/// altitude jittered around `height`.
pub fn random_points<R: Rng>(count: usize, extent: f32, height: f32, rng: &mut R) -> Vec<Vec3> {
    (0..count)
        .map(|_| {
            Vec3::new(
                rng.gen_range(-extent..=extent),
                rng.gen_range(-extent..=extent),
                (height + rng.gen_range(-0.2..=0.2f32)).max(0.1),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_table(dir: &Path, id: &str, contents: &str) {
        let path = dir.join(format!("{id}.csv"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn test_load_planar_table() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "2D/3_default", "0.0,0.0\n1.0,0.0\n0.5,1.0\n");

        let loader = FormationLoader::new(dir.path());
        let formation = loader.load("2D/3_default").unwrap();
        assert!(formation.planar);
        assert_eq!(formation.len(), 3);
        assert_eq!(formation.points[1], Vec3::new(1.0, 0.0, 0.0));

        let raised = formation.with_height(1.5);
        assert_eq!(raised[2], Vec3::new(0.5, 1.0, 1.5));
    }

    #[test]
    fn test_load_spatial_table() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "3D/2_stack", "0,0,1\n0,0,2\n");

        let loader = FormationLoader::new(dir.path());
        let formation = loader.load("3D/2_stack").unwrap();
        assert!(!formation.planar);
        assert_eq!(formation.points[1], Vec3::new(0.0, 0.0, 2.0));
        // with_height leaves 3D formations alone
        assert_eq!(formation.with_height(9.0)[1], Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FormationLoader::new(dir.path());
        assert_eq!(
            loader.load("2D/5_missing"),
            Err(SwarmError::FormationNotFound("2D/5_missing".into()))
        );
    }

    #[test]
    fn test_bad_dimensionality_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FormationLoader::new(dir.path());
        assert!(matches!(
            loader.load("4D/3_default"),
            Err(SwarmError::FormationNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "2D/2_bad", "0.0,0.0\n1.0,zzz\n");
        write_table(dir.path(), "2D/2_wide", "0.0,0.0,0.0\n1.0,1.0,1.0\n");

        let loader = FormationLoader::new(dir.path());
        assert!(matches!(
            loader.load("2D/2_bad"),
            Err(SwarmError::FormationFormat(_))
        ));
        assert!(matches!(
            loader.load("2D/2_wide"),
            Err(SwarmError::FormationFormat(_))
        ));
    }

    #[test]
    fn test_resolve_prefers_spatial() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "2D/3_both", "0,0\n1,1\n2,2\n");
        write_table(dir.path(), "3D/3_both", "0,0,1\n1,1,1\n2,2,1\n");

        let loader = FormationLoader::new(dir.path());
        assert_eq!(loader.resolve(3, "both").unwrap(), "3D/3_both");
        assert!(loader.resolve(4, "both").is_err());
    }

    #[test]
    fn test_grid_points() {
        let points = grid_points(4, 1.0, 1.0);
        assert_eq!(points.len(), 4);
        // 2x2 grid centered at origin
        assert_eq!(points[0], Vec3::new(-0.5, -0.5, 1.0));
        assert_eq!(points[3], Vec3::new(0.5, 0.5, 1.0));
    }

    #[test]
    fn test_spiral_rises() {
        let points = spiral_points(5, 1.0, 0.5, 0.2, 0.5);
        assert_eq!(points.len(), 5);
        for pair in points.windows(2) {
            assert!(pair[1].z > pair[0].z);
        }
    }

    #[test]
    fn test_random_points_in_bounds() {
        let mut rng = SmallRng::seed_from_u64(7);
        let points = random_points(20, 1.5, 1.0, &mut rng);
        assert_eq!(points.len(), 20);
        for p in &points {
            assert!(p.x.abs() <= 1.5 && p.y.abs() <= 1.5);
            assert!(p.z >= 0.1);
        }
    }
}
