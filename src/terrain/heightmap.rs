//! Heightmap generation: noise field sampling, falloff masking and
//! normalization.

use std::sync::Arc;

use glam::Vec2;

use crate::error::ConfigError;
use crate::terrain::curve::ResponseCurve;
use crate::terrain::grid::FloatGrid;
use crate::terrain::noise::NoiseField;
use crate::terrain::settings::{HeightmapSettings, NormalizeMode};

/// Elevations for one chunk, in final world-height units, together with
/// the observed range. Immutable after construction; owned by the chunk
/// that requested it and only lent to the mesh builder.
#[derive(Debug, Clone)]
pub struct Heightmap {
    pub values: FloatGrid,
    pub min_value: f32,
    pub max_value: f32,
}

/// Radial mask pushing elevation down toward the map edges.
///
/// Defined in a fixed reference frame and indexed by grid position, so it
/// is computed once per grid size and shared read-only across every
/// worker; it is never recomputed per chunk.
pub struct FalloffMap {
    grid: FloatGrid,
}

impl FalloffMap {
    pub fn generate(width: usize, height: usize, curve: &ResponseCurve) -> Self {
        let grid = FloatGrid::from_fn(width, height, |col, row| {
            // Centered lattice over [-1, 1] in both axes.
            let x = if width > 1 {
                col as f32 / (width - 1) as f32 * 2.0 - 1.0
            } else {
                0.0
            };
            let y = if height > 1 {
                row as f32 / (height - 1) as f32 * 2.0 - 1.0
            } else {
                0.0
            };
            curve.evaluate(x.abs().max(y.abs()))
        });
        FalloffMap { grid }
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.grid.get(x, y)
    }
}

/// Builds chunk heightmaps off-thread. Cheap to share: the settings, the
/// built noise field and the falloff mask are all immutable.
pub struct HeightmapGenerator {
    settings: HeightmapSettings,
    field: NoiseField,
    falloff: Option<Arc<FalloffMap>>,
    width: usize,
    height: usize,
}

impl HeightmapGenerator {
    /// Validates the settings, builds the noise field and precomputes the
    /// falloff mask for the given grid size.
    pub fn new(
        settings: &HeightmapSettings,
        width: usize,
        height: usize,
    ) -> Result<Self, ConfigError> {
        let settings = settings.validated()?;
        let field = NoiseField::new(&settings.noise);
        let falloff = settings
            .use_falloff
            .then(|| Arc::new(FalloffMap::generate(width, height, &settings.falloff_curve)));
        Ok(HeightmapGenerator {
            settings,
            field,
            falloff,
            width,
            height,
        })
    }

    pub fn grid_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn generate(&self, sample_center: Vec2) -> Heightmap {
        generate_heightmap(
            self.width,
            self.height,
            &self.settings,
            &self.field,
            self.falloff.as_deref(),
            sample_center,
        )
    }
}

/// Generate one heightmap grid.
///
/// Per cell: evaluate the noise field at `(local - half_grid) +
/// sample_center`, subtract the falloff value, clamp at zero, normalize,
/// then map through the height curve scaled by the height multiplier.
///
/// Normalization modes:
/// - `Local` rescales the observed [min, max] of this one grid. Two
///   adjacent chunks compute different ranges, so their edges will not
///   match; acceptable only for visually independent chunks.
/// - `Global` divides by `max_amplitude / global_height_scale`, an
///   analytic constant, so the same world point produces the same value
///   no matter which chunk's grid sampled it.
pub fn generate_heightmap(
    width: usize,
    height: usize,
    settings: &HeightmapSettings,
    field: &NoiseField,
    falloff: Option<&FalloffMap>,
    sample_center: Vec2,
) -> Heightmap {
    let half_width = width as f32 / 2.0;
    let half_height = height as f32 / 2.0;
    let mut grid = FloatGrid::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut elevation =
                field.evaluate(x as f32 - half_width, y as f32 - half_height, sample_center);
            if let Some(mask) = falloff {
                elevation -= mask.get(x, y);
            }
            grid.set(x, y, elevation.max(0.0));
        }
    }

    match settings.normalize_mode {
        NormalizeMode::Local => {
            let (min, max) = grid.min_max();
            let span = (max - min).max(f32::EPSILON);
            for y in 0..height {
                for x in 0..width {
                    grid.set(x, y, (grid.get(x, y) - min) / span);
                }
            }
        }
        NormalizeMode::Global => {
            let divisor =
                (field.max_amplitude() / settings.noise.global_height_scale).max(f32::EPSILON);
            for y in 0..height {
                for x in 0..width {
                    grid.set(x, y, grid.get(x, y) / divisor);
                }
            }
        }
    }

    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;
    for y in 0..height {
        for x in 0..width {
            let h = settings.height_curve.evaluate(grid.get(x, y)) * settings.height_multiplier;
            if h < min_value {
                min_value = h;
            }
            if h > max_value {
                max_value = h;
            }
            grid.set(x, y, h);
        }
    }

    Heightmap {
        values: grid,
        min_value,
        max_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::settings::{FilterParams, NoiseLayer, NoiseLayerConfig, PerlinParams};

    fn test_settings(mode: NormalizeMode) -> HeightmapSettings {
        HeightmapSettings {
            noise: NoiseLayerConfig {
                global_height_scale: 1.0,
                layers: vec![NoiseLayer {
                    enabled: true,
                    strength: 1.0,
                    use_first_layer_as_mask: false,
                    filter: FilterParams::Perlin(PerlinParams {
                        seed: 99,
                        scale: 25.0,
                        ..PerlinParams::default()
                    }),
                }],
            },
            normalize_mode: mode,
            use_falloff: false,
            falloff_curve: ResponseCurve::linear(),
            height_multiplier: 10.0,
            height_curve: ResponseCurve::linear(),
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = HeightmapGenerator::new(&test_settings(NormalizeMode::Global), 16, 16)
            .unwrap();
        let a = generator.generate(Vec2::new(48.0, -48.0));
        let b = generator.generate(Vec2::new(48.0, -48.0));
        assert_eq!(a.values, b.values);
    }

    // Global mode: evaluating the same noise-space point through two
    // different chunk grids must agree within float tolerance. A grid
    // cell (x, y) with sample center c maps to noise point
    // (x + c.x, y - c.y), so shifting the center by (s, s) shifts the
    // overlapping cells by (-s, +s).
    #[test]
    fn test_global_normalization_is_seam_consistent() {
        let generator =
            HeightmapGenerator::new(&test_settings(NormalizeMode::Global), 16, 16).unwrap();
        let shift = 4.0;
        let a = generator.generate(Vec2::ZERO);
        let b = generator.generate(Vec2::new(shift, shift));
        for y in 0..12usize {
            for x in 4..16usize {
                let va = a.values.get(x, y);
                let vb = b.values.get(x - 4, y + 4);
                assert!(
                    (va - vb).abs() < 1e-3,
                    "seam mismatch at ({x},{y}): {va} vs {vb}"
                );
            }
        }
    }

    // Local mode rescales per grid, so overlapping points are expected to
    // disagree between chunks.
    #[test]
    fn test_local_normalization_does_not_match_across_grids() {
        let generator =
            HeightmapGenerator::new(&test_settings(NormalizeMode::Local), 16, 16).unwrap();
        let a = generator.generate(Vec2::ZERO);
        let b = generator.generate(Vec2::new(4.0, 4.0));
        let mut any_mismatch = false;
        for y in 0..12usize {
            for x in 4..16usize {
                if (a.values.get(x, y) - b.values.get(x - 4, y + 4)).abs() > 1e-3 {
                    any_mismatch = true;
                }
            }
        }
        assert!(any_mismatch, "local grids matched; expected divergence");
    }

    #[test]
    fn test_local_normalization_spans_unit_range() {
        let generator =
            HeightmapGenerator::new(&test_settings(NormalizeMode::Local), 24, 24).unwrap();
        let map = generator.generate(Vec2::ZERO);
        // height_multiplier 10 with an identity curve: range is [0, 10].
        assert!((map.min_value - 0.0).abs() < 1e-4);
        assert!((map.max_value - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_falloff_map_is_point_symmetric() {
        let size = 33;
        let map = FalloffMap::generate(size, size, &ResponseCurve::linear());
        for y in 0..size {
            for x in 0..size {
                let mirrored = map.get(size - 1 - x, size - 1 - y);
                assert!(
                    (map.get(x, y) - mirrored).abs() < 1e-6,
                    "falloff not symmetric at ({x},{y})"
                );
            }
        }
    }

    #[test]
    fn test_falloff_is_one_at_corners_and_zero_at_center() {
        let size = 17;
        let map = FalloffMap::generate(size, size, &ResponseCurve::linear());
        assert!((map.get(0, 0) - 1.0).abs() < 1e-6);
        assert!((map.get(size - 1, size - 1) - 1.0).abs() < 1e-6);
        assert!(map.get(size / 2, size / 2).abs() < 1e-6);
    }

    #[test]
    fn test_falloff_lowers_border_heights() {
        let mut settings = test_settings(NormalizeMode::Global);
        settings.use_falloff = true;
        let with = HeightmapGenerator::new(&settings, 16, 16).unwrap().generate(Vec2::ZERO);
        settings.use_falloff = false;
        let without = HeightmapGenerator::new(&settings, 16, 16)
            .unwrap()
            .generate(Vec2::ZERO);
        for x in 0..16usize {
            assert!(with.values.get(x, 0) <= without.values.get(x, 0) + 1e-6);
        }
    }

    #[test]
    fn test_observed_range_tracked() {
        let generator =
            HeightmapGenerator::new(&test_settings(NormalizeMode::Global), 16, 16).unwrap();
        let map = generator.generate(Vec2::ZERO);
        let (min, max) = map.values.min_max();
        assert_eq!(min, map.min_value);
        assert_eq!(max, map.max_value);
    }
}
