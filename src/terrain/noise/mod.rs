//! Layered noise evaluation.
//!
//! A [`NoiseField`] is built once from a validated [`NoiseLayerConfig`]
//! and then shared read-only across worker threads. Evaluation is pure:
//! for a fixed configuration, the same (x, y, sample center) always
//! produces the same elevation.

pub mod filters;

use glam::Vec2;

use crate::terrain::settings::{FilterParams, NoiseLayerConfig};
use filters::{BuiltFilter, PerlinFilter, RidgedFilter};

struct BuiltLayer {
    enabled: bool,
    strength: f32,
    use_first_layer_as_mask: bool,
    filter: BuiltFilter,
}

pub struct NoiseField {
    layers: Vec<BuiltLayer>,
    global_height_scale: f32,
}

impl NoiseField {
    /// Build the field from a validated configuration. Filter objects and
    /// octave offsets are constructed here, once, so sampling never
    /// rebuilds generators.
    pub fn new(config: &NoiseLayerConfig) -> Self {
        let layers = config
            .layers
            .iter()
            .map(|layer| BuiltLayer {
                enabled: layer.enabled,
                strength: layer.strength,
                use_first_layer_as_mask: layer.use_first_layer_as_mask,
                filter: match &layer.filter {
                    FilterParams::Perlin(params) => BuiltFilter::Perlin(PerlinFilter::new(params)),
                    FilterParams::Ridged(params) => BuiltFilter::Ridged(RidgedFilter::new(params)),
                },
            })
            .collect();
        NoiseField {
            layers,
            global_height_scale: config.global_height_scale,
        }
    }

    /// Combined elevation at (x, y) offset by `sample_center`.
    ///
    /// Layers are summed weighted by strength; a layer flagged
    /// `use_first_layer_as_mask` is additionally multiplied by the raw
    /// value of layer 0 so it only contributes where the base layer is
    /// active. The sum is divided by the number of contributing (enabled)
    /// layers and by the global height scale.
    pub fn evaluate(&self, x: f32, y: f32, sample_center: Vec2) -> f32 {
        if self.layers.is_empty() {
            return 0.0;
        }
        let base_raw = self.layers[0].filter.evaluate(x, y, sample_center);

        let mut combined = 0.0;
        let mut contributing = 0u32;
        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.enabled {
                continue;
            }
            let mut value = if i == 0 {
                base_raw
            } else {
                layer.filter.evaluate(x, y, sample_center)
            };
            if i > 0 && layer.use_first_layer_as_mask {
                value *= base_raw;
            }
            combined += value * layer.strength;
            contributing += 1;
        }
        if contributing == 0 {
            return 0.0;
        }
        combined / contributing as f32 / self.global_height_scale
    }

    /// Analytic upper bound of `evaluate`. Mirrors the combination
    /// term-for-term; global heightmap normalization depends on the two
    /// staying in lockstep.
    pub fn max_amplitude(&self) -> f32 {
        if self.layers.is_empty() {
            return 0.0;
        }
        let base_max = self.layers[0].filter.max_value();

        let mut combined = 0.0;
        let mut contributing = 0u32;
        for (i, layer) in self.layers.iter().enumerate() {
            if !layer.enabled {
                continue;
            }
            let mut value = if i == 0 {
                base_max
            } else {
                layer.filter.max_value()
            };
            if i > 0 && layer.use_first_layer_as_mask {
                value *= base_max;
            }
            combined += value * layer.strength;
            contributing += 1;
        }
        if contributing == 0 {
            return 0.0;
        }
        combined / contributing as f32 / self.global_height_scale
    }

    /// Analytic lower bound, mirroring the filters' declared minimum.
    pub fn min_amplitude(&self) -> f32 {
        let mut combined = 0.0;
        let mut contributing = 0u32;
        for layer in &self.layers {
            if !layer.enabled {
                continue;
            }
            combined += layer.filter.min_value() * layer.strength;
            contributing += 1;
        }
        if contributing == 0 {
            return 0.0;
        }
        combined / contributing as f32 / self.global_height_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::settings::{NoiseLayer, PerlinParams};

    fn two_layer_config(mask: bool) -> NoiseLayerConfig {
        NoiseLayerConfig {
            global_height_scale: 1.0,
            layers: vec![
                NoiseLayer {
                    enabled: true,
                    strength: 1.0,
                    use_first_layer_as_mask: false,
                    filter: FilterParams::Perlin(PerlinParams {
                        seed: 11,
                        ..PerlinParams::default()
                    }),
                },
                NoiseLayer {
                    enabled: true,
                    strength: 0.5,
                    use_first_layer_as_mask: mask,
                    filter: FilterParams::Perlin(PerlinParams {
                        seed: 23,
                        scale: 20.0,
                        ..PerlinParams::default()
                    }),
                },
            ],
        }
    }

    // Same configuration, same inputs, same output, across independently
    // built fields.
    #[test]
    fn test_field_deterministic() {
        let config = two_layer_config(true);
        let a = NoiseField::new(&config);
        let b = NoiseField::new(&config);
        for i in 0..32 {
            let x = i as f32 * 2.13 - 30.0;
            let y = i as f32 * -0.77;
            let center = Vec2::new(240.0, -480.0);
            assert_eq!(a.evaluate(x, y, center), b.evaluate(x, y, center));
        }
    }

    #[test]
    fn test_zero_enabled_layers_yield_zero_field() {
        let mut config = two_layer_config(false);
        for layer in &mut config.layers {
            layer.enabled = false;
        }
        let field = NoiseField::new(&config);
        assert_eq!(field.evaluate(12.0, -7.0, Vec2::ZERO), 0.0);
        assert_eq!(field.max_amplitude(), 0.0);
    }

    #[test]
    fn test_no_layers_yield_zero_field() {
        let field = NoiseField::new(&NoiseLayerConfig {
            global_height_scale: 1.0,
            layers: Vec::new(),
        });
        assert_eq!(field.evaluate(1.0, 2.0, Vec2::ZERO), 0.0);
    }

    #[test]
    fn test_samples_bounded_by_max_amplitude() {
        for mask in [false, true] {
            let field = NoiseField::new(&two_layer_config(mask));
            let bound = field.max_amplitude();
            for i in 0..128 {
                let v = field.evaluate(i as f32 * 3.3, i as f32 * -2.9, Vec2::new(53.0, 53.0));
                assert!(
                    v.abs() <= bound,
                    "mask={mask}: sample {v} exceeds bound {bound}"
                );
            }
        }
    }

    #[test]
    fn test_global_scale_divides_output() {
        let mut config = two_layer_config(false);
        let base = NoiseField::new(&config);
        config.global_height_scale = 4.0;
        let scaled = NoiseField::new(&config);
        let v = base.evaluate(17.0, 5.0, Vec2::ZERO);
        let s = scaled.evaluate(17.0, 5.0, Vec2::ZERO);
        assert!((v / 4.0 - s).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_layer_does_not_contribute() {
        let mut config = two_layer_config(false);
        config.layers[1].enabled = false;
        let field = NoiseField::new(&config);

        let solo = NoiseLayerConfig {
            global_height_scale: 1.0,
            layers: vec![config.layers[0].clone()],
        };
        let solo_field = NoiseField::new(&solo);
        let v = field.evaluate(3.0, 4.0, Vec2::ZERO);
        assert_eq!(v, solo_field.evaluate(3.0, 4.0, Vec2::ZERO));
    }
}
