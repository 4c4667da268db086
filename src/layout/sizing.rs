//! Layer box sizing
//!
//! Boxes grow with parameter count on a clipped log scale: the scale is
//! `log10(max(1, params)) / 4` clamped to [1, 2], so anything up to 10^4
//! parameters gets the base box and anything past 10^8 gets double size.

use super::Vec3;
use crate::model::LayerNode;

/// Width, height and depth of a scale-1 layer box
pub const BASE_SIZE: Vec3 = [1.2, 0.6, 0.4];

pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 2.0;

/// Scale factor for a parameter count
///
/// Zero, negative and NaN counts resolve to exactly 1.
pub fn box_scale(param_count: f64) -> f32 {
    let log = param_count.max(1.0).log10();
    if !log.is_finite() {
        return MIN_SCALE;
    }
    ((log / 4.0) as f32).clamp(MIN_SCALE, MAX_SCALE)
}

/// Scale factor for a layer, using its display parameter count
pub fn layer_scale(layer: &LayerNode) -> f32 {
    box_scale(layer.param_count().unwrap_or(1) as f64)
}

/// Box extent for a layer
pub fn layer_size(layer: &LayerNode) -> Vec3 {
    let scale = layer_scale(layer);
    [BASE_SIZE[0] * scale, BASE_SIZE[1] * scale, BASE_SIZE[2] * scale]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(0.0, 1.0; "zero")]
    #[test_case(-250.0, 1.0; "negative")]
    #[test_case(f64::NAN, 1.0; "nan")]
    #[test_case(f64::INFINITY, 1.0; "infinite")]
    #[test_case(1.0, 1.0; "one")]
    #[test_case(10_000.0, 1.0; "ten thousand")]
    #[test_case(1_000_000.0, 1.5; "one million")]
    #[test_case(100_000_000.0, 2.0; "hundred million")]
    #[test_case(1e12, 2.0; "clamped above")]
    fn test_box_scale(params: f64, expected: f32) {
        assert_relative_eq!(box_scale(params), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_monotonic_and_bounded() {
        let mut last = box_scale(0.0);
        let mut n = 1.0_f64;
        while n < 1e10 {
            let s = box_scale(n);
            assert!(s >= last, "scale dropped at {}", n);
            assert!((MIN_SCALE..=MAX_SCALE).contains(&s));
            last = s;
            n *= 1.7;
        }
    }

    #[test]
    fn test_layer_size_uses_param_fallback() {
        let small = LayerNode::new("a", "a", "ReLU");
        assert_eq!(layer_size(&small), BASE_SIZE);

        let big = LayerNode::new("b", "b", "Linear").with_total_params(1_000_000);
        let size = layer_size(&big);
        assert_relative_eq!(size[0], 1.8, epsilon = 1e-5);
        assert_relative_eq!(size[1], 0.9, epsilon = 1e-5);
        assert_relative_eq!(size[2], 0.6, epsilon = 1e-5);
    }
}
