//! IBM System/360 single precision floats.
//!
//! Layout: sign bit, 7-bit base-16 exponent biased by 64, 24-bit fraction
//! with no hidden bit.

/// Convert the raw bits of an IBM float to an IEEE `f32`.
#[must_use]
pub fn ibm_to_ieee(bits: u32) -> f32 {
    let fraction = bits & 0x00ff_ffff;
    if fraction == 0 {
        return 0.0;
    }
    let sign = if bits >> 31 == 1 { -1.0 } else { 1.0 };
    let exponent = ((bits >> 24) & 0x7f) as i32 - 64;
    let mantissa = f64::from(fraction) / f64::from(1u32 << 24);
    (sign * mantissa * 16f64.powi(exponent)) as f32
}

/// Convert an IEEE `f32` to the raw bits of the nearest IBM float.
///
/// NaN maps to zero, values outside the IBM range saturate.
#[must_use]
pub fn ieee_to_ibm(value: f32) -> u32 {
    if value == 0.0 || value.is_nan() {
        return 0;
    }
    let sign = if value.is_sign_negative() {
        0x8000_0000
    } else {
        0
    };
    if value.is_infinite() {
        return sign | 0x7fff_ffff;
    }

    let mut magnitude = f64::from(value).abs();
    let mut exponent = 64_i32;
    while magnitude >= 1.0 {
        magnitude /= 16.0;
        exponent += 1;
    }
    while magnitude < 1.0 / 16.0 {
        magnitude *= 16.0;
        exponent -= 1;
    }

    let mut fraction = (magnitude * f64::from(1u32 << 24)).round() as u32;
    if fraction > 0x00ff_ffff {
        fraction >>= 4;
        exponent += 1;
    }
    if exponent > 127 {
        return sign | 0x7fff_ffff;
    }
    if exponent < 0 {
        return 0;
    }
    sign | ((exponent as u32) << 24) | fraction
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bit_patterns() {
        assert_eq!(ibm_to_ieee(0xC276_A000), -118.625);
        assert_eq!(ibm_to_ieee(0x4264_0000), 100.0);
        assert_eq!(ibm_to_ieee(0x4110_0000), 1.0);
        assert_eq!(ibm_to_ieee(0), 0.0);

        assert_eq!(ieee_to_ibm(-118.625), 0xC276_A000);
        assert_eq!(ieee_to_ibm(100.0), 0x4264_0000);
        assert_eq!(ieee_to_ibm(1.0), 0x4110_0000);
        assert_eq!(ieee_to_ibm(0.0), 0);
    }

    #[test]
    fn conversion_keeps_ieee_precision_where_ibm_allows() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..1000 {
            let value = (rng.f32() - 0.5) * 1e6;
            let back = ibm_to_ieee(ieee_to_ibm(value));
            let tolerance = value.abs() * 1e-6;
            assert!((back - value).abs() <= tolerance, "{value} -> {back}");
        }
    }

    #[test]
    fn special_values() {
        assert_eq!(ieee_to_ibm(f32::NAN), 0);
        assert_eq!(ieee_to_ibm(f32::INFINITY), 0x7fff_ffff);
        assert_eq!(ieee_to_ibm(f32::NEG_INFINITY), 0xffff_ffff);
    }
}
