//! Q48.16 fixed-point scalar used for all simulation arithmetic

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// Fixed-point number with 16 fractional bits stored in an `i64`.
///
/// Every arithmetic path is integer-only so results are bit-identical on
/// every platform. Multiplication and division widen to `i128` before
/// shifting back, so intermediate products cannot overflow for any value
/// pair in the playable range.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fp(i64);

const FRAC_BITS: u32 = 16;
const HALF_PI_RAW: i64 = 102_944;

impl Fp {
    pub const ZERO: Fp = Fp(0);
    pub const ONE: Fp = Fp(1 << FRAC_BITS);
    pub const HALF: Fp = Fp(1 << (FRAC_BITS - 1));
    pub const TWO: Fp = Fp(2 << FRAC_BITS);
    /// Smallest positive increment (one raw tick).
    pub const EPSILON: Fp = Fp(1);
    pub const MAX: Fp = Fp(i64::MAX);
    pub const PI: Fp = Fp(205_887);
    pub const HALF_PI: Fp = Fp(HALF_PI_RAW);
    pub const TAU: Fp = Fp(411_775);

    pub const fn from_int(v: i64) -> Fp {
        Fp(v << FRAC_BITS)
    }

    /// Exact rational constant, truncated toward zero.
    pub const fn from_ratio(num: i64, den: i64) -> Fp {
        Fp((((num as i128) << FRAC_BITS) / (den as i128)) as i64)
    }

    /// Reinterpret a raw Q48.16 bit pattern.
    pub const fn from_raw(raw: i64) -> Fp {
        Fp(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Integer part, rounded toward negative infinity.
    pub const fn floor_int(self) -> i64 {
        self.0 >> FRAC_BITS
    }

    /// Lossy conversion for presentation and authoring only. Never feed the
    /// result back into simulation state.
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / (1i64 << FRAC_BITS) as f32
    }

    /// Lossy conversion for authoring tooling only.
    pub fn from_f32(v: f32) -> Fp {
        Fp((v * (1i64 << FRAC_BITS) as f32) as i64)
    }

    pub const fn abs(self) -> Fp {
        if self.0 < 0 {
            Fp(-self.0)
        } else {
            self
        }
    }

    pub const fn signum(self) -> Fp {
        if self.0 > 0 {
            Fp::ONE
        } else if self.0 < 0 {
            Fp(-Fp::ONE.0)
        } else {
            Fp::ZERO
        }
    }

    pub fn min(self, other: Fp) -> Fp {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }

    pub fn max(self, other: Fp) -> Fp {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    pub fn clamp(self, lo: Fp, hi: Fp) -> Fp {
        self.max(lo).min(hi)
    }

    pub fn lerp(self, other: Fp, t: Fp) -> Fp {
        self + (other - self) * t
    }

    /// Square root via integer Newton-Raphson. Negative inputs yield zero.
    pub fn sqrt(self) -> Fp {
        if self.0 <= 0 {
            return Fp::ZERO;
        }
        // sqrt(v * 2^16) in raw space keeps the Q16 scale.
        let n = (self.0 as u128) << FRAC_BITS;
        Fp(isqrt(n) as i64)
    }

    /// Sine from a quarter-wave lookup table with linear interpolation.
    pub fn sin(self) -> Fp {
        let mut a = self.0 % Fp::TAU.0;
        if a < 0 {
            a += Fp::TAU.0;
        }
        let quad = a / HALF_PI_RAW;
        let r = a - quad * HALF_PI_RAW;
        let v = match quad {
            0 => quarter_sin(r),
            1 => quarter_sin(HALF_PI_RAW - r),
            2 => -quarter_sin(r),
            _ => -quarter_sin(HALF_PI_RAW - r),
        };
        Fp(v)
    }

    pub fn cos(self) -> Fp {
        Fp(self.0 + HALF_PI_RAW).sin()
    }

    /// Four-quadrant arctangent. Returns an angle in `(-PI, PI]`, zero when
    /// both inputs are zero.
    pub fn atan2(y: Fp, x: Fp) -> Fp {
        if x.0 == 0 && y.0 == 0 {
            return Fp::ZERO;
        }
        if y.abs() <= x.abs() {
            let base = atan_unit(y / x);
            if x.0 > 0 {
                base
            } else if y.0 >= 0 {
                base + Fp::PI
            } else {
                base - Fp::PI
            }
        } else {
            let base = atan_unit(x / y);
            if y.0 > 0 {
                Fp::HALF_PI - base
            } else {
                -Fp::HALF_PI - base
            }
        }
    }

    /// Arccosine over `[-1, 1]`; inputs outside the domain are clamped.
    pub fn acos(self) -> Fp {
        let x = self.clamp(-Fp::ONE, Fp::ONE);
        if x.0 < 0 {
            Fp::PI - acos_pos(-x)
        } else {
            acos_pos(x)
        }
    }

    pub fn asin(self) -> Fp {
        Fp::HALF_PI - self.acos()
    }
}

impl Add for Fp {
    type Output = Fp;
    fn add(self, rhs: Fp) -> Fp {
        Fp(self.0 + rhs.0)
    }
}

impl Sub for Fp {
    type Output = Fp;
    fn sub(self, rhs: Fp) -> Fp {
        Fp(self.0 - rhs.0)
    }
}

impl Neg for Fp {
    type Output = Fp;
    fn neg(self) -> Fp {
        Fp(-self.0)
    }
}

impl Mul for Fp {
    type Output = Fp;
    fn mul(self, rhs: Fp) -> Fp {
        Fp(((self.0 as i128 * rhs.0 as i128) >> FRAC_BITS) as i64)
    }
}

impl Div for Fp {
    type Output = Fp;
    fn div(self, rhs: Fp) -> Fp {
        Fp((((self.0 as i128) << FRAC_BITS) / rhs.0 as i128) as i64)
    }
}

impl AddAssign for Fp {
    fn add_assign(&mut self, rhs: Fp) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Fp {
    fn sub_assign(&mut self, rhs: Fp) {
        self.0 -= rhs.0;
    }
}

impl MulAssign for Fp {
    fn mul_assign(&mut self, rhs: Fp) {
        *self = *self * rhs;
    }
}

impl DivAssign for Fp {
    fn div_assign(&mut self, rhs: Fp) {
        *self = *self / rhs;
    }
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}fp", self.to_f32())
    }
}

impl fmt::Display for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

fn isqrt(n: u128) -> u128 {
    if n == 0 {
        return 0;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Interpolated quarter-wave sine, `r` in raw radians `[0, HALF_PI_RAW]`.
fn quarter_sin(r: i64) -> i64 {
    let scaled = (r << FRAC_BITS) / HALF_PI_RAW;
    let idx = (scaled >> 8) as usize;
    if idx >= 256 {
        return QUARTER_SIN[256] as i64;
    }
    let t = scaled & 0xFF;
    let a = QUARTER_SIN[idx] as i64;
    let b = QUARTER_SIN[idx + 1] as i64;
    a + (((b - a) * t) >> 8)
}

/// Pade approximant of atan over `[-1, 1]`.
fn atan_unit(z: Fp) -> Fp {
    let z2 = z * z;
    let z4 = z2 * z2;
    let num = z * (Fp::from_int(945) + Fp::from_int(735) * z2 + Fp::from_int(64) * z4);
    let den = Fp::from_int(945) + Fp::from_int(1050) * z2 + Fp::from_int(225) * z4;
    num / den
}

/// Polynomial arccosine over `[0, 1]`.
fn acos_pos(x: Fp) -> Fp {
    const A0: Fp = Fp(102_939);
    const A1: Fp = Fp(-13_901);
    const A2: Fp = Fp(4_867);
    const A3: Fp = Fp(-1_227);
    let poly = A0 + x * (A1 + x * (A2 + x * A3));
    (Fp::ONE - x).sqrt() * poly
}

/// sin(i * PI/2 / 256) in Q16, 257 entries covering one quadrant.
const QUARTER_SIN: [i32; 257] = [
    0, 402, 804, 1206, 1608, 2010, 2412, 2814,
    3216, 3617, 4019, 4420, 4821, 5222, 5623, 6023,
    6424, 6824, 7224, 7623, 8022, 8421, 8820, 9218,
    9616, 10014, 10411, 10808, 11204, 11600, 11996, 12391,
    12785, 13180, 13573, 13966, 14359, 14751, 15143, 15534,
    15924, 16314, 16703, 17091, 17479, 17867, 18253, 18639,
    19024, 19409, 19792, 20175, 20557, 20939, 21320, 21699,
    22078, 22457, 22834, 23210, 23586, 23961, 24335, 24708,
    25080, 25451, 25821, 26190, 26558, 26925, 27291, 27656,
    28020, 28383, 28745, 29106, 29466, 29824, 30182, 30538,
    30893, 31248, 31600, 31952, 32303, 32652, 33000, 33347,
    33692, 34037, 34380, 34721, 35062, 35401, 35738, 36075,
    36410, 36744, 37076, 37407, 37736, 38064, 38391, 38716,
    39040, 39362, 39683, 40002, 40320, 40636, 40951, 41264,
    41576, 41886, 42194, 42501, 42806, 43110, 43412, 43713,
    44011, 44308, 44604, 44898, 45190, 45480, 45769, 46056,
    46341, 46624, 46906, 47186, 47464, 47741, 48015, 48288,
    48559, 48828, 49095, 49361, 49624, 49886, 50146, 50404,
    50660, 50914, 51166, 51417, 51665, 51911, 52156, 52398,
    52639, 52878, 53114, 53349, 53581, 53812, 54040, 54267,
    54491, 54714, 54934, 55152, 55368, 55582, 55794, 56004,
    56212, 56418, 56621, 56823, 57022, 57219, 57414, 57607,
    57798, 57986, 58172, 58356, 58538, 58718, 58896, 59071,
    59244, 59415, 59583, 59750, 59914, 60075, 60235, 60392,
    60547, 60700, 60851, 60999, 61145, 61288, 61429, 61568,
    61705, 61839, 61971, 62101, 62228, 62353, 62476, 62596,
    62714, 62830, 62943, 63054, 63162, 63268, 63372, 63473,
    63572, 63668, 63763, 63854, 63944, 64031, 64115, 64197,
    64277, 64354, 64429, 64501, 64571, 64639, 64704, 64766,
    64827, 64884, 64940, 64993, 65043, 65091, 65137, 65180,
    65220, 65259, 65294, 65328, 65358, 65387, 65413, 65436,
    65457, 65476, 65492, 65505, 65516, 65525, 65531, 65535,
    65536,
];
