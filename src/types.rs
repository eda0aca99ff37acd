/// Media stream category advertised by the camera.
///
/// Codes follow the device's numbering; left/right infrared imagers share
/// `Infrared` and differ by `sensor_index` (1 and 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamKind {
    #[default]
    Any,
    Depth,
    Color,
    Infrared,
    Fisheye,
    Gyro,
    Accel,
    Gpio,
    Pose,
    Confidence,
    /// A stream code this crate does not know about yet.
    Other(i32),
}

impl StreamKind {
    pub fn code(self) -> i32 {
        match self {
            StreamKind::Any => 0,
            StreamKind::Depth => 1,
            StreamKind::Color => 2,
            StreamKind::Infrared => 3,
            StreamKind::Fisheye => 4,
            StreamKind::Gyro => 5,
            StreamKind::Accel => 6,
            StreamKind::Gpio => 7,
            StreamKind::Pose => 8,
            StreamKind::Confidence => 9,
            StreamKind::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => StreamKind::Any,
            1 => StreamKind::Depth,
            2 => StreamKind::Color,
            3 => StreamKind::Infrared,
            4 => StreamKind::Fisheye,
            5 => StreamKind::Gyro,
            6 => StreamKind::Accel,
            7 => StreamKind::Gpio,
            8 => StreamKind::Pose,
            9 => StreamKind::Confidence,
            other => StreamKind::Other(other),
        }
    }
}

/// Pixel layout of a video stream, using the device's format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Any,
    /// 16-bit depth, one value per pixel.
    Z16,
    Disparity16,
    Xyz32f,
    Yuyv,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
    Y8,
    Y16,
    Raw10,
    Raw16,
    Raw8,
    Uyvy,
    MotionRaw,
    MotionXyz32f,
    Disparity32,
    Other(i32),
}

impl PixelFormat {
    pub fn code(self) -> i32 {
        match self {
            PixelFormat::Any => 0,
            PixelFormat::Z16 => 1,
            PixelFormat::Disparity16 => 2,
            PixelFormat::Xyz32f => 3,
            PixelFormat::Yuyv => 4,
            PixelFormat::Rgb8 => 5,
            PixelFormat::Bgr8 => 6,
            PixelFormat::Rgba8 => 7,
            PixelFormat::Bgra8 => 8,
            PixelFormat::Y8 => 9,
            PixelFormat::Y16 => 10,
            PixelFormat::Raw10 => 11,
            PixelFormat::Raw16 => 12,
            PixelFormat::Raw8 => 13,
            PixelFormat::Uyvy => 14,
            PixelFormat::MotionRaw => 15,
            PixelFormat::MotionXyz32f => 16,
            PixelFormat::Disparity32 => 19,
            PixelFormat::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PixelFormat::Any,
            1 => PixelFormat::Z16,
            2 => PixelFormat::Disparity16,
            3 => PixelFormat::Xyz32f,
            4 => PixelFormat::Yuyv,
            5 => PixelFormat::Rgb8,
            6 => PixelFormat::Bgr8,
            7 => PixelFormat::Rgba8,
            8 => PixelFormat::Bgra8,
            9 => PixelFormat::Y8,
            10 => PixelFormat::Y16,
            11 => PixelFormat::Raw10,
            12 => PixelFormat::Raw16,
            13 => PixelFormat::Raw8,
            14 => PixelFormat::Uyvy,
            15 => PixelFormat::MotionRaw,
            16 => PixelFormat::MotionXyz32f,
            19 => PixelFormat::Disparity32,
            other => PixelFormat::Other(other),
        }
    }
}

/// Lens distortion model used by a sensor's intrinsic calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistortionModel {
    #[default]
    None,
    ModifiedBrownConrady,
    InverseBrownConrady,
    FTheta,
    BrownConrady,
    KannalaBrandt4,
    Other(i32),
}

impl DistortionModel {
    pub fn code(self) -> i32 {
        match self {
            DistortionModel::None => 0,
            DistortionModel::ModifiedBrownConrady => 1,
            DistortionModel::InverseBrownConrady => 2,
            DistortionModel::FTheta => 3,
            DistortionModel::BrownConrady => 4,
            DistortionModel::KannalaBrandt4 => 5,
            DistortionModel::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => DistortionModel::None,
            1 => DistortionModel::ModifiedBrownConrady,
            2 => DistortionModel::InverseBrownConrady,
            3 => DistortionModel::FTheta,
            4 => DistortionModel::BrownConrady,
            5 => DistortionModel::KannalaBrandt4,
            other => DistortionModel::Other(other),
        }
    }
}

/// Per-sensor tunable option, using the device's option codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    BacklightCompensation,
    Brightness,
    Contrast,
    Exposure,
    Gain,
    Gamma,
    Hue,
    Saturation,
    Sharpness,
    WhiteBalance,
    EnableAutoExposure,
    EnableAutoWhiteBalance,
    VisualPreset,
    LaserPower,
    EmitterEnabled,
    Other(i32),
}

impl ControlKind {
    pub fn code(self) -> i32 {
        match self {
            ControlKind::BacklightCompensation => 0,
            ControlKind::Brightness => 1,
            ControlKind::Contrast => 2,
            ControlKind::Exposure => 3,
            ControlKind::Gain => 4,
            ControlKind::Gamma => 5,
            ControlKind::Hue => 6,
            ControlKind::Saturation => 7,
            ControlKind::Sharpness => 8,
            ControlKind::WhiteBalance => 9,
            ControlKind::EnableAutoExposure => 10,
            ControlKind::EnableAutoWhiteBalance => 11,
            ControlKind::VisualPreset => 12,
            ControlKind::LaserPower => 13,
            ControlKind::EmitterEnabled => 18,
            ControlKind::Other(code) => code,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ControlKind::BacklightCompensation,
            1 => ControlKind::Brightness,
            2 => ControlKind::Contrast,
            3 => ControlKind::Exposure,
            4 => ControlKind::Gain,
            5 => ControlKind::Gamma,
            6 => ControlKind::Hue,
            7 => ControlKind::Saturation,
            8 => ControlKind::Sharpness,
            9 => ControlKind::WhiteBalance,
            10 => ControlKind::EnableAutoExposure,
            11 => ControlKind::EnableAutoWhiteBalance,
            12 => ControlKind::VisualPreset,
            13 => ControlKind::LaserPower,
            18 => ControlKind::EmitterEnabled,
            other => ControlKind::Other(other),
        }
    }
}

/// Optical calibration of one sensor: focal length, principal point,
/// and distortion. Immutable once decoded from the session description.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intrinsics {
    pub width: i32,
    pub height: i32,
    /// Principal point x, in pixels.
    pub ppx: f32,
    /// Principal point y, in pixels.
    pub ppy: f32,
    /// Focal length x, in pixels.
    pub fx: f32,
    /// Focal length y, in pixels.
    pub fy: f32,
    pub model: DistortionModel,
    pub coeffs: [f32; 5],
}

/// Rigid transform between two sensors' reference frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    /// 3x3 rotation, row-major.
    pub rotation: [f32; 9],
    /// Translation in meters.
    pub translation: [f32; 3],
}

impl Extrinsics {
    /// The "no usable calibration" sentinel: every field NaN.
    ///
    /// Distinguishes a malformed or absent calibration record from a genuine
    /// zero transform, which would silently imply coincident sensors.
    pub fn unknown() -> Self {
        Self {
            rotation: [f32::NAN; 9],
            translation: [f32::NAN; 3],
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.rotation.iter().all(|v| v.is_nan()) && self.translation.iter().all(|v| v.is_nan())
    }
}

/// One video stream configuration advertised by the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamProfile {
    pub kind: StreamKind,
    /// Distinguishes sibling sensors of the same kind (e.g. left/right IR).
    pub sensor_index: i32,
    pub format: PixelFormat,
    pub width: i32,
    pub height: i32,
    pub frame_rate: i32,
    pub bits_per_pixel: i32,
    /// Device-assigned stream id, opaque to this crate.
    pub unique_id: i32,
    pub intrinsics: Intrinsics,
}

impl StreamProfile {
    /// Deterministic identity key for this profile.
    ///
    /// Decimal packing, low digits first:
    /// - digits 0-3: height
    /// - digits 4-7: width
    /// - digit 8: sensor index
    /// - digits 9-11: frame rate
    /// - digits 12-13: pixel format code
    /// - digits 14+: stream kind code
    ///
    /// Injective as long as height and width stay below 10000, sensor index
    /// below 10, frame rate below 1000, and format code below 100 — all true
    /// for the profiles the device advertises.
    pub fn identity_key(&self) -> i64 {
        self.kind.code() as i64 * 100_000_000_000_000
            + self.format.code() as i64 * 1_000_000_000_000
            + self.frame_rate as i64 * 1_000_000_000
            + self.sensor_index as i64 * 100_000_000
            + self.width as i64 * 10_000
            + self.height as i64
    }

    /// Key of the physical sensor producing this stream.
    pub fn sensor_key(&self) -> i32 {
        sensor_key(self.kind, self.sensor_index)
    }
}

/// Composite key of a physical sensor: stream kind plus sensor index.
///
/// Extrinsics records key on this, so calibration discovered from one stream
/// can be looked up by code handling another stream of the same device.
pub fn sensor_key(kind: StreamKind, sensor_index: i32) -> i32 {
    kind.code() * 10 + sensor_index
}

/// Identification fields the camera attaches to every media section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    pub serial_number: String,
    /// Human-readable camera name, space-unescaped on decode.
    pub name: String,
    /// Connection speed class of the camera's internal sensor bus.
    pub usb_type: String,
}

/// Valid range of one tunable option.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: f32,
}

/// One tunable option of one sensor, with its accepted range.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDescriptor {
    pub sensor_id: i32,
    pub kind: ControlKind,
    pub range: ControlRange,
}

/// Lifecycle of a camera control session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Described,
    StreamsConfigured,
    Playing,
    Paused,
    Closed,
}
