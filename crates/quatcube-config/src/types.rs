use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial link to the IMU.
    pub serial: SerialConfig,
    /// Window, pacing and cube appearance.
    pub render: RenderConfig,
}

impl AppConfig {
    /// Replace values the application cannot run with.
    pub fn validate(&mut self) {
        if self.render.target_fps == 0 {
            warn!("render.target_fps must be at least 1, using 1");
            self.render.target_fps = 1;
        }
        if self.render.window_width == 0 || self.render.window_height == 0 {
            let defaults = RenderConfig::default();
            warn!(
                width = self.render.window_width,
                height = self.render.window_height,
                "Window size must be non-zero, using defaults"
            );
            self.render.window_width = defaults.window_width;
            self.render.window_height = defaults.window_height;
        }
        if self.serial.read_timeout_ms == 0 {
            // A zero timeout would turn the reader into a busy loop.
            warn!("serial.read_timeout_ms must be at least 1, using 1");
            self.serial.read_timeout_ms = 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path or name, e.g. `/dev/ttyUSB0` or `COM8`.
    pub port: String,
    /// Line speed. Must match the firmware's `Serial.begin()`.
    pub baud_rate: u32,
    /// Wire format emitted by the firmware.
    pub protocol: Protocol,
    /// Upper bound on one blocking read; also bounds shutdown latency.
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 921_600,
            protocol: Protocol::Binary,
            read_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// 0xAA sync byte followed by four little-endian f32 (w, x, y, z).
    Binary,
    /// `Quat → w:<f> x:<f> y:<f> z:<f>` lines.
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Render ticks per second.
    pub target_fps: u32,
    pub style: CubeStyle,
    /// Which quaternion conversion feeds the model matrix.
    pub rotation: RotationMode,
    /// Camera position; the camera always looks at the origin.
    #[serde(with = "vec3_serde")]
    pub camera_eye: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Cube colour, linear RGB.
    pub color: [f32; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            target_fps: 60,
            style: CubeStyle::Wireframe,
            rotation: RotationMode::Matrix,
            camera_eye: Vec3::new(0.0, 0.0, 5.0),
            fov_y_degrees: 45.0,
            color: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeStyle {
    /// 12 edges drawn as lines.
    Wireframe,
    /// 12 flat-shaded triangles.
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// Quaternion converted directly to a rotation matrix.
    Matrix,
    /// Quaternion converted to axis + angle first.
    AxisAngle,
}

// Vec3 as a plain `[x, y, z]` array in TOML.
mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [x, y, z] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(x, y, z))
    }
}
