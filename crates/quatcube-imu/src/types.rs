use glam::Quat;

/// One orientation sample reported by the IMU.
///
/// Not normalized on construction: the firmware is expected to send
/// near-unit quaternions and consumers tolerate small deviations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Orientation as a (nominally) unit quaternion.
    pub quaternion: Quat,
}

impl Orientation {
    /// Build from components in wire order.
    pub fn from_wxyz(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self {
            quaternion: Quat::from_xyzw(x, y, z, w),
        }
    }

    /// Components in wire order.
    pub fn wxyz(&self) -> [f32; 4] {
        let q = self.quaternion;
        [q.w, q.x, q.y, q.z]
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            quaternion: Quat::IDENTITY,
        }
    }
}

/// Running counters kept by a frame decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Samples handed out by `next_sample`.
    pub samples: u64,
    /// Bytes thrown away while resynchronizing or enforcing the buffer cap.
    pub discarded_bytes: u64,
    /// Tagged text lines that failed to parse.
    pub rejected_lines: u64,
    /// Times the receive buffer hit its cap.
    pub overflows: u64,
}
