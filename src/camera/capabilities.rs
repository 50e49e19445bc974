// V4L2Capabilities.
//
// Frame rates are kept as decimal strings rather than parsed floats, so a
// `30.000` reported by the probe command isn't silently renormalized to
// `30`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub frame_rates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub pixel_format: String,
    pub resolutions: Vec<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V4L2Capabilities {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub capability_flags: Vec<String>,
    pub formats: Vec<FormatDescriptor>,
}
impl V4L2Capabilities {
    /// Structurally meaningful fields for a STATUS_CHANGED comparison:
    /// emitted only when `driver` or `formats` change, not on every
    /// refresh. `card` is compared at the `CameraDevice` level (it
    /// becomes `name`).
    pub fn structurally_equal(
        &self,
        other: &Self,
    ) -> bool {
        self.driver == other.driver && self.formats == other.formats
    }
}

#[cfg(test)]
mod test_capabilities {
    use super::{FormatDescriptor, Resolution, V4L2Capabilities};

    fn sample(driver: &str, pixel_format: &str) -> V4L2Capabilities {
        V4L2Capabilities {
            driver: driver.to_owned(),
            card: "Sample Cam".to_owned(),
            bus_info: "usb-0000:00:14.0-1".to_owned(),
            capability_flags: vec!["video_capture".to_owned(), "streaming".to_owned()],
            formats: vec![FormatDescriptor {
                pixel_format: pixel_format.to_owned(),
                resolutions: vec![Resolution {
                    width: 1280,
                    height: 720,
                    frame_rates: vec!["30.000".to_owned(), "15.000".to_owned()],
                }],
            }],
        }
    }

    #[test]
    fn identical_formats_are_structurally_equal() {
        let a = sample("uvcvideo", "MJPG");
        let b = sample("uvcvideo", "MJPG");
        assert!(a.structurally_equal(&b));
    }

    #[test]
    fn different_driver_is_not_structurally_equal() {
        let a = sample("uvcvideo", "MJPG");
        let b = sample("other_driver", "MJPG");
        assert!(!a.structurally_equal(&b));
    }

    #[test]
    fn different_formats_is_not_structurally_equal() {
        let a = sample("uvcvideo", "MJPG");
        let b = sample("uvcvideo", "YUYV");
        assert!(!a.structurally_equal(&b));
    }

    #[test]
    fn frame_rates_preserve_decimal_precision() {
        let a = sample("uvcvideo", "MJPG");
        assert_eq!(a.formats[0].resolutions[0].frame_rates[0], "30.000");
    }
}
