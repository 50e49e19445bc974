// Device probe primitives.
//
// Two substitution points: `node_exists` (does the device node exist) and
// `probe` (run the capability-query command and parse its output).
// Production code shells out to `v4l2-ctl`. Tests inject a stub that
// returns canned captures without touching the filesystem or spawning a
// process.

use super::capabilities::{FormatDescriptor, Resolution, V4L2Capabilities};
use crate::error::{ErrorKind, ServiceError};
use async_trait::async_trait;
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::LazyLock,
    time::Duration,
};
use tokio::process::Command;

#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn node_exists(
        &self,
        path: &Path,
    ) -> bool;

    async fn probe(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<V4L2Capabilities, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct CommandCapabilityProbe {
    command: PathBuf,
}
impl CommandCapabilityProbe {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    fn build_command(
        &self,
        path: &Path,
    ) -> Command {
        let mut command = Command::new(&self.command);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg("--device")
            .arg(path)
            .arg("--info")
            .arg("--list-formats-ext");
        command
    }

    async fn run_once(
        &self,
        path: &Path,
    ) -> Result<String, ServiceError> {
        let mut command = self.build_command(path);
        let output = command
            .output()
            .await
            .map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;

        if !output.status.success() {
            return Err(ServiceError::new(
                ErrorKind::Internal,
                anyhow::anyhow!(
                    "capability command exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
#[async_trait]
impl CapabilityProbe for CommandCapabilityProbe {
    async fn node_exists(
        &self,
        path: &Path,
    ) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn probe(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<V4L2Capabilities, ServiceError> {
        let output = match tokio::time::timeout(timeout, self.run_once(path)).await {
            Ok(result) => result?,
            Err(_elapsed) => return Err(ServiceError::from_kind(ErrorKind::Timeout)),
        };

        parse_v4l2_ctl_output(&output)
            .map_err(|error| ServiceError::new(ErrorKind::EngineProtocol, error))
    }
}

static DRIVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Driver name\s*:\s*(.+?)\s*$").unwrap());
static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Card type\s*:\s*(.+?)\s*$").unwrap());
static BUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Bus info\s*:\s*(.+?)\s*$").unwrap());
static CAP_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\t\t(\S.*\S|\S)$").unwrap());
static FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\[\d+\]:\s*'(\w+)'").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*Size:\s*Discrete\s*(\d+)x(\d+)").unwrap());
static FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([\d.]+)\s*fps\)").unwrap());

fn parse_v4l2_ctl_output(output: &str) -> Result<V4L2Capabilities, anyhow::Error> {
    let driver = DRIVER_RE
        .captures(output)
        .map(|c| c[1].to_owned())
        .ok_or_else(|| anyhow::anyhow!("missing Driver name in probe output"))?;
    let card = CARD_RE
        .captures(output)
        .map(|c| c[1].to_owned())
        .unwrap_or_default();
    let bus_info = BUS_RE
        .captures(output)
        .map(|c| c[1].to_owned())
        .unwrap_or_default();

    let device_caps_section = output
        .split("Device Caps")
        .nth(1)
        .and_then(|rest| rest.split("\n\n").next())
        .unwrap_or("");
    let capability_flags = CAP_FLAG_RE
        .captures_iter(device_caps_section)
        .map(|c| c[1].trim().to_owned())
        .filter(|line| !line.is_empty() && !line.starts_with("0x"))
        .collect::<Vec<_>>();

    let mut formats = Vec::new();
    let mut current: Option<FormatDescriptor> = None;
    let mut current_resolution: Option<Resolution> = None;

    for line in output.lines() {
        if let Some(captures) = FORMAT_RE.captures(line) {
            if let Some(mut descriptor) = current.take() {
                if let Some(resolution) = current_resolution.take() {
                    descriptor.resolutions.push(resolution);
                }
                formats.push(descriptor);
            }
            current = Some(FormatDescriptor {
                pixel_format: captures[1].to_owned(),
                resolutions: Vec::new(),
            });
            continue;
        }

        if let Some(captures) = SIZE_RE.captures(line) {
            if let (Some(descriptor), Some(resolution)) = (current.as_mut(), current_resolution.take()) {
                descriptor.resolutions.push(resolution);
            }
            current_resolution = Some(Resolution {
                width: captures[1].parse()?,
                height: captures[2].parse()?,
                frame_rates: Vec::new(),
            });
            continue;
        }

        if let Some(captures) = FPS_RE.captures(line) {
            if let Some(resolution) = current_resolution.as_mut() {
                resolution.frame_rates.push(captures[1].to_owned());
            }
        }
    }
    if let Some(mut descriptor) = current.take() {
        if let Some(resolution) = current_resolution.take() {
            descriptor.resolutions.push(resolution);
        }
        formats.push(descriptor);
    }

    Ok(V4L2Capabilities {
        driver,
        card,
        bus_info,
        capability_flags,
        formats,
    })
}

#[cfg(test)]
mod test_probe {
    use super::parse_v4l2_ctl_output;

    const SAMPLE_OUTPUT: &str = "Driver Info:
\tDriver name : uvcvideo
\tCard type : HD Pro Webcam C920
\tBus info : usb-0000:00:14.0-1
\tDevice Caps : 0x04200001
\t\tVideo Capture
\t\tStreaming

ioctl: VIDIOC_ENUM_FMT
\tType: Video Capture

\t[0]: 'YUYV' (YUYV 4:2:2)
\t\tSize: Discrete 640x480
\t\t\tInterval: Discrete 0.033s (30.000 fps)
\t\t\tInterval: Discrete 0.067s (15.000 fps)
\t\tSize: Discrete 1280x720
\t\t\tInterval: Discrete 0.033s (30.000 fps)
\t[1]: 'MJPG' (Motion-JPEG, compressed)
\t\tSize: Discrete 1920x1080
\t\t\tInterval: Discrete 0.033s (30.000 fps)
";

    #[test]
    fn parses_driver_card_bus() {
        let caps = parse_v4l2_ctl_output(SAMPLE_OUTPUT).unwrap();
        assert_eq!(caps.driver, "uvcvideo");
        assert_eq!(caps.card, "HD Pro Webcam C920");
        assert_eq!(caps.bus_info, "usb-0000:00:14.0-1");
    }

    #[test]
    fn parses_capability_flags() {
        let caps = parse_v4l2_ctl_output(SAMPLE_OUTPUT).unwrap();
        assert!(caps.capability_flags.contains(&"Video Capture".to_owned()));
        assert!(caps.capability_flags.contains(&"Streaming".to_owned()));
    }

    #[test]
    fn parses_formats_and_resolutions() {
        let caps = parse_v4l2_ctl_output(SAMPLE_OUTPUT).unwrap();
        assert_eq!(caps.formats.len(), 2);
        assert_eq!(caps.formats[0].pixel_format, "YUYV");
        assert_eq!(caps.formats[0].resolutions.len(), 2);
        assert_eq!(caps.formats[0].resolutions[0].width, 640);
        assert_eq!(caps.formats[0].resolutions[0].height, 480);
        assert_eq!(
            caps.formats[0].resolutions[0].frame_rates,
            vec!["30.000".to_owned(), "15.000".to_owned()]
        );
    }

    #[test]
    fn rejects_output_missing_driver_name() {
        assert!(parse_v4l2_ctl_output("garbage").is_err());
    }
}
