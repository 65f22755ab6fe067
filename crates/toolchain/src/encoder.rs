use std::fmt::{Display, Formatter, Result as FmtResult};

/// H.264 encoders FFmpeg may be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Software encoding; always available in a stock FFmpeg build.
    Libx264,
    /// NVIDIA NVENC
    Nvenc,
    /// AMD AMF
    Amf,
    /// Intel Quick Sync Video
    Qsv,
    /// Apple VideoToolbox
    VideoToolbox,
}

impl Codec {
    /// Hardware encoders in order of preference.
    pub const HARDWARE: [Codec; 4] = [Codec::Nvenc, Codec::Amf, Codec::Qsv, Codec::VideoToolbox];

    /// The encoder name as understood by FFmpeg's `-c:v`.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Libx264 => "libx264",
            Codec::Nvenc => "h264_nvenc",
            Codec::Amf => "h264_amf",
            Codec::Qsv => "h264_qsv",
            Codec::VideoToolbox => "h264_videotoolbox",
        }
    }

    /// Informational tag for the acceleration backend; empty for software.
    pub fn hwaccel(&self) -> &'static str {
        match self {
            Codec::Libx264 => "",
            Codec::Nvenc => "cuda",
            Codec::Amf => "amf",
            Codec::Qsv => "qsv",
            Codec::VideoToolbox => "videotoolbox",
        }
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Codec::Libx264)
    }

    /// Speed/quality arguments: fast presets for hardware encoders, the
    /// balanced default for software.
    pub fn preset_args(&self) -> [&'static str; 2] {
        match self {
            Codec::Libx264 => ["-preset", "medium"],
            // AMF has no `-preset`; `-quality` is the closest equivalent.
            Codec::Amf => ["-quality", "speed"],
            Codec::Nvenc | Codec::Qsv | Codec::VideoToolbox => ["-preset", "fast"],
        }
    }

    /// Whether this encoder can exist on the platform we were built for.
    pub(crate) fn is_platform_supported(&self) -> bool {
        match self {
            Codec::VideoToolbox => cfg!(target_os = "macos"),
            _ => true,
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// The outcome of probing the encoding toolchain, computed once per run and
/// handed to whatever composites videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    /// `true` when a hardware encoder passed its test encode.
    pub available: bool,
    pub codec: Codec,
}

impl EncoderProfile {
    /// The software fallback; needs no probing.
    pub fn software() -> Self {
        Self { available: false, codec: Codec::Libx264 }
    }

    pub fn hardware(codec: Codec) -> Self {
        Self { available: codec.is_hardware(), codec }
    }

    pub fn hwaccel(&self) -> &'static str {
        self.codec.hwaccel()
    }
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self::software()
    }
}

impl Display for EncoderProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.available {
            true => write!(f, "{} ({})", self.codec, self.hwaccel()),
            false => write!(f, "{} (software)", self.codec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Codec::Libx264, "libx264", ["-preset", "medium"])]
    #[case(Codec::Nvenc, "h264_nvenc", ["-preset", "fast"])]
    #[case(Codec::Amf, "h264_amf", ["-quality", "speed"])]
    #[case(Codec::Qsv, "h264_qsv", ["-preset", "fast"])]
    #[case(Codec::VideoToolbox, "h264_videotoolbox", ["-preset", "fast"])]
    fn codec_names_and_presets(#[case] codec: Codec, #[case] name: &str, #[case] preset: [&str; 2]) {
        assert_eq!(codec.name(), name);
        assert_eq!(codec.preset_args(), preset);
    }

    #[test]
    fn software_profile() {
        let profile = EncoderProfile::software();
        assert!(!profile.available);
        assert_eq!(profile.codec, Codec::Libx264);
        assert_eq!(profile.hwaccel(), "");
        assert_eq!(profile, EncoderProfile::default());
        assert_eq!(profile.to_string(), "libx264 (software)");
    }

    #[test]
    fn hardware_profile() {
        let profile = EncoderProfile::hardware(Codec::Nvenc);
        assert!(profile.available);
        assert_eq!(profile.hwaccel(), "cuda");
        assert_eq!(profile.to_string(), "h264_nvenc (cuda)");
        assert!(!EncoderProfile::hardware(Codec::Libx264).available);
    }
}
