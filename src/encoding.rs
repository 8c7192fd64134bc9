//! Render targets and encoding-profile strings.
use std::fmt;

/// Caps restriction applied in front of every video encoder.
pub const VIDEO_RESTRICTION: &str = "video/x-raw,format=I420";

/// A (container, audio codec, video codec) render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaFormatCombination {
    pub container: &'static str,
    pub acodec: &'static str,
    pub vcodec: &'static str,
}

impl MediaFormatCombination {
    pub const fn new(container: &'static str, acodec: &'static str, vcodec: &'static str) -> Self {
        Self {
            container,
            acodec,
            vcodec,
        }
    }

    /// Identifier used in classnames, e.g. `ogg_vorbis_theora`.
    pub fn identifier(&self) -> String {
        format!("{}_{}_{}", self.container, self.acodec, self.vcodec)
    }

    /// Encoding profile for this target, or `None` if a format is unknown.
    pub fn profile(&self) -> Option<String> {
        Some(profile_string(
            format_caps(self.container)?,
            Some(format_caps(self.vcodec)?),
            Some(format_caps(self.acodec)?),
            Some(VIDEO_RESTRICTION),
            None,
        ))
    }
}

impl fmt::Display for MediaFormatCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} and {} in {}", self.acodec, self.vcodec, self.container)
    }
}

/// Render targets exercised by the render family.
pub const ENCODING_TARGET_COMBINATIONS: &[MediaFormatCombination] = &[
    MediaFormatCombination::new("ogg", "vorbis", "theora"),
    MediaFormatCombination::new("webm", "vorbis", "vp8"),
    MediaFormatCombination::new("mp4", "mp3", "h264"),
    MediaFormatCombination::new("mkv", "vorbis", "h264"),
];

/// Caps for a short format name.
pub fn format_caps(name: &str) -> Option<&'static str> {
    let caps = match name {
        "aac" => "audio/mpeg,mpegversion=4",
        "ac3" => "audio/x-ac3",
        "vorbis" => "audio/x-vorbis",
        "mp3" => "audio/mpeg,mpegversion=1,layer=3",
        "h264" => "video/x-h264",
        "vp8" => "video/x-vp8",
        "theora" => "video/x-theora",
        "ogg" => "application/ogg",
        "mkv" => "video/x-matroska",
        "mp4" => "video/quicktime,variant=iso",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(caps)
}

/// Serialise an encoding profile as `muxer:[restriction->]venc:[restriction->]aenc`.
pub fn profile_string(
    muxer: &str,
    venc: Option<&str>,
    aenc: Option<&str>,
    video_restriction: Option<&str>,
    audio_restriction: Option<&str>,
) -> String {
    let mut profile = String::from(muxer);
    profile.push(':');
    if let Some(venc) = venc {
        if let Some(restriction) = video_restriction {
            profile.push_str(restriction);
            profile.push_str("->");
        }
        profile.push_str(venc);
    }
    if let Some(aenc) = aenc {
        profile.push(':');
        if let Some(restriction) = audio_restriction {
            profile.push_str(restriction);
            profile.push_str("->");
        }
        profile.push_str(aenc);
    }
    profile.replace("::", ":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ogg_profile_carries_video_restriction() {
        let comb = ENCODING_TARGET_COMBINATIONS[0];
        assert_eq!(comb.identifier(), "ogg_vorbis_theora");
        assert_eq!(
            comb.profile().as_deref(),
            Some("application/ogg:video/x-raw,format=I420->video/x-theora:audio/x-vorbis")
        );
    }

    #[test]
    fn audio_only_profile_collapses_separators() {
        assert_eq!(
            profile_string("audio/ogg", None, Some("audio/x-vorbis"), None, None),
            "audio/ogg:audio/x-vorbis"
        );
    }

    #[test]
    fn every_target_has_a_profile() {
        for comb in ENCODING_TARGET_COMBINATIONS {
            assert!(comb.profile().is_some(), "{comb} has no profile");
        }
    }

    #[test]
    fn display_matches_human_label() {
        assert_eq!(
            ENCODING_TARGET_COMBINATIONS[2].to_string(),
            "mp3 and h264 in mp4"
        );
    }
}
