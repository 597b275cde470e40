// SPDX-License-Identifier: GPL-2.0-or-later

use bytes::Bytes;
use common::{
    AudioParams, LogLevel, MediaParams, MediaSet, MediaSetType, MediaTrack, VideoCodec,
    VideoParams,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// 14496-1 objectTypeIndication for MPEG-4 audio.
const DEFAULT_OBJECT_TYPE_ID: u8 = 0x40;

/// Build configuration and the media set it describes.
#[derive(Clone, Debug)]
pub struct EnvConf {
    pub log_level: LogLevel,
    pub media_set: MediaSet,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvConf {
    log_level: Option<LogLevel>,
    version: Option<u32>,
    #[serde(rename = "type")]
    set_type: RawSetType,
    duration_ms: Option<u64>,
    #[serde(default)]
    track: Vec<RawTrack>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawSetType {
    Vod,
    Live,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawKind {
    Video,
    Audio,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawCodec {
    H264,
    H265,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrack {
    kind: RawKind,
    timescale: u32,
    #[serde(default)]
    bitrate: u32,
    #[serde(default)]
    extra_data: Vec<u8>,

    codec: Option<RawCodec>,
    width: Option<u16>,
    height: Option<u16>,

    channels: Option<u16>,
    bits_per_sample: Option<u16>,
    sample_rate: Option<u32>,
    object_type_id: Option<u8>,
}

impl EnvConf {
    pub fn new(config_path: &Path) -> Result<EnvConf, EnvConfigNewError> {
        let env_toml = std::fs::read_to_string(config_path)
            .map_err(|e| EnvConfigNewError::ReadFile(config_path.to_owned(), e))?;
        Ok(parse_config(&env_toml)?)
    }
}

#[derive(Debug, Error)]
pub enum EnvConfigNewError {
    #[error("read config file: {0:?} {1}")]
    ReadFile(PathBuf, std::io::Error),

    #[error("parse config: {0}")]
    Parse(#[from] ParseEnvConfigError),
}

#[derive(Debug, Error)]
pub enum ParseEnvConfigError {
    #[error("{0}")]
    DeserializeToml(#[from] toml::de::Error),

    #[error("no tracks")]
    NoTracks,

    #[error("vod config without 'duration_ms'")]
    MissingDuration,

    #[error("track {0}: timescale is zero")]
    ZeroTimescale(usize),

    #[error("track {0}: {1} track requires '{2}'")]
    MissingField(usize, &'static str, &'static str),

    #[error("track {0}: '{1}' is not valid for {2} tracks")]
    UnexpectedField(usize, &'static str, &'static str),
}

fn parse_config(env_toml: &str) -> Result<EnvConf, ParseEnvConfigError> {
    use ParseEnvConfigError::*;
    let raw: RawEnvConf = toml::from_str(env_toml)?;

    if raw.track.is_empty() {
        return Err(NoTracks);
    }

    let (set_type, total_duration_ms) = match raw.set_type {
        RawSetType::Vod => (MediaSetType::Vod, raw.duration_ms.ok_or(MissingDuration)?),
        RawSetType::Live => (MediaSetType::Live, raw.duration_ms.unwrap_or(0)),
    };

    let tracks = raw
        .track
        .into_iter()
        .enumerate()
        .map(|(i, track)| parse_track(i + 1, track))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EnvConf {
        log_level: raw.log_level.unwrap_or(LogLevel::Info),
        media_set: MediaSet {
            tracks,
            set_type,
            total_duration_ms,
            version: raw.version.unwrap_or(1),
        },
    })
}

fn parse_track(id: usize, raw: RawTrack) -> Result<MediaTrack, ParseEnvConfigError> {
    use ParseEnvConfigError::*;
    if raw.timescale == 0 {
        return Err(ZeroTimescale(id));
    }

    let params = match raw.kind {
        RawKind::Video => {
            let unexpected = [
                ("channels", raw.channels.is_some()),
                ("bits_per_sample", raw.bits_per_sample.is_some()),
                ("sample_rate", raw.sample_rate.is_some()),
                ("object_type_id", raw.object_type_id.is_some()),
            ];
            if let Some((field, _)) = unexpected.iter().find(|(_, set)| *set) {
                return Err(UnexpectedField(id, *field, "video"));
            }
            MediaParams::Video(VideoParams {
                codec: match raw.codec {
                    Some(RawCodec::H265) => VideoCodec::H265,
                    Some(RawCodec::H264) | None => VideoCodec::H264,
                },
                width: raw.width.ok_or(MissingField(id, "video", "width"))?,
                height: raw.height.ok_or(MissingField(id, "video", "height"))?,
            })
        }
        RawKind::Audio => {
            let unexpected = [
                ("codec", raw.codec.is_some()),
                ("width", raw.width.is_some()),
                ("height", raw.height.is_some()),
            ];
            if let Some((field, _)) = unexpected.iter().find(|(_, set)| *set) {
                return Err(UnexpectedField(id, *field, "audio"));
            }
            MediaParams::Audio(AudioParams {
                channels: raw.channels.ok_or(MissingField(id, "audio", "channels"))?,
                bits_per_sample: raw
                    .bits_per_sample
                    .ok_or(MissingField(id, "audio", "bits_per_sample"))?,
                sample_rate: raw
                    .sample_rate
                    .ok_or(MissingField(id, "audio", "sample_rate"))?,
                object_type_id: raw.object_type_id.unwrap_or(DEFAULT_OBJECT_TYPE_ID),
            })
        }
    };

    Ok(MediaTrack {
        params,
        timescale: raw.timescale,
        extra_data: Bytes::from(raw.extra_data),
        bitrate: raw.bitrate,
        sample_description: None,
    })
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_case::test_case;

    const VOD_CONFIG: &str = "
        log_level = \"debug\"
        version = 2
        type = \"vod\"
        duration_ms = 10000

        [[track]]
        kind = \"video\"
        codec = \"h265\"
        timescale = 90000
        width = 1280
        height = 720
        bitrate = 1000000
        extra_data = [1, 100, 0, 22]

        [[track]]
        kind = \"audio\"
        timescale = 90000
        channels = 2
        bits_per_sample = 16
        sample_rate = 48000
        bitrate = 128000
        extra_data = [18, 16]
    ";

    #[test]
    fn test_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("init.toml");
        std::fs::write(&config_file, VOD_CONFIG).unwrap();

        let env = EnvConf::new(&config_file).unwrap();
        assert_eq!(2, env.media_set.tracks.len());
    }

    #[test]
    fn test_config_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            EnvConf::new(&temp_dir.path().join("nil.toml")),
            Err(EnvConfigNewError::ReadFile(..))
        ));
    }

    #[test]
    fn test_parse_config_ok() {
        let got = parse_config(VOD_CONFIG).unwrap();
        assert_eq!(LogLevel::Debug, got.log_level);

        let set = got.media_set;
        assert_eq!(MediaSetType::Vod, set.set_type);
        assert_eq!(10000, set.total_duration_ms);
        assert_eq!(2, set.version);

        let video = &set.tracks[0];
        assert_eq!(
            MediaParams::Video(VideoParams {
                codec: VideoCodec::H265,
                width: 1280,
                height: 720,
            }),
            video.params
        );
        assert_eq!(90000, video.timescale);
        assert_eq!(1_000_000, video.bitrate);
        assert_eq!(Bytes::from_static(&[1, 100, 0, 22]), video.extra_data);
        assert!(video.sample_description.is_none());

        let audio = &set.tracks[1];
        assert_eq!(
            MediaParams::Audio(AudioParams {
                channels: 2,
                bits_per_sample: 16,
                sample_rate: 48000,
                object_type_id: 0x40,
            }),
            audio.params
        );
        assert_eq!(Bytes::from_static(&[18, 16]), audio.extra_data);
    }

    #[test]
    fn test_parse_config_live_defaults() {
        let config = "
            type = \"live\"

            [[track]]
            kind = \"video\"
            timescale = 90000
            width = 640
            height = 480
        ";
        let got = parse_config(config).unwrap();
        assert_eq!(LogLevel::Info, got.log_level);
        assert_eq!(MediaSetType::Live, got.media_set.set_type);
        assert_eq!(0, got.media_set.total_duration_ms);
        assert_eq!(1, got.media_set.version);

        let track = &got.media_set.tracks[0];
        assert!(matches!(
            track.params,
            MediaParams::Video(VideoParams {
                codec: VideoCodec::H264,
                ..
            })
        ));
        assert_eq!(0, track.bitrate);
        assert!(track.extra_data.is_empty());
    }

    #[test]
    fn test_parse_config_deserialize_error() {
        assert!(matches!(
            parse_config("&"),
            Err(ParseEnvConfigError::DeserializeToml(_)),
        ));
    }

    #[test_case("type = \"vod\"\nduration_ms = 1", "no tracks"; "no tracks")]
    #[test_case(
        "type = \"vod\"\n[[track]]\nkind = \"video\"\ntimescale = 1\nwidth = 1\nheight = 1",
        "vod config without 'duration_ms'";
        "missing duration"
    )]
    #[test_case(
        "type = \"live\"\n[[track]]\nkind = \"video\"\ntimescale = 0\nwidth = 1\nheight = 1",
        "track 1: timescale is zero";
        "zero timescale"
    )]
    #[test_case(
        "type = \"live\"\n[[track]]\nkind = \"video\"\ntimescale = 1\nwidth = 1",
        "track 1: video track requires 'height'";
        "missing height"
    )]
    #[test_case(
        "type = \"live\"\n[[track]]\nkind = \"audio\"\ntimescale = 1\nchannels = 1\nbits_per_sample = 16",
        "track 1: audio track requires 'sample_rate'";
        "missing sample rate"
    )]
    #[test_case(
        "type = \"live\"\n[[track]]\nkind = \"audio\"\ntimescale = 1\nwidth = 1",
        "track 1: 'width' is not valid for audio tracks";
        "audio width"
    )]
    #[test_case(
        "type = \"live\"\n[[track]]\nkind = \"video\"\ntimescale = 1\nwidth = 1\nheight = 1\nchannels = 2",
        "track 1: 'channels' is not valid for video tracks";
        "video channels"
    )]
    fn test_parse_config_invalid(config: &str, want: &str) {
        let err = parse_config(config).unwrap_err();
        assert_eq!(want, err.to_string());
    }

    #[test]
    fn test_parse_config_unknown_field() {
        let config = "type = \"live\"\nport = 2020";
        assert!(matches!(
            parse_config(config),
            Err(ParseEnvConfigError::DeserializeToml(_)),
        ));
    }
}
