//! Voice command vocabulary
//!
//! Transcripts are normalized by removing all whitespace and then matched
//! against an ordered list of phrases; the first match wins.

use crate::light::{LightIndex, LightStatus};

const MUSIC_MODE_ON: &str = "음악모드켜줘";
const MUSIC_MODE_OFF: &str = "음악모드꺼줘";
const ALL_ON: &str = "전체켜줘";
const ALL_OFF: &str = "전체꺼줘";
const TURN_ON: &str = "켜줘";
const TURN_OFF: &str = "꺼줘";
const LIGHT_SUFFIX: &str = "번";

/// An interpreted voice command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    MusicMode(bool),
    AllLights(LightStatus),
    Light(LightIndex, LightStatus),
}

/// Why a transcript did not produce a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmatched {
    /// A light was named but no on/off phrase followed
    MissingAction(LightIndex),
    /// Nothing in the vocabulary matched
    Unknown,
}

/// Strip every whitespace character
pub fn normalize(transcript: &str) -> String {
    transcript.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Interpret a raw transcript
pub fn parse(transcript: &str) -> Result<VoiceCommand, Unmatched> {
    let command = normalize(transcript);

    if command.contains(MUSIC_MODE_ON) {
        return Ok(VoiceCommand::MusicMode(true));
    }
    if command.contains(MUSIC_MODE_OFF) {
        return Ok(VoiceCommand::MusicMode(false));
    }
    if command.contains(ALL_ON) {
        return Ok(VoiceCommand::AllLights(LightStatus::On));
    }
    if command.contains(ALL_OFF) {
        return Ok(VoiceCommand::AllLights(LightStatus::Off));
    }

    let light = LightIndex::all()
        .find(|index| command.contains(&format!("{}{}", index, LIGHT_SUFFIX)))
        .ok_or(Unmatched::Unknown)?;

    if command.contains(TURN_ON) {
        Ok(VoiceCommand::Light(light, LightStatus::On))
    } else if command.contains(TURN_OFF) {
        Ok(VoiceCommand::Light(light, LightStatus::Off))
    } else {
        Err(Unmatched::MissingAction(light))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(n: i64) -> LightIndex {
        LightIndex::new(n).unwrap()
    }

    #[test]
    fn test_normalize_strips_all_whitespace() {
        assert_eq!(normalize(" 전체 켜\t줘\n"), "전체켜줘");
    }

    #[test]
    fn test_music_mode_phrases() {
        assert_eq!(parse("음악 모드 켜줘"), Ok(VoiceCommand::MusicMode(true)));
        assert_eq!(parse("음악모드 꺼줘"), Ok(VoiceCommand::MusicMode(false)));
    }

    #[test]
    fn test_all_lights_phrases() {
        assert_eq!(parse("전체 켜줘"), Ok(VoiceCommand::AllLights(LightStatus::On)));
        assert_eq!(parse("전체 꺼줘"), Ok(VoiceCommand::AllLights(LightStatus::Off)));
    }

    #[test]
    fn test_single_light_phrases() {
        assert_eq!(
            parse("2번 불 켜줘"),
            Ok(VoiceCommand::Light(light(2), LightStatus::On))
        );
        assert_eq!(
            parse("3 번 꺼줘"),
            Ok(VoiceCommand::Light(light(3), LightStatus::Off))
        );
    }

    #[test]
    fn test_first_match_wins() {
        // music mode outranks the all-lights phrase in the same utterance
        assert_eq!(
            parse("음악모드켜줘 전체꺼줘"),
            Ok(VoiceCommand::MusicMode(true))
        );
        // lowest light number is picked, turn-on is checked before turn-off
        assert_eq!(
            parse("1번 2번 꺼줘 켜줘"),
            Ok(VoiceCommand::Light(light(1), LightStatus::On))
        );
    }

    #[test]
    fn test_unmatched_commands() {
        assert_eq!(parse("2번"), Err(Unmatched::MissingAction(light(2))));
        assert_eq!(parse("켜줘"), Err(Unmatched::Unknown));
        assert_eq!(parse("4번 켜줘"), Err(Unmatched::Unknown));
        assert_eq!(parse(""), Err(Unmatched::Unknown));
    }
}
