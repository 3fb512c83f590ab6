//! Speaker roles and the per-request role → voice mapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kokoro voices offered to clients, in display order.
///
/// Purely advisory: identifiers outside this list are still passed to the
/// engine, which reports unknown voices itself.
pub const VOICE_OPTIONS: &[&str] = &[
    "af_alloy",
    "af_aoede",
    "af_bella",
    "af_heart",
    "af_jessica",
    "af_kore",
    "af_nicole",
    "af_nova",
    "af_river",
    "af_sarah",
    "af_sky",
    "am_echo",
    "bf_alice",
    "bm_daniel",
    "jf_gongitsune",
    "zm_yunxi",
];

pub const DEFAULT_HOST_VOICE: &str = "af_alloy";
pub const DEFAULT_GUEST_VOICE: &str = "af_river";

/// One of the two fixed podcast roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    Host,
    Guest,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Host => "Host",
            Speaker::Guest => "Guest",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Speaker {
    type Err = String;

    /// Exact, case-sensitive match on the role name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Host" => Ok(Speaker::Host),
            "Guest" => Ok(Speaker::Guest),
            other => Err(other.to_string()),
        }
    }
}

/// Request-scoped assignment of synthesis voices to speaker roles.
///
/// A blank selection leaves the role unassigned; paragraphs spoken by an
/// unassigned role are skipped during synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMap {
    host: Option<String>,
    guest: Option<String>,
}

impl VoiceMap {
    pub fn new(host: impl Into<String>, guest: impl Into<String>) -> Self {
        Self {
            host: non_blank(host.into()),
            guest: non_blank(guest.into()),
        }
    }

    /// Both roles read by the same voice (single-narrator mode).
    pub fn single(voice: impl Into<String>) -> Self {
        let voice = non_blank(voice.into());
        Self {
            host: voice.clone(),
            guest: voice,
        }
    }

    pub fn voice_for(&self, speaker: Speaker) -> Option<&str> {
        match speaker {
            Speaker::Host => self.host.as_deref(),
            Speaker::Guest => self.guest.as_deref(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.host.is_some() && self.guest.is_some()
    }

    /// No role has a voice, so nothing would be spoken.
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.guest.is_none()
    }
}

fn non_blank(voice: String) -> Option<String> {
    let trimmed = voice.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_only_exact_role_names() {
        assert_eq!("Host".parse::<Speaker>(), Ok(Speaker::Host));
        assert_eq!("Guest".parse::<Speaker>(), Ok(Speaker::Guest));
        assert_eq!("host".parse::<Speaker>(), Err("host".to_string()));
        assert!("Narrator".parse::<Speaker>().is_err());
    }

    #[test]
    fn maps_roles_to_selected_voices() {
        let voices = VoiceMap::new("af_heart", "am_echo");
        assert_eq!(voices.voice_for(Speaker::Host), Some("af_heart"));
        assert_eq!(voices.voice_for(Speaker::Guest), Some("am_echo"));
        assert!(voices.is_complete());
    }

    #[test]
    fn blank_selection_leaves_role_unassigned() {
        let voices = VoiceMap::new("af_heart", "  ");
        assert_eq!(voices.voice_for(Speaker::Guest), None);
        assert!(!voices.is_complete());
        assert!(!voices.is_empty());
        assert!(VoiceMap::new("", " ").is_empty());
    }

    #[test]
    fn single_voice_reads_both_roles() {
        let voices = VoiceMap::single("bf_alice");
        assert_eq!(voices.voice_for(Speaker::Host), Some("bf_alice"));
        assert_eq!(voices.voice_for(Speaker::Guest), Some("bf_alice"));
    }

    #[test]
    fn default_voices_are_offered() {
        assert!(VOICE_OPTIONS.contains(&DEFAULT_HOST_VOICE));
        assert!(VOICE_OPTIONS.contains(&DEFAULT_GUEST_VOICE));
    }
}
