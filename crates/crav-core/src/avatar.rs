//! Avatar glow engine for the chat widget.
//!
//! The widget's avatar glows differently depending on what the assistant is
//! doing. The mapping is a fixed table; rendering it to CSS is the only
//! computation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// What the assistant avatar is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarState {
    /// Waiting for input.
    #[default]
    Idle,
    /// Receiving user input.
    Listening,
    /// Producing a reply.
    Thinking,
    /// Delivering a reply.
    Speaking,
}

impl AvatarState {
    /// Every state, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Idle, Self::Listening, Self::Thinking, Self::Speaking];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        }
    }
}

impl std::str::FromStr for AvatarState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "listening" => Ok(Self::Listening),
            "thinking" => Ok(Self::Thinking),
            "speaking" => Ok(Self::Speaking),
            other => Err(CoreError::UnknownVariant {
                kind: "avatar state",
                value: other.to_string(),
            }),
        }
    }
}

/// CSS glow parameters for one state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlowParams {
    /// Glow colour as `#rrggbb`.
    pub color: &'static str,
    /// Opacity of the glow, 0.0-1.0.
    pub intensity: f32,
    /// Blur radius in pixels.
    pub blur_px: u16,
    /// Spread radius in pixels.
    pub spread_px: u16,
    /// Pulse animation period; 0 means steady.
    pub pulse_ms: u32,
}

impl GlowParams {
    /// Render as a CSS `box-shadow` value.
    #[must_use]
    pub fn css_box_shadow(&self) -> String {
        let (r, g, b) = hex_rgb(self.color);
        format!(
            "0 0 {}px {}px rgba({r}, {g}, {b}, {:.2})",
            self.blur_px, self.spread_px, self.intensity
        )
    }

    /// CSS animation shorthand, or `none` for a steady glow.
    #[must_use]
    pub fn css_animation(&self) -> String {
        if self.pulse_ms == 0 {
            "none".to_string()
        } else {
            format!("avatar-pulse {}ms ease-in-out infinite", self.pulse_ms)
        }
    }
}

/// Glow parameters for a state.
#[must_use]
pub const fn glow_for(state: AvatarState) -> GlowParams {
    match state {
        AvatarState::Idle => GlowParams {
            color: "#6366f1",
            intensity: 0.35,
            blur_px: 8,
            spread_px: 0,
            pulse_ms: 0,
        },
        AvatarState::Listening => GlowParams {
            color: "#22c55e",
            intensity: 0.6,
            blur_px: 14,
            spread_px: 2,
            pulse_ms: 1500,
        },
        AvatarState::Thinking => GlowParams {
            color: "#f59e0b",
            intensity: 0.75,
            blur_px: 18,
            spread_px: 3,
            pulse_ms: 900,
        },
        AvatarState::Speaking => GlowParams {
            color: "#06b6d4",
            intensity: 0.9,
            blur_px: 24,
            spread_px: 4,
            pulse_ms: 600,
        },
    }
}

fn hex_rgb(color: &str) -> (u8, u8, u8) {
    let hex = color.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    (channel(0), channel(2), channel(4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_distinct_glow() {
        let colors: std::collections::HashSet<_> =
            AvatarState::ALL.iter().map(|s| glow_for(*s).color).collect();
        assert_eq!(colors.len(), AvatarState::ALL.len());
    }

    #[test]
    fn glow_grows_with_activity() {
        let intensities: Vec<f32> = AvatarState::ALL
            .iter()
            .map(|s| glow_for(*s).intensity)
            .collect();
        assert!(intensities.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn renders_box_shadow() {
        assert_eq!(
            glow_for(AvatarState::Speaking).css_box_shadow(),
            "0 0 24px 4px rgba(6, 182, 212, 0.90)"
        );
    }

    #[test]
    fn idle_does_not_pulse() {
        assert_eq!(glow_for(AvatarState::Idle).css_animation(), "none");
        assert_eq!(
            glow_for(AvatarState::Thinking).css_animation(),
            "avatar-pulse 900ms ease-in-out infinite"
        );
    }

    #[test]
    fn state_names_parse_back() {
        for state in AvatarState::ALL {
            assert_eq!(state.as_str().parse::<AvatarState>().unwrap(), state);
        }
        assert!("dancing".parse::<AvatarState>().is_err());
    }
}
