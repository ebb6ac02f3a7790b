//! Beat character to visual effect mapping, and the random selection policy
//! used for hue and image changes.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{HuesError, Result};

/// When images change automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoMode {
    /// Never.
    Normal,
    /// On song start and whenever the loop wraps.
    Auto,
    /// Whenever the rhythm says so.
    #[default]
    FullAuto,
}

impl AutoMode {
    pub fn name(self) -> &'static str {
        match self {
            AutoMode::Normal => "normal",
            AutoMode::Auto => "auto",
            AutoMode::FullAuto => "full auto",
        }
    }
}

impl fmt::Display for AutoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AutoMode {
    type Err = HuesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(AutoMode::Normal),
            "auto" => Ok(AutoMode::Auto),
            "full auto" | "full-auto" | "fullauto" => Ok(AutoMode::FullAuto),
            _ => Err(HuesError::UnknownAutoMode(s.to_string())),
        }
    }
}

/// Named effect of one rhythm character, for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatEffect {
    /// `x`: snare.
    VerticalBlur,
    /// `o`: bass.
    HorizontalBlur,
    /// `-`
    NoBlur,
    /// `+`: lasts until the next effect.
    Blackout,
    /// `|`
    ShortBlackout,
    /// `:`
    ColorOnly,
    /// `*`
    ImageOnly,
    /// `X`: like `x` but never changes the image.
    VerticalBlurOnly,
    /// `O`: like `o` but never changes the image.
    HorizontalBlurOnly,
    /// `~`: fade lasts until the next effect.
    FadeColor,
    /// `=`: immediate image change, color fades until the next effect.
    FadeAndChangeImage,
    /// `.` and anything unrecognised.
    Nothing,
}

impl BeatEffect {
    pub fn from_char(character: char) -> Self {
        match character {
            'x' => BeatEffect::VerticalBlur,
            'o' => BeatEffect::HorizontalBlur,
            '-' => BeatEffect::NoBlur,
            '+' => BeatEffect::Blackout,
            '|' => BeatEffect::ShortBlackout,
            ':' => BeatEffect::ColorOnly,
            '*' => BeatEffect::ImageOnly,
            'X' => BeatEffect::VerticalBlurOnly,
            'O' => BeatEffect::HorizontalBlurOnly,
            '~' => BeatEffect::FadeColor,
            '=' => BeatEffect::FadeAndChangeImage,
            _ => BeatEffect::Nothing,
        }
    }

    pub fn changes_hue(self) -> bool {
        matches!(
            self,
            BeatEffect::VerticalBlur
                | BeatEffect::HorizontalBlur
                | BeatEffect::NoBlur
                | BeatEffect::VerticalBlurOnly
                | BeatEffect::HorizontalBlurOnly
                | BeatEffect::ColorOnly
        )
    }

    /// Whether the effect asks for an image change; only honoured in
    /// [`AutoMode::FullAuto`].
    pub fn requests_image(self) -> bool {
        matches!(
            self,
            BeatEffect::VerticalBlur
                | BeatEffect::HorizontalBlur
                | BeatEffect::NoBlur
                | BeatEffect::ImageOnly
                | BeatEffect::FadeAndChangeImage
                | BeatEffect::ShortBlackout
        )
    }
}

/// What the dispatcher should do for a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectActions {
    pub change_hue: bool,
    pub change_image: bool,
}

pub fn actions_for(effect: BeatEffect, mode: AutoMode) -> EffectActions {
    EffectActions {
        change_hue: effect.changes_hue(),
        change_image: mode == AutoMode::FullAuto && effect.requests_image(),
    }
}

/// Picks uniformly among `0..len`, never returning `current` when there is
/// another choice. `None` only when `len` is zero.
pub fn pick_excluding<R: Rng>(rng: &mut R, len: usize, current: Option<usize>) -> Option<usize> {
    match (len, current) {
        (0, _) => None,
        (1, _) => Some(0),
        (_, Some(current)) if current < len => {
            let pick = rng.random_range(0..len - 1);
            Some(if pick >= current { pick + 1 } else { pick })
        }
        _ => Some(rng.random_range(0..len)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn dispatch_table_matches_rhythm_vocabulary() {
        let hue_and_image = ['x', 'o', '-'];
        let hue_only = ['X', 'O', ':'];
        let image_only = ['*', '=', '|'];
        let neither = ['+', '~', '.', '?'];

        for c in hue_and_image {
            let actions = actions_for(BeatEffect::from_char(c), AutoMode::FullAuto);
            assert_eq!(actions, EffectActions { change_hue: true, change_image: true }, "{c}");
        }
        for c in hue_only {
            let actions = actions_for(BeatEffect::from_char(c), AutoMode::FullAuto);
            assert_eq!(actions, EffectActions { change_hue: true, change_image: false }, "{c}");
        }
        for c in image_only {
            let actions = actions_for(BeatEffect::from_char(c), AutoMode::FullAuto);
            assert_eq!(actions, EffectActions { change_hue: false, change_image: true }, "{c}");
        }
        for c in neither {
            let actions = actions_for(BeatEffect::from_char(c), AutoMode::FullAuto);
            assert_eq!(actions, EffectActions::default(), "{c}");
        }
    }

    #[test]
    fn images_only_change_on_beats_in_full_auto() {
        for mode in [AutoMode::Normal, AutoMode::Auto] {
            let actions = actions_for(BeatEffect::from_char('x'), mode);
            assert!(actions.change_hue);
            assert!(!actions.change_image);
        }
    }

    #[test]
    fn parses_auto_mode_names() {
        assert_eq!("full auto".parse::<AutoMode>().unwrap(), AutoMode::FullAuto);
        assert_eq!("Full-Auto".parse::<AutoMode>().unwrap(), AutoMode::FullAuto);
        assert_eq!("normal".parse::<AutoMode>().unwrap(), AutoMode::Normal);
        assert!("sometimes".parse::<AutoMode>().is_err());
        assert_eq!(AutoMode::FullAuto.to_string(), "full auto");
    }

    #[test]
    fn never_repeats_current_selection() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..2_000 {
            let pick = pick_excluding(&mut rng, 5, Some(3)).unwrap();
            assert!(pick < 5);
            assert_ne!(pick, 3);
        }
    }

    #[test]
    fn reaches_every_other_index() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut seen = [false; 4];
        for _ in 0..500 {
            seen[pick_excluding(&mut rng, 4, Some(0)).unwrap()] = true;
        }
        assert_eq!(seen, [false, true, true, true]);
    }

    #[test]
    fn degenerate_lists() {
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(pick_excluding(&mut rng, 0, None), None);
        assert_eq!(pick_excluding(&mut rng, 1, Some(0)), Some(0));
        assert_eq!(pick_excluding(&mut rng, 1, None), Some(0));
        assert!(pick_excluding(&mut rng, 3, None).unwrap() < 3);
    }
}
