//! Filter selection
//!
//! `FilterKind` is what a caller asks for by name; `FilterSpec` is the kind
//! together with its parameter set, ready to run.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::bass::{bass, BassParams};
use super::deep::{deep, DeepParams};
use super::echo::{echo, EchoParams};
use super::radio::{radio, RadioParams};
use super::robot::{robot, RobotParams};
use crate::engine::SampleBuffer;
use crate::error::Result;

/// Names accepted by `FilterKind::from_name`
pub const FILTER_NAMES: [&str; 5] = ["deep", "robot", "radio", "echo", "bass"];

/// Filter identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Deep,
    Robot,
    Radio,
    Echo,
    Bass,
    /// No transform
    PassThrough,
}

impl FilterKind {
    /// Resolve a filter name; anything unrecognised is `PassThrough`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "deep" => FilterKind::Deep,
            "robot" => FilterKind::Robot,
            "radio" => FilterKind::Radio,
            "echo" => FilterKind::Echo,
            "bass" => FilterKind::Bass,
            _ => FilterKind::PassThrough,
        }
    }

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Deep => "deep",
            FilterKind::Robot => "robot",
            FilterKind::Radio => "radio",
            FilterKind::Echo => "echo",
            FilterKind::Bass => "bass",
            FilterKind::PassThrough => "passthrough",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A filter together with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterSpec {
    Deep(DeepParams),
    Robot(RobotParams),
    Radio(RadioParams),
    Echo(EchoParams),
    Bass(BassParams),
    PassThrough,
}

impl FilterSpec {
    /// Which filter this spec runs
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterSpec::Deep(_) => FilterKind::Deep,
            FilterSpec::Robot(_) => FilterKind::Robot,
            FilterSpec::Radio(_) => FilterKind::Radio,
            FilterSpec::Echo(_) => FilterKind::Echo,
            FilterSpec::Bass(_) => FilterKind::Bass,
            FilterSpec::PassThrough => FilterKind::PassThrough,
        }
    }

    /// Validate the parameter set
    pub fn validate(&self) -> Result<()> {
        match self {
            FilterSpec::Deep(p) => p.validate(),
            FilterSpec::Robot(p) => p.validate(),
            FilterSpec::Radio(p) => p.validate(),
            FilterSpec::Echo(p) => p.validate(),
            FilterSpec::Bass(p) => p.validate(),
            FilterSpec::PassThrough => Ok(()),
        }
    }

    /// Run the filter
    ///
    /// `rng` is only drawn from by filters that inject noise.
    pub fn apply<R: Rng + ?Sized>(&self, input: &SampleBuffer, rng: &mut R) -> Result<SampleBuffer> {
        match self {
            FilterSpec::Deep(p) => deep(input, p),
            FilterSpec::Robot(p) => robot(input, p),
            FilterSpec::Radio(p) => radio(input, p, rng),
            FilterSpec::Echo(p) => echo(input, p),
            FilterSpec::Bass(p) => bass(input, p),
            FilterSpec::PassThrough => {
                input.ensure_valid("passthrough")?;
                Ok(input.clone())
            }
        }
    }
}

/// Parameter sets used when a filter is requested by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPresets {
    pub deep: DeepParams,
    pub robot: RobotParams,
    pub radio: RadioParams,
    pub echo: EchoParams,
    pub bass: BassParams,
}

impl FilterPresets {
    /// Build the `FilterSpec` for a filter kind
    pub fn spec_for(&self, kind: FilterKind) -> FilterSpec {
        match kind {
            FilterKind::Deep => FilterSpec::Deep(self.deep.clone()),
            FilterKind::Robot => FilterSpec::Robot(self.robot.clone()),
            FilterKind::Radio => FilterSpec::Radio(self.radio.clone()),
            FilterKind::Echo => FilterSpec::Echo(self.echo.clone()),
            FilterKind::Bass => FilterSpec::Bass(self.bass.clone()),
            FilterKind::PassThrough => FilterSpec::PassThrough,
        }
    }

    /// Validate every preset
    pub fn validate(&self) -> Result<()> {
        self.deep.validate()?;
        self.robot.validate()?;
        self.radio.validate()?;
        self.echo.validate()?;
        self.bass.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CANONICAL_SAMPLE_RATE;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    #[test_case("deep", FilterKind::Deep)]
    #[test_case("Robot", FilterKind::Robot)]
    #[test_case(" radio ", FilterKind::Radio)]
    #[test_case("echo", FilterKind::Echo)]
    #[test_case("BASS", FilterKind::Bass)]
    #[test_case("clear", FilterKind::PassThrough)]
    #[test_case("", FilterKind::PassThrough)]
    fn test_from_name(name: &str, expected: FilterKind) {
        assert_eq!(FilterKind::from_name(name), expected);
    }

    #[test]
    fn test_names_round_trip() {
        for name in FILTER_NAMES {
            assert_eq!(FilterKind::from_name(name).name(), name);
        }
    }

    #[test]
    fn test_spec_for_matches_kind() {
        let presets = FilterPresets::default();
        for kind in [
            FilterKind::Deep,
            FilterKind::Robot,
            FilterKind::Radio,
            FilterKind::Echo,
            FilterKind::Bass,
            FilterKind::PassThrough,
        ] {
            assert_eq!(presets.spec_for(kind).kind(), kind);
        }
        assert!(presets.validate().is_ok());
    }

    #[test]
    fn test_passthrough_returns_input() {
        let input = SampleBuffer::sine(440.0, 0.5, 0.1, CANONICAL_SAMPLE_RATE);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(FilterSpec::PassThrough.apply(&input, &mut rng).unwrap(), input);
    }

    #[test]
    fn test_spec_serialization_is_tagged() {
        let json = serde_json::to_value(FilterSpec::Echo(EchoParams::default())).unwrap();
        assert_eq!(json["filter"], "echo");
        assert_eq!(json["taps"][0]["delay_ms"], 300.0);

        let back: FilterSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), FilterKind::Echo);
    }
}
