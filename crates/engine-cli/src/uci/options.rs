//! UCI engine options

use std::fmt;

/// Engine option descriptor
#[derive(Debug, Clone)]
pub enum EngineOption {
    /// Checkbox option
    Check { name: String, default: bool },

    /// Spin (numeric) option
    Spin {
        name: String,
        default: i64,
        min: i64,
        max: i64,
    },

    /// Combo (dropdown) option
    Combo {
        name: String,
        default: String,
        options: Vec<String>,
    },

    /// Free-form string option (also used for file paths)
    String { name: String, default: String },
}

impl EngineOption {
    pub fn check(name: impl Into<String>, default: bool) -> Self {
        EngineOption::Check {
            name: name.into(),
            default,
        }
    }

    pub fn spin(name: impl Into<String>, default: i64, min: i64, max: i64) -> Self {
        EngineOption::Spin {
            name: name.into(),
            default,
            min,
            max,
        }
    }

    pub fn combo(name: impl Into<String>, default: impl Into<String>, options: &[&str]) -> Self {
        EngineOption::Combo {
            name: name.into(),
            default: default.into(),
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        EngineOption::String {
            name: name.into(),
            default: default.into(),
        }
    }
}

impl fmt::Display for EngineOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineOption::Check { name, default } => {
                write!(f, "option name {name} type check default {default}")
            }
            EngineOption::Spin {
                name,
                default,
                min,
                max,
            } => {
                write!(f, "option name {name} type spin default {default} min {min} max {max}")
            }
            EngineOption::Combo {
                name,
                default,
                options,
            } => {
                write!(f, "option name {name} type combo default {default}")?;
                for opt in options {
                    write!(f, " var {opt}")?;
                }
                Ok(())
            }
            EngineOption::String { name, default } => {
                let default = if default.is_empty() {
                    "<empty>"
                } else {
                    default.as_str()
                };
                write!(f, "option name {name} type string default {default}")
            }
        }
    }
}

/// The full option list advertised on `uci`
pub fn all_options() -> Vec<EngineOption> {
    vec![
        EngineOption::spin("Hash", 16, 1, 33554432),
        EngineOption::spin("Threads", 1, 1, 1024),
        EngineOption::spin("MultiPV", 1, 1, 256),
        EngineOption::check("Ponder", false),
        EngineOption::check("UCI_Chess960", false),
        EngineOption::spin("Move Overhead", 10, 0, 5000),
        EngineOption::spin("Skill Level", 20, 0, 20),
        EngineOption::check("UCI_LimitStrength", false),
        EngineOption::spin("UCI_Elo", 1320, 1320, 3190),
        EngineOption::combo(
            "Style",
            "Default",
            &["Default", "Aggressive", "Defensive", "Positional"],
        ),
        EngineOption::check("Dynamic Strategy", false),
        EngineOption::spin("MaterialisticEvaluationStrategy", 0, -12, 12),
        EngineOption::spin("PositionalEvaluationStrategy", 0, -12, 12),
        EngineOption::string("SyzygyPath", ""),
        EngineOption::spin("SyzygyProbeDepth", 1, 1, 100),
        EngineOption::check("Syzygy50MoveRule", true),
        EngineOption::string("BookFile", ""),
        EngineOption::string("EvalFile", "<embedded>"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_rendering() {
        assert_eq!(
            EngineOption::spin("Hash", 16, 1, 1024).to_string(),
            "option name Hash type spin default 16 min 1 max 1024"
        );
        assert_eq!(
            EngineOption::check("Ponder", false).to_string(),
            "option name Ponder type check default false"
        );
        assert_eq!(
            EngineOption::combo("Style", "Default", &["Default", "Aggressive"]).to_string(),
            "option name Style type combo default Default var Default var Aggressive"
        );
        assert_eq!(
            EngineOption::string("SyzygyPath", "").to_string(),
            "option name SyzygyPath type string default <empty>"
        );
    }

    #[test]
    fn test_required_options_present() {
        let names: Vec<String> = all_options()
            .iter()
            .map(|o| match o {
                EngineOption::Check { name, .. }
                | EngineOption::Spin { name, .. }
                | EngineOption::Combo { name, .. }
                | EngineOption::String { name, .. } => name.clone(),
            })
            .collect();
        for required in [
            "Hash",
            "Threads",
            "MultiPV",
            "UCI_Chess960",
            "Ponder",
            "Skill Level",
            "UCI_LimitStrength",
            "UCI_Elo",
            "Style",
            "Dynamic Strategy",
            "MaterialisticEvaluationStrategy",
            "PositionalEvaluationStrategy",
            "SyzygyPath",
            "SyzygyProbeDepth",
            "Syzygy50MoveRule",
        ] {
            assert!(names.iter().any(|n| n == required), "missing option {required}");
        }
    }
}
