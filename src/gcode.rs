//! G-code synthesis for the back-and-forth excitation move.

use clap::builder::PossibleValue;
use std::fmt;
use std::str::FromStr;

/// One printer axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn lower(self) -> char {
        match self {
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    pub fn upper(self) -> char {
        self.lower().to_ascii_uppercase()
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lower())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(format!("unknown axis: {other}")),
        }
    }
}

impl clap::ValueEnum for Axis {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(PossibleValue::new(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }))
    }
}

/// Interpret an axis combination such as "xz" or "xyz" as an ordered axis
/// list (x before y before z, each at most once).
pub fn parse_axis_set(names: &str) -> Result<Vec<Axis>, String> {
    for c in names.chars() {
        if !"xyzXYZ".contains(c) {
            return Err(format!("unknown axis in {names:?}: {c}"));
        }
    }
    let lowered = names.to_ascii_lowercase();
    let axes: Vec<Axis> = Axis::ALL
        .into_iter()
        .filter(|a| lowered.contains(a.lower()))
        .collect();
    if axes.is_empty() {
        return Err("empty axis set".to_string());
    }
    Ok(axes)
}

/// Parameters of one coplanar step trajectory.
#[derive(Clone, Copy, Debug)]
pub struct TrajectoryOptions {
    pub axis: Axis,
    /// Start point in mm.
    pub start_mm: (i32, i32, i32),
    /// Travel distance in mm; negative moves in the opposite direction.
    pub distance_mm: i32,
    /// How often the back-and-forth step repeats.
    pub step_repeat_count: u32,
    pub go_to_start: bool,
    pub return_to_start: bool,
    pub auto_home: bool,
}

/// Generate a simple coplanar trajectory in X, Y or Z direction.
///
/// The tool moves to the start position, then travels back and forth along
/// the chosen axis for the requested number of repetitions.
pub fn coplanar_trajectory(opts: &TrajectoryOptions) -> Vec<String> {
    let (x, y, z) = opts.start_mm;
    let ax = opts.axis.upper();
    let start_axis_mm = match opts.axis {
        Axis::X => x,
        Axis::Y => y,
        Axis::Z => z,
    };

    let mut commands = Vec::new();

    if opts.auto_home {
        commands.push("G28 O X Y Z".to_string());
    }
    if opts.go_to_start {
        commands.push(format!("G1 X{x} Y{y} Z{z}"));
    }
    for _ in 0..opts.step_repeat_count {
        commands.push(format!("G1 {ax}{start_axis_mm}"));
        commands.push(format!("G1 {ax}{}", start_axis_mm + opts.distance_mm));
    }
    if opts.return_to_start {
        commands.push(format!("G1 {ax}{start_axis_mm}"));
    }

    commands
}

/// The input-shaping preamble line for one run, e.g. `M593 X F30 D0.15`.
///
/// The damping field always carries a decimal point (`D0.0`, `D1.0`,
/// `D0.5`), the rendering Marlin configurations are exchanged in.
pub fn input_shaping_command(axis: Axis, frequency_hz: u16, zeta_em2: u8) -> String {
    let mut damping = format!("{:.2}", f64::from(zeta_em2) / 100.0);
    if damping.ends_with('0') && !damping.ends_with(".0") {
        damping.pop();
    }
    format!("M593 {} F{} D{}", axis.upper(), frequency_hz, damping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_trajectory_in_order() {
        let commands = coplanar_trajectory(&TrajectoryOptions {
            axis: Axis::X,
            start_mm: (200, 140, 20),
            distance_mm: 20,
            step_repeat_count: 2,
            go_to_start: true,
            return_to_start: true,
            auto_home: true,
        });
        assert_eq!(
            commands,
            vec![
                "G28 O X Y Z",
                "G1 X200 Y140 Z20",
                "G1 X200",
                "G1 X220",
                "G1 X200",
                "G1 X220",
                "G1 X200",
            ]
        );
    }

    #[test]
    fn optional_moves_can_be_skipped() {
        let commands = coplanar_trajectory(&TrajectoryOptions {
            axis: Axis::Z,
            start_mm: (0, 0, 50),
            distance_mm: -10,
            step_repeat_count: 1,
            go_to_start: false,
            return_to_start: false,
            auto_home: false,
        });
        assert_eq!(commands, vec!["G1 Z50", "G1 Z40"]);
    }

    #[test]
    fn axis_sets_are_ordered_and_deduplicated() {
        assert_eq!(parse_axis_set("zx").unwrap(), vec![Axis::X, Axis::Z]);
        assert_eq!(
            parse_axis_set("xyz").unwrap(),
            vec![Axis::X, Axis::Y, Axis::Z]
        );
        assert!(parse_axis_set("xq").is_err());
        assert!(parse_axis_set("").is_err());
    }

    #[test]
    fn input_shaping_scales_zeta() {
        assert_eq!(input_shaping_command(Axis::Y, 30, 15), "M593 Y F30 D0.15");
        assert_eq!(input_shaping_command(Axis::X, 100, 0), "M593 X F100 D0.0");
        assert_eq!(input_shaping_command(Axis::X, 40, 100), "M593 X F40 D1.0");
        assert_eq!(input_shaping_command(Axis::Z, 25, 50), "M593 Z F25 D0.5");
        assert_eq!(input_shaping_command(Axis::Z, 25, 5), "M593 Z F25 D0.05");
    }
}
