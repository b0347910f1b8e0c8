//! MusicXML vocabulary → model enumerations.
//!
//! The `*_value` functions are pure and return `None` for unknown input.
//! The wrappers without the suffix also record one warning when a
//! non-empty value has no mapping.

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::*;

// ─── Pure tables ─────────────────────────────────────────────────────

pub fn duration_value(value: &str) -> Option<Duration> {
    let dur = match value {
        "maxima" => Duration::Maxima,
        "long" => Duration::Long,
        "breve" => Duration::Breve,
        "whole" => Duration::Whole,
        "half" => Duration::Half,
        "quarter" => Duration::Quarter,
        "eighth" => Duration::Eighth,
        "16th" => Duration::D16,
        "32nd" => Duration::D32,
        "64th" => Duration::D64,
        "128th" => Duration::D128,
        "256th" => Duration::D256,
        _ => return None,
    };
    Some(dur)
}

pub fn pitch_name_value(value: &str) -> Option<PitchName> {
    let pname = match value {
        "C" => PitchName::C,
        "D" => PitchName::D,
        "E" => PitchName::E,
        "F" => PitchName::F,
        "G" => PitchName::G,
        "A" => PitchName::A,
        "B" => PitchName::B,
        _ => return None,
    };
    Some(pname)
}

pub fn accidental_value(value: &str) -> Option<AccidentalExplicit> {
    let accid = match value {
        "sharp" => AccidentalExplicit::Sharp,
        "natural" => AccidentalExplicit::Natural,
        "flat" => AccidentalExplicit::Flat,
        "double-sharp" => AccidentalExplicit::DoubleSharp,
        "sharp-sharp" => AccidentalExplicit::SharpSharp,
        "flat-flat" => AccidentalExplicit::FlatFlat,
        "natural-sharp" => AccidentalExplicit::NaturalSharp,
        "natural-flat" => AccidentalExplicit::NaturalFlat,
        "quarter-flat" => AccidentalExplicit::QuarterFlat,
        "quarter-sharp" => AccidentalExplicit::QuarterSharp,
        "three-quarters-flat" => AccidentalExplicit::ThreeQuartersFlat,
        "three-quarters-sharp" => AccidentalExplicit::ThreeQuartersSharp,
        _ => return None,
    };
    Some(accid)
}

/// Map a `<alter>` value onto an implied accidental.
///
/// Only whole and half steps between -2 and 2 are representable.
pub fn alter_value(value: f64) -> Option<AccidentalImplicit> {
    const TABLE: [(f64, AccidentalImplicit); 9] = [
        (-2.0, AccidentalImplicit::DoubleFlat),
        (-1.5, AccidentalImplicit::FlatDown),
        (-1.0, AccidentalImplicit::Flat),
        (-0.5, AccidentalImplicit::FlatUp),
        (0.0, AccidentalImplicit::Natural),
        (0.5, AccidentalImplicit::SharpDown),
        (1.0, AccidentalImplicit::Sharp),
        (1.5, AccidentalImplicit::SharpUp),
        (2.0, AccidentalImplicit::DoubleSharp),
    ];
    TABLE
        .iter()
        .find(|(alter, _)| *alter == value)
        .map(|(_, accid)| *accid)
}

/// Bar style, which depends on whether the barline also carries a repeat.
pub fn bar_rendition_value(style: &str, repeat: bool) -> Option<BarRendition> {
    let rend = match (style, repeat) {
        ("dashed", _) => BarRendition::Dashed,
        ("dotted", _) => BarRendition::Dotted,
        ("light-light", _) => BarRendition::Double,
        ("light-heavy", false) => BarRendition::End,
        ("light-heavy", true) => BarRendition::RepeatEnd,
        ("heavy-light", true) => BarRendition::RepeatStart,
        ("none", _) => BarRendition::Invisible,
        ("regular", _) => BarRendition::Single,
        _ => return None,
    };
    Some(rend)
}

/// Clef shape from the first four characters of `<sign>`.
pub fn clef_shape_value(sign: &str) -> Option<ClefShape> {
    let head: String = sign.chars().take(4).collect();
    let shape = match head.as_str() {
        "G" => ClefShape::G,
        "GG" => ClefShape::GG,
        "F" => ClefShape::F,
        "C" => ClefShape::C,
        "perc" => ClefShape::Perc,
        "TAB" => ClefShape::Tab,
        _ => return None,
    };
    Some(shape)
}

pub fn mode_value(value: &str) -> Option<Mode> {
    let mode = match value {
        "major" => Mode::Major,
        "minor" => Mode::Minor,
        "dorian" => Mode::Dorian,
        "phrygian" => Mode::Phrygian,
        "lydian" => Mode::Lydian,
        "mixolydian" => Mode::Mixolydian,
        "aeolian" => Mode::Aeolian,
        "locrian" => Mode::Locrian,
        _ => return None,
    };
    Some(mode)
}

pub fn group_symbol_value(value: &str) -> Option<GroupSymbol> {
    match value {
        "bracket" => Some(GroupSymbol::Bracket),
        "brace" => Some(GroupSymbol::Brace),
        "line" => Some(GroupSymbol::Line),
        _ => None,
    }
}

pub fn pedal_dir_value(value: &str) -> Option<PedalDir> {
    match value {
        "start" => Some(PedalDir::Down),
        "stop" => Some(PedalDir::Up),
        _ => None,
    }
}

pub fn fermata_shape_value(value: &str) -> Option<FermataShape> {
    match value {
        "normal" => Some(FermataShape::Curved),
        "angled" => Some(FermataShape::Angular),
        "square" => Some(FermataShape::Square),
        _ => None,
    }
}

/// `orientation` of a tie or slur.
pub fn curve_dir_value(value: &str) -> Option<CurveDir> {
    match value {
        "over" => Some(CurveDir::Above),
        "under" => Some(CurveDir::Below),
        _ => None,
    }
}

/// `placement` of a tie or slur, which overrides its orientation.
pub fn curve_place_value(value: &str) -> Option<CurveDir> {
    match value {
        "above" => Some(CurveDir::Above),
        "below" => Some(CurveDir::Below),
        _ => None,
    }
}

pub fn place_value(value: &str) -> Option<Place> {
    match value {
        "above" => Some(Place::Above),
        "below" => Some(Place::Below),
        _ => None,
    }
}

pub fn tuplet_num_format_value(value: &str) -> Option<TupletNumFormat> {
    match value {
        "actual" => Some(TupletNumFormat::Count),
        "both" => Some(TupletNumFormat::Ratio),
        _ => None,
    }
}

/// `size` of an octave shift.
pub fn octave_dis_value(size: i32) -> Option<OctaveDis> {
    match size {
        8 => Some(OctaveDis::Eight),
        15 => Some(OctaveDis::Fifteen),
        22 => Some(OctaveDis::TwentyTwo),
        _ => None,
    }
}

/// `clef-octave-change` → displacement and its direction.
pub fn clef_dis_value(change: i32) -> (Option<OctaveDis>, Option<Place>) {
    let dis = match change.abs() {
        1 => Some(OctaveDis::Eight),
        2 => Some(OctaveDis::Fifteen),
        _ => None,
    };
    let place = match change {
        c if c < 0 => Some(Place::Below),
        c if c > 0 => Some(Place::Above),
        _ => None,
    };
    (dis, place)
}

pub fn yes_no_value(value: &str) -> Option<bool> {
    match value {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

pub fn articulation_value(name: &str) -> Option<Articulation> {
    let artic = match name {
        "accent" => Articulation::Accent,
        "detached-legato" => Articulation::TenutoStaccato,
        "spiccato" => Articulation::Spiccato,
        "staccatissimo" => Articulation::Staccatissimo,
        "staccato" => Articulation::Staccato,
        "strong-accent" => Articulation::Marcato,
        "tenuto" => Articulation::Tenuto,
        _ => return None,
    };
    Some(artic)
}

pub fn technical_value(name: &str) -> Option<Articulation> {
    let artic = match name {
        "down-bow" => Articulation::DownBow,
        "harmonic" => Articulation::Harmonic,
        "open-string" => Articulation::OpenString,
        "snap-pizzicato" => Articulation::SnapPizzicato,
        "stopped" => Articulation::Stopped,
        "up-bow" => Articulation::UpBow,
        _ => return None,
    };
    Some(artic)
}

/// Printable symbol for a harmony root alteration.
pub fn alter_symbol(value: &str) -> Option<&'static str> {
    match value {
        "-1" => Some("\u{266d}"),
        "0" => Some("\u{266e}"),
        "1" => Some("\u{266f}"),
        _ => None,
    }
}

// ─── Warning wrappers ────────────────────────────────────────────────

fn unknown<T>(diag: &mut Diagnostics, found: Option<T>, what: &str, value: &str) -> Option<T> {
    if found.is_none() && !value.is_empty() {
        diag.warn(
            WarningKind::UnknownValue,
            format!("Unsupported {what} '{value}'"),
        );
    }
    found
}

pub fn duration(value: &str, diag: &mut Diagnostics) -> Option<Duration> {
    unknown(diag, duration_value(value), "type", value)
}

pub fn pitch_name(value: &str, diag: &mut Diagnostics) -> Option<PitchName> {
    unknown(diag, pitch_name_value(value), "pitch name", value)
}

pub fn accidental(value: &str, diag: &mut Diagnostics) -> Option<AccidentalExplicit> {
    unknown(diag, accidental_value(value), "accidental value", value)
}

pub fn alter(value: f64, diag: &mut Diagnostics) -> Option<AccidentalImplicit> {
    let accid = alter_value(value);
    if accid.is_none() {
        diag.warn(
            WarningKind::UnknownValue,
            format!("Unsupported alter value '{value}'"),
        );
    }
    accid
}

pub fn bar_rendition(style: &str, repeat: bool, diag: &mut Diagnostics) -> Option<BarRendition> {
    unknown(diag, bar_rendition_value(style, repeat), "bar-style", style)
}

pub fn clef_shape(sign: &str, diag: &mut Diagnostics) -> Option<ClefShape> {
    unknown(diag, clef_shape_value(sign), "clef sign", sign)
}

pub fn mode(value: &str, diag: &mut Diagnostics) -> Option<Mode> {
    unknown(diag, mode_value(value), "mode", value)
}

pub fn pedal_dir(value: &str, diag: &mut Diagnostics) -> Option<PedalDir> {
    unknown(diag, pedal_dir_value(value), "pedal type", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_names() {
        assert_eq!(duration_value("quarter"), Some(Duration::Quarter));
        assert_eq!(duration_value("16th"), Some(Duration::D16));
        assert_eq!(duration_value("breve"), Some(Duration::Breve));
        assert_eq!(duration_value("crotchet"), None);
    }

    #[test]
    fn lookups_are_stable_across_calls() {
        for _ in 0..3 {
            assert_eq!(pitch_name_value("G"), Some(PitchName::G));
            assert_eq!(accidental_value("flat-flat"), Some(AccidentalExplicit::FlatFlat));
        }
    }

    #[test]
    fn unknown_value_warns_exactly_once() {
        let mut diag = Diagnostics::new();
        assert_eq!(duration("crotchet", &mut diag), None);
        assert_eq!(diag.count(WarningKind::UnknownValue), 1);

        assert_eq!(duration("half", &mut diag), Some(Duration::Half));
        assert_eq!(pitch_name("H", &mut diag), None);
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn absent_value_does_not_warn() {
        let mut diag = Diagnostics::new();
        assert_eq!(duration("", &mut diag), None);
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn alter_table_is_discrete() {
        assert_eq!(alter_value(-1.0), Some(AccidentalImplicit::Flat));
        assert_eq!(alter_value(0.5), Some(AccidentalImplicit::SharpDown));
        assert_eq!(alter_value(2.0), Some(AccidentalImplicit::DoubleSharp));
        assert_eq!(alter_value(0.25), None);

        let mut diag = Diagnostics::new();
        assert_eq!(alter(3.0, &mut diag), None);
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn bar_style_depends_on_repeat() {
        assert_eq!(bar_rendition_value("light-heavy", false), Some(BarRendition::End));
        assert_eq!(bar_rendition_value("light-heavy", true), Some(BarRendition::RepeatEnd));
        assert_eq!(bar_rendition_value("heavy-light", true), Some(BarRendition::RepeatStart));
        assert_eq!(bar_rendition_value("heavy-light", false), None);
    }

    #[test]
    fn clef_sign_is_truncated() {
        assert_eq!(clef_shape_value("percussion"), Some(ClefShape::Perc));
        assert_eq!(clef_shape_value("TAB"), Some(ClefShape::Tab));
        assert_eq!(clef_shape_value("none"), None);
    }

    #[test]
    fn clef_octave_change() {
        assert_eq!(clef_dis_value(-1), (Some(OctaveDis::Eight), Some(Place::Below)));
        assert_eq!(clef_dis_value(2), (Some(OctaveDis::Fifteen), Some(Place::Above)));
        assert_eq!(clef_dis_value(0), (None, None));
    }

    #[test]
    fn articulation_vocabulary() {
        assert_eq!(articulation_value("strong-accent"), Some(Articulation::Marcato));
        assert_eq!(articulation_value("detached-legato"), Some(Articulation::TenutoStaccato));
        assert_eq!(technical_value("snap-pizzicato"), Some(Articulation::SnapPizzicato));
        assert_eq!(technical_value("fingering"), None);
    }
}
