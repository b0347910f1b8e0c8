//! Data model for an imported score.
//!
//! The tree mirrors what a notation layout engine consumes: static staff
//! definitions grouped into a [`StaffGroup`] tree, and a single [`Section`]
//! of measures, each holding staves, layers (voices) and layer elements.
//! Floating annotations ([`ControlElement`]) reference notes by identifier
//! (`#<id>`) instead of owning them.

use serde::{Deserialize, Serialize};

/// Root of an imported score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    /// Movement title, falling back to the work title
    pub title: Option<String>,
    /// Tempo of the first `<sound tempo>` in the first measure of the first part
    pub midi_bpm: Option<i32>,
    /// Static staff definitions
    pub staff_grp: StaffGroup,
    /// Flat sequence of measures; layout splits it into pages later
    pub section: Section,
}

// ─── Staff definitions ───────────────────────────────────────────────

/// A node of the staff-group tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffGroup {
    pub symbol: Option<GroupSymbol>,
    pub label: Option<String>,
    pub label_abbr: Option<String>,
    /// Barlines run through all staves of the group
    pub bar_thru: bool,
    pub children: Vec<StaffGroupChild>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StaffGroupChild {
    StaffDef(StaffDef),
    Group(StaffGroup),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupSymbol {
    Brace,
    Bracket,
    Line,
}

/// Static attributes of one staff, read from the first measure of its part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffDef {
    /// Global staff number (1-based, unique across parts)
    pub n: u32,
    pub label: Option<String>,
    pub label_abbr: Option<String>,
    pub clef_shape: Option<ClefShape>,
    pub clef_line: Option<u8>,
    pub clef_dis: Option<OctaveDis>,
    pub clef_dis_place: Option<Place>,
    pub key_sig: Option<KeySignature>,
    pub key_mode: Option<Mode>,
    pub meter_sym: Option<MeterSymbol>,
    pub meter_rend: Option<MeterRendition>,
    pub meter_count: Option<i32>,
    pub meter_unit: Option<i32>,
    /// Number of staff lines (5 unless `staff-details` says otherwise)
    pub lines: u8,
    /// Display scale in percent
    pub scale: Option<u32>,
    pub trans_diat: Option<i32>,
    pub trans_semi: Option<i32>,
    pub notation_type: Option<NotationType>,
    /// Divisions per quarter note declared for the part
    pub ppq: Option<i32>,
}

impl StaffGroup {
    /// Iterate every staff definition in document order, depth first.
    pub fn staff_defs(&self) -> Vec<&StaffDef> {
        let mut defs = Vec::new();
        collect_staff_defs(self, &mut defs);
        defs
    }
}

fn collect_staff_defs<'a>(group: &'a StaffGroup, out: &mut Vec<&'a StaffDef>) {
    for child in &group.children {
        match child {
            StaffGroupChild::StaffDef(def) => out.push(def),
            StaffGroupChild::Group(sub) => collect_staff_defs(sub, out),
        }
    }
}

// ─── Measures ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    pub measures: Vec<Measure>,
}

/// One measure; staves from every part sharing this index are merged here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measure {
    /// Measure number as written (not unique across the document)
    pub n: i32,
    pub left: Option<BarRendition>,
    pub right: Option<BarRendition>,
    pub staves: Vec<Staff>,
    /// Floating annotations, attached after the whole document is read
    pub control_elements: Vec<ControlElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Staff {
    /// Global staff number
    pub n: u32,
    pub layers: Vec<Layer>,
}

/// One voice within a staff.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Layer {
    pub n: u32,
    pub elements: Vec<LayerElement>,
}

impl Measure {
    pub fn staff(&self, n: u32) -> Option<&Staff> {
        self.staves.iter().find(|s| s.n == n)
    }
}

impl Staff {
    pub fn layer(&self, n: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.n == n)
    }
}

// ─── Layer elements ──────────────────────────────────────────────────

/// Anything that can live inside a layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LayerElement {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    MeasureRest(MeasureRest),
    Space(Space),
    Clef(ClefChange),
    MeasureRepeat(MeasureRepeat),
    Beam(Beam),
    Tuplet(Tuplet),
    BowedTremolo(BowedTremolo),
    FingeredTremolo(FingeredTremolo),
}

impl LayerElement {
    pub fn id(&self) -> &str {
        match self {
            LayerElement::Note(e) => &e.id,
            LayerElement::Chord(e) => &e.id,
            LayerElement::Rest(e) => &e.id,
            LayerElement::MeasureRest(e) => &e.id,
            LayerElement::Space(e) => &e.id,
            LayerElement::Clef(e) => &e.id,
            LayerElement::MeasureRepeat(e) => &e.id,
            LayerElement::Beam(e) => &e.id,
            LayerElement::Tuplet(e) => &e.id,
            LayerElement::BowedTremolo(e) => &e.id,
            LayerElement::FingeredTremolo(e) => &e.id,
        }
    }

    /// Child elements of a grouping container, `None` for leaf events.
    pub fn children(&self) -> Option<&Vec<LayerElement>> {
        match self {
            LayerElement::Chord(e) => Some(&e.children),
            LayerElement::Beam(e) => Some(&e.children),
            LayerElement::Tuplet(e) => Some(&e.children),
            LayerElement::BowedTremolo(e) => Some(&e.children),
            LayerElement::FingeredTremolo(e) => Some(&e.children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<LayerElement>> {
        match self {
            LayerElement::Chord(e) => Some(&mut e.children),
            LayerElement::Beam(e) => Some(&mut e.children),
            LayerElement::Tuplet(e) => Some(&mut e.children),
            LayerElement::BowedTremolo(e) => Some(&mut e.children),
            LayerElement::FingeredTremolo(e) => Some(&mut e.children),
            _ => None,
        }
    }

    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            LayerElement::Chord(_) => Some(ContainerKind::Chord),
            LayerElement::Beam(_) => Some(ContainerKind::Beam),
            LayerElement::Tuplet(_) => Some(ContainerKind::Tuplet),
            LayerElement::BowedTremolo(_) => Some(ContainerKind::BowedTremolo),
            LayerElement::FingeredTremolo(_) => Some(ContainerKind::FingeredTremolo),
            _ => None,
        }
    }

    /// Depth-first walk over this element and everything it contains.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a LayerElement)) {
        visit(self);
        if let Some(children) = self.children() {
            for child in children {
                child.walk(visit);
            }
        }
    }
}

/// The grouping containers that the nesting stack tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Chord,
    Beam,
    Tuplet,
    BowedTremolo,
    FingeredTremolo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub pname: Option<PitchName>,
    /// Written octave (after any active octave shift)
    pub oct: Option<i32>,
    /// Octave as encoded, kept only when an octave shift changed `oct`
    pub oct_ges: Option<i32>,
    pub accid: Option<Accid>,
    /// Duration, dots, stem and size are left unset on notes inside a chord
    pub dur: Option<Duration>,
    pub dots: u8,
    pub stem_dir: Option<StemDirection>,
    pub stem_mod: Option<StemModifier>,
    pub cue: bool,
    pub grace: Option<Grace>,
    pub visible: Option<bool>,
    pub color: Option<String>,
    pub verses: Vec<Verse>,
    pub artics: Vec<Artic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chord {
    pub id: String,
    pub dur: Option<Duration>,
    pub dots: u8,
    pub stem_dir: Option<StemDirection>,
    pub stem_mod: Option<StemModifier>,
    pub cue: bool,
    pub artics: Vec<Artic>,
    pub children: Vec<LayerElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rest {
    pub id: String,
    pub dur: Option<Duration>,
    pub dots: u8,
    pub cue: bool,
    /// Displayed position
    pub ploc: Option<PitchName>,
    pub oloc: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasureRest {
    pub id: String,
    pub visible: Option<bool>,
    pub cue: bool,
    pub ploc: Option<PitchName>,
    pub oloc: Option<i32>,
}

/// Invisible filler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub dur: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClefChange {
    pub id: String,
    pub shape: Option<ClefShape>,
    pub line: Option<u8>,
    pub dis: Option<OctaveDis>,
    pub dis_place: Option<Place>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasureRepeat {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Beam {
    pub id: String,
    pub children: Vec<LayerElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tuplet {
    pub id: String,
    pub num: Option<u32>,
    pub numbase: Option<u32>,
    pub num_place: Option<Place>,
    pub bracket_place: Option<Place>,
    pub num_format: Option<TupletNumFormat>,
    pub num_visible: Option<bool>,
    pub bracket_visible: Option<bool>,
    pub children: Vec<LayerElement>,
}

/// Single-note tremolo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BowedTremolo {
    pub id: String,
    pub children: Vec<LayerElement>,
}

/// Two-note tremolo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingeredTremolo {
    pub id: String,
    pub slash: Option<u8>,
    pub children: Vec<LayerElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Accid {
    pub accid: Option<AccidentalExplicit>,
    pub accid_ges: Option<AccidentalImplicit>,
    pub func: Option<AccidFunc>,
    pub enclose: Option<Enclosure>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    pub n: u32,
    pub color: Option<String>,
    pub syls: Vec<Syl>,
}

/// One lyric syllable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Syl {
    pub text: String,
    pub con: Option<SylConnector>,
    pub wordpos: Option<WordPosition>,
    pub lang: Option<String>,
    pub font_style: Option<String>,
    pub font_weight: Option<String>,
}

/// A group of articulation marks; technical marks are tagged separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artic {
    pub artic: Vec<Articulation>,
    pub technical: bool,
}

// ─── Control elements ────────────────────────────────────────────────

/// A floating annotation that points at notes through `#id` references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlElement {
    pub id: String,
    pub start_id: Option<String>,
    pub end_id: Option<String>,
    /// Global staff numbers the annotation belongs to
    pub staff: Vec<u32>,
    /// Beat position, used when there is no start reference
    pub tstamp: Option<f64>,
    pub place: Option<Place>,
    pub color: Option<String>,
    pub kind: ControlKind,
}

impl ControlElement {
    pub fn new(id: String, kind: ControlKind) -> Self {
        Self {
            id,
            start_id: None,
            end_id: None,
            staff: Vec::new(),
            tstamp: None,
            place: None,
            color: None,
            kind,
        }
    }

    /// Short element name, used in log messages.
    pub fn name(&self) -> &'static str {
        match self.kind {
            ControlKind::Tie { .. } => "tie",
            ControlKind::Slur { .. } => "slur",
            ControlKind::Hairpin { .. } => "hairpin",
            ControlKind::Dir { .. } => "dir",
            ControlKind::Dynam { .. } => "dynam",
            ControlKind::Harm { .. } => "harm",
            ControlKind::Tempo { .. } => "tempo",
            ControlKind::Pedal { .. } => "pedal",
            ControlKind::Fermata { .. } => "fermata",
            ControlKind::Mordent { .. } => "mordent",
            ControlKind::Trill => "trill",
            ControlKind::Turn { .. } => "turn",
            ControlKind::Octave { .. } => "octave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlKind {
    Tie {
        curve_dir: Option<CurveDir>,
    },
    Slur {
        curve_dir: Option<CurveDir>,
    },
    Hairpin {
        form: Option<HairpinForm>,
    },
    Dir {
        lang: Option<String>,
        text: Vec<TextRun>,
    },
    Dynam {
        text: String,
    },
    Harm {
        text: String,
        harm_type: Option<String>,
    },
    Tempo {
        lang: Option<String>,
        text: Vec<TextRun>,
        mm: Option<String>,
        mm_unit: Option<Duration>,
        mm_dots: Option<u8>,
        midi_bpm: Option<i32>,
    },
    Pedal {
        dir: Option<PedalDir>,
    },
    Fermata {
        shape: Option<FermataShape>,
        form: Option<FermataForm>,
    },
    Mordent {
        form: MordentForm,
        long: Option<bool>,
    },
    Trill,
    Turn {
        form: TurnForm,
    },
    Octave {
        dis: Option<OctaveDis>,
        dis_place: Option<Place>,
    },
}

/// A run of text, optionally wrapped in a rendition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub rend: Option<Rend>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rend {
    pub halign: Option<String>,
    pub color: Option<String>,
    pub font_family: Option<String>,
    pub font_style: Option<String>,
    pub font_weight: Option<String>,
    pub lang: Option<String>,
}

// ─── Vocabulary ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duration {
    Maxima,
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    D16,
    D32,
    D64,
    D128,
    D256,
}

impl Duration {
    /// Length in quarter notes, or `None` for the mensural values.
    pub fn quarters(self) -> Option<f64> {
        let q = match self {
            Duration::Maxima | Duration::Long => return None,
            Duration::Breve => 8.0,
            Duration::Whole => 4.0,
            Duration::Half => 2.0,
            Duration::Quarter => 1.0,
            Duration::Eighth => 0.5,
            Duration::D16 => 0.25,
            Duration::D32 => 0.125,
            Duration::D64 => 0.0625,
            Duration::D128 => 0.03125,
            Duration::D256 => 0.015625,
        };
        Some(q)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccidentalExplicit {
    Sharp,
    Natural,
    Flat,
    DoubleSharp,
    SharpSharp,
    FlatFlat,
    NaturalSharp,
    NaturalFlat,
    QuarterFlat,
    QuarterSharp,
    ThreeQuartersFlat,
    ThreeQuartersSharp,
}

/// Accidental implied by a numeric alteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccidentalImplicit {
    DoubleFlat,
    FlatDown,
    Flat,
    FlatUp,
    Natural,
    SharpDown,
    Sharp,
    SharpUp,
    DoubleSharp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccidFunc {
    Caution,
    Editorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Enclosure {
    Bracket,
    Paren,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemDirection {
    Up,
    Down,
}

/// Slashes through the stem (tremolo strokes, grace slash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemModifier(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grace {
    /// `<grace>` without a slash attribute
    Unknown,
    /// `slash="no"`
    Accented,
    /// `slash="yes"`
    Unaccented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SylConnector {
    /// Extender line (`<extend>`)
    Underscore,
    /// Elision bridge (`<elision>`)
    Bridge,
    /// Hyphen to the next syllable
    Dash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordPosition {
    Initial,
    Medial,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Articulation {
    Accent,
    TenutoStaccato,
    Spiccato,
    Staccatissimo,
    Staccato,
    Marcato,
    Tenuto,
    DownBow,
    Harmonic,
    OpenString,
    SnapPizzicato,
    Stopped,
    UpBow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClefShape {
    G,
    GG,
    F,
    C,
    Perc,
    Tab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OctaveDis {
    Eight,
    Fifteen,
    TwentyTwo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Place {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeySignature {
    /// Positive for sharps, negative for flats
    Fifths(i8),
    /// Non-traditional key given by explicit steps
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterSymbol {
    Common,
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterRendition {
    Normal,
    Numerator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotationType {
    Tablature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarRendition {
    Dashed,
    Dotted,
    Double,
    End,
    Invisible,
    RepeatStart,
    RepeatEnd,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveDir {
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairpinForm {
    Crescendo,
    Diminuendo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PedalDir {
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FermataShape {
    Curved,
    Angular,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FermataForm {
    Normal,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MordentForm {
    Normal,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnForm {
    Normal,
    Inverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TupletNumFormat {
    Count,
    Ratio,
}

impl Score {
    /// Create a new empty score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of measures in the section.
    pub fn measure_count(&self) -> usize {
        self.section.measures.len()
    }

    /// Find the first measure carrying number `n`.
    pub fn measure(&self, n: i32) -> Option<&Measure> {
        self.section.measures.iter().find(|m| m.n == n)
    }

    /// All control elements, in measure order.
    pub fn control_elements(&self) -> impl Iterator<Item = &ControlElement> {
        self.section
            .measures
            .iter()
            .flat_map(|m| m.control_elements.iter())
    }
}
