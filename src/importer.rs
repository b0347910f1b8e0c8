//! Score building: part list, staff groups, per-part measure translation,
//! measure merging and the final attachment of control elements.

use std::path::Path;

use roxmltree::{Document, Node};

use crate::attributes::read_part_attributes;
use crate::context::{ImportContext, ImportOptions};
use crate::diagnostics::{Warning, WarningKind};
use crate::error::ImportError;
use crate::lookup;
use crate::measure::read_measure;
use crate::model::*;
use crate::xml;

/// A converted score with the warnings raised while building it.
#[derive(Debug, Clone)]
pub struct Import {
    pub score: Score,
    pub warnings: Vec<Warning>,
}

/// Parse a MusicXML string and build a [`Score`].
pub fn convert(content: &str, options: ImportOptions) -> Result<Import, ImportError> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let parsing = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(content, parsing)?;
    let root = doc.root_element();
    if root.tag_name().name() != "score-partwise" {
        return Err(ImportError::UnsupportedRoot(root.tag_name().name().to_string()));
    }

    let mut ctx = ImportContext::new(options);
    let score = read_score(&root, &mut ctx);
    Ok(Import {
        score,
        warnings: ctx.diag.into_warnings(),
    })
}

fn read_score(root: &Node, ctx: &mut ImportContext) -> Score {
    let mut score = Score::new();
    score.title = read_title(root);
    score.midi_bpm = xml::child(*root, "part")
        .and_then(|part| xml::child(part, "measure"))
        .and_then(|measure| xml::children(measure, "sound").find(|s| s.has_attribute("tempo")))
        .map(|sound| xml::leading_int(xml::attr(sound, "tempo")));

    if let Some(part_list) = xml::child(*root, "part-list") {
        read_part_list(&part_list, root, &mut score, ctx);
    }
    attach_control_elements(&mut score, ctx);

    log::debug!(
        "imported {} staves in {} measures",
        score.staff_grp.staff_defs().len(),
        score.measure_count()
    );
    score
}

/// `movement-title`, else `work/work-title`.
fn read_title(root: &Node) -> Option<String> {
    let movement = xml::child_text(*root, "movement-title");
    let title = if movement.is_empty() {
        xml::path(*root, &["work", "work-title"]).map(xml::text).unwrap_or("")
    } else {
        movement
    };
    (!title.is_empty()).then(|| title.to_string())
}

// ─── Part list ───────────────────────────────────────────────────────

/// Walk the part list in order. Part groups nest through a stack whose
/// bottom is the score's root group; each part is read as soon as its
/// `score-part` is met, so staff numbers follow part-list order.
fn read_part_list(part_list: &Node, root: &Node, score: &mut Score, ctx: &mut ImportContext) {
    let mut groups: Vec<StaffGroup> = vec![StaffGroup::default()];
    let mut staff_offset = 0u32;

    for child in part_list.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "part-group" => match xml::attr(child, "type") {
                "start" => groups.push(StaffGroup {
                    symbol: lookup::group_symbol_value(xml::child_text(child, "group-symbol")),
                    ..Default::default()
                }),
                "stop" => {
                    if groups.len() > 1 {
                        close_group(&mut groups);
                    } else {
                        ctx.diag.warn(
                            WarningKind::Structure,
                            "Part group stop without a matching start",
                        );
                    }
                }
                _ => {}
            },
            "score-part" => {
                if let Some(top) = groups.last_mut() {
                    staff_offset += read_score_part(&child, root, staff_offset, top, score, ctx);
                }
            }
            _ => {}
        }
    }

    if groups.len() > 1 {
        ctx.diag.warn(
            WarningKind::Structure,
            format!("{} part group(s) are never closed", groups.len() - 1),
        );
        while groups.len() > 1 {
            close_group(&mut groups);
        }
    }
    if let Some(root_group) = groups.pop() {
        score.staff_grp = root_group;
    }
}

/// Pop the innermost group into its parent.
fn close_group(groups: &mut Vec<StaffGroup>) {
    if let Some(group) = groups.pop() {
        if let Some(parent) = groups.last_mut() {
            parent.children.push(StaffGroupChild::Group(group));
        }
    }
}

/// Read the staff definitions and measures of one part. Returns the number
/// of staves it occupies, 0 when it was skipped.
fn read_score_part(
    score_part: &Node,
    root: &Node,
    staff_offset: u32,
    parent: &mut StaffGroup,
    score: &mut Score,
    ctx: &mut ImportContext,
) -> u32 {
    let id = xml::attr(*score_part, "id");
    let Some(part) = xml::children(*root, "part").find(|p| xml::attr(*p, "id") == id) else {
        ctx.diag.warn(WarningKind::Missing, format!("Could not find the part '{id}'"));
        return 0;
    };
    let first_measure = xml::child(part, "measure");
    let Some(first_measure) = first_measure.filter(|m| xml::has_child(*m, "attributes")) else {
        ctx.diag.warn(
            WarningKind::Missing,
            format!("Could not find the 'attributes' element in the first measure of part '{id}'"),
        );
        return 0;
    };

    let defs = read_part_attributes(&first_measure, staff_offset, ctx);
    let nb_staves = defs.len();
    let name = non_empty(xml::child_text(*score_part, "part-name"));
    let abbr = non_empty(xml::child_text(*score_part, "part-abbreviation"));
    log::debug!("part '{id}': {nb_staves} staves from staff {}", staff_offset + 1);

    if nb_staves > 1 {
        parent.children.push(StaffGroupChild::Group(StaffGroup {
            symbol: Some(GroupSymbol::Brace),
            label: name,
            label_abbr: abbr,
            bar_thru: true,
            children: defs.into_iter().map(StaffGroupChild::StaffDef).collect(),
        }));
    } else if let Some(mut def) = defs.into_iter().next() {
        def.label = name;
        def.label_abbr = abbr;
        parent.children.push(StaffGroupChild::StaffDef(def));
    }

    read_part(&part, nb_staves, staff_offset, &mut score.section, ctx);
    nb_staves as u32
}

// ─── Measures ────────────────────────────────────────────────────────

fn read_part(part: &Node, nb_staves: usize, staff_offset: u32, section: &mut Section, ctx: &mut ImportContext) {
    let measures: Vec<Node> = xml::children(*part, "measure").collect();
    if measures.is_empty() {
        ctx.diag.warn(WarningKind::Missing, "No measure to load");
        return;
    }

    ctx.measure_repeat = false;
    for (index, node) in measures.iter().enumerate() {
        let measure = read_measure(node, nb_staves, staff_offset, ctx);
        add_measure(section, measure, index, ctx);
    }
    ctx.diag.set_measure(None);
}

/// Store the measure read at `index` of its part: a new index extends the
/// section, an existing one receives the measure's staves.
pub fn add_measure(section: &mut Section, mut measure: Measure, index: usize, ctx: &mut ImportContext) {
    let count = section.measures.len();
    if index == count {
        section.measures.push(measure);
    } else if index < count {
        section.measures[index].staves.append(&mut measure.staves);
    } else {
        ctx.diag.warn(
            WarningKind::Structure,
            "measures should be added in the right order",
        );
    }
}

/// Move every control element into the measure numbered as the one it was
/// read in, looking the measure up again only when that number changes.
fn attach_control_elements(score: &mut Score, ctx: &mut ImportContext) {
    ctx.diag.set_measure(None);
    let resolver = std::mem::take(&mut ctx.resolver);
    log::debug!(
        "{} ties, {} slurs and {} hairpins left open",
        resolver.open_ties().len(),
        resolver.open_slurs().len(),
        resolver.open_hairpins().len()
    );

    let measures = &mut score.section.measures;
    let mut current: Option<usize> = None;
    for (measure_n, element) in resolver.into_elements() {
        if current.map_or(true, |idx| measures[idx].n != measure_n) {
            current = measures.iter().position(|m| m.n == measure_n);
        }
        match current {
            Some(idx) => measures[idx].control_elements.push(element),
            None => ctx.diag.warn(
                WarningKind::Missing,
                format!(
                    "Element '{}' could not be added to measure '{measure_n}'",
                    element.name()
                ),
            ),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

// ─── Destination documents ───────────────────────────────────────────

/// The document an import fills in, typically owned by a layout engine.
pub trait ScoreDocument {
    /// Take ownership of a converted score.
    fn install_score(&mut self, score: Score);

    /// Split the flat section into pages; called once per successful import.
    fn convert_to_page_based(&mut self);
}

/// A [`ScoreDocument`] that only keeps the score.
#[derive(Debug, Default)]
pub struct FlatDocument {
    pub score: Option<Score>,
    /// Number of `convert_to_page_based` calls received
    pub page_conversions: usize,
}

impl ScoreDocument for FlatDocument {
    fn install_score(&mut self, score: Score) {
        self.score = Some(score);
    }

    fn convert_to_page_based(&mut self) {
        self.page_conversions += 1;
    }
}

/// Import into a caller-supplied document, reporting success as a flag.
///
/// On failure the document is left untouched and the error is logged.
pub struct MusicXmlInput<'a, D: ScoreDocument> {
    doc: &'a mut D,
    options: ImportOptions,
    warnings: Vec<Warning>,
}

impl<'a, D: ScoreDocument> MusicXmlInput<'a, D> {
    pub fn new(doc: &'a mut D) -> Self {
        Self::with_options(doc, ImportOptions::default())
    }

    pub fn with_options(doc: &'a mut D, options: ImportOptions) -> Self {
        Self {
            doc,
            options,
            warnings: Vec::new(),
        }
    }

    /// Import a `.musicxml`, `.xml` or `.mxl` file.
    pub fn import_file<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let result = crate::import_file_with_options(path, self.options.clone());
        self.install(result)
    }

    pub fn import_string(&mut self, content: &str) -> bool {
        let result = convert(content, self.options.clone());
        self.install(result)
    }

    /// Warnings of the last successful import.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    fn install(&mut self, result: Result<Import, ImportError>) -> bool {
        match result {
            Ok(import) => {
                self.warnings = import.warnings;
                self.doc.install_score(import.score);
                self.doc.convert_to_page_based();
                true
            }
            Err(e) => {
                log::error!("MusicXML import failed: {e}");
                false
            }
        }
    }
}
