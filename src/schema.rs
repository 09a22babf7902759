use lazy_static::lazy_static;
use serde::Serialize;
use std::fmt;

use crate::payload::Payload;

/// Sheet holding one tracking record per scanned box.
pub const TRACKING_SHEET: &str = "getdata";

/// Sheet holding the reference lists used to fill the UI dropdowns.
pub const REFERENCE_SHEET: &str = "Data base";

/// Number of positional columns (A..Y) in a tracking record.
pub const RECORD_WIDTH: usize = 25;

/// Full width of a tracking record, `A:Y`.
pub const RECORD_SPAN: ColumnSpan = ColumnSpan::new(0, RECORD_WIDTH as u16 - 1);

/// A zero-based column index (`A` is 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column(pub u16);

impl Column {
    /// Parse spreadsheet column letters (`A`, `Z`, `AA`, ...).
    pub fn from_letters(letters: &str) -> Option<Self> {
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let one_based = letters
            .chars()
            .try_fold(0u16, |acc, c| {
                acc.checked_mul(26)?.checked_add(c as u16 - 'A' as u16 + 1)
            })?;
        Some(Column(one_based - 1))
    }

    /// Column letters for this index (0 -> `A`, 26 -> `AA`).
    pub fn letters(self) -> String {
        let mut col = self.0 as u32 + 1;
        let mut result = String::new();
        while col > 0 {
            col -= 1;
            result.push(((col % 26) as u8 + b'A') as char);
            col /= 26;
        }
        result.chars().rev().collect()
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An inclusive run of columns, e.g. `L:M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSpan {
    pub first: Column,
    pub last: Column,
}

impl ColumnSpan {
    pub const fn new(first: u16, last: u16) -> Self {
        ColumnSpan {
            first: Column(first),
            last: Column(last),
        }
    }

    pub fn width(&self) -> usize {
        self.last.index() - self.first.index() + 1
    }

    /// A1 notation of the span on a sheet, e.g. `'getdata'!A:Y`.
    pub fn on_sheet(&self, sheet: &str) -> String {
        format!("'{}'!{}", sheet, self)
    }
}

impl fmt::Display for ColumnSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first.letters(), self.last.letters())
    }
}

/// A single-row cell range on a named sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub sheet: String,
    pub span: ColumnSpan,
    /// 1-based sheet row.
    pub row: usize,
}

impl CellRange {
    /// The cell part of the address, `L4:M4`, or `E4` for one column.
    pub fn cells(&self) -> String {
        if self.span.first == self.span.last {
            format!("{}{}", self.span.first.letters(), self.row)
        } else {
            format!(
                "{}{}:{}{}",
                self.span.first.letters(),
                self.row,
                self.span.last.letters(),
                self.row
            )
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'!{}", self.sheet, self.cells())
    }
}

/// The production stages an operator can record against a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    ProductionDetails,
    OrderId,
    MovedToAssembly,
    Accessory,
    Assembly,
    Qc,
    Rework,
    FinalQc,
    Packing,
    ScreenPrintFlamming,
}

impl Operation {
    /// Every operation, in the order the UI offers them.
    pub const ALL: [Operation; 10] = [
        Operation::ProductionDetails,
        Operation::OrderId,
        Operation::MovedToAssembly,
        Operation::Accessory,
        Operation::Assembly,
        Operation::Qc,
        Operation::Rework,
        Operation::FinalQc,
        Operation::Packing,
        Operation::ScreenPrintFlamming,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::ProductionDetails => "Production Details",
            Operation::OrderId => "Order ID",
            Operation::MovedToAssembly => "Moved to Assembly",
            Operation::Accessory => "Accessory",
            Operation::Assembly => "Assembly",
            Operation::Qc => "QC",
            Operation::Rework => "Rework",
            Operation::FinalQc => "Final QC",
            Operation::Packing => "Packing",
            Operation::ScreenPrintFlamming => "Screen Print and Flamming",
        }
    }

    /// Exact, case-sensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Staged operations are recorded twice, once at start and once at end.
    pub fn is_staged(self) -> bool {
        matches!(
            self,
            Operation::Accessory
                | Operation::Assembly
                | Operation::Qc
                | Operation::Rework
                | Operation::FinalQc
        )
    }

    /// Descriptor for this operation at `stage`.
    ///
    /// Staged operations only resolve with a stage and flat operations only
    /// without one.
    pub fn descriptor(self, stage: Option<Stage>) -> Option<&'static Descriptor> {
        SCHEMA
            .iter()
            .find(|d| d.operation == self && d.stage == stage)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    End,
}

impl Stage {
    /// Case-insensitive parse of `start` / `end`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "start" => Some(Stage::Start),
            "end" => Some(Stage::End),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::End => "end",
        }
    }
}

/// How a payload value becomes a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Written as submitted.
    Text,
    /// Written as `"Yes"` when the submitted value is truthy, else `"No"`.
    YesNo,
}

/// When a field must be present in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Always,
    /// Required only while another text field holds exactly `equals`.
    When {
        field: &'static str,
        equals: &'static str,
    },
}

impl Requirement {
    pub fn is_active(&self, payload: &Payload) -> bool {
        match self {
            Requirement::Always => true,
            Requirement::When { field, equals } => payload.text(field) == Some(*equals),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub requirement: Requirement,
}

impl FieldSpec {
    const fn text(key: &'static str) -> Self {
        FieldSpec {
            key,
            kind: FieldKind::Text,
            requirement: Requirement::Always,
        }
    }

    const fn yes_no(key: &'static str) -> Self {
        FieldSpec {
            key,
            kind: FieldKind::YesNo,
            requirement: Requirement::Always,
        }
    }

    const fn required_when(self, field: &'static str, equals: &'static str) -> Self {
        FieldSpec {
            requirement: Requirement::When { field, equals },
            ..self
        }
    }

    /// Cell text for this field.
    pub fn cell_value(&self, payload: &Payload) -> String {
        match self.kind {
            FieldKind::Text => payload
                .get(self.key)
                .map(|value| value.to_cell())
                .unwrap_or_default(),
            FieldKind::YesNo => {
                if payload.is_truthy(self.key) {
                    "Yes".to_string()
                } else {
                    "No".to_string()
                }
            }
        }
    }
}

/// Everything needed to validate and store one operation at one stage.
#[derive(Debug)]
pub struct Descriptor {
    pub operation: Operation,
    pub stage: Option<Stage>,
    pub span: ColumnSpan,
    pub fields: Vec<FieldSpec>,
}

impl Descriptor {
    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.key).collect()
    }

    /// Address of this operation's cells on the tracking sheet at `row` (1-based).
    pub fn target_range(&self, row: usize) -> CellRange {
        CellRange {
            sheet: TRACKING_SHEET.to_string(),
            span: self.span,
            row,
        }
    }

    /// Cell values in the column order of [`Descriptor::target_range`].
    pub fn values_from_payload(&self, payload: &Payload) -> Vec<String> {
        self.fields.iter().map(|f| f.cell_value(payload)).collect()
    }
}

fn entry(
    operation: Operation,
    stage: Option<Stage>,
    first: &str,
    last: &str,
    fields: &[FieldSpec],
) -> Descriptor {
    let (Some(first), Some(last)) = (Column::from_letters(first), Column::from_letters(last))
    else {
        panic!("bad column letters in schema entry for {}", operation);
    };
    let span = ColumnSpan { first, last };
    assert!(
        last.index() < RECORD_WIDTH,
        "{} writes past column {}",
        operation,
        RECORD_SPAN.last.letters()
    );
    assert_eq!(
        span.width(),
        fields.len(),
        "{} ({:?}) spans {} columns but extracts {} values",
        operation,
        stage,
        span,
        fields.len()
    );
    Descriptor {
        operation,
        stage,
        span,
        fields: fields.to_vec(),
    }
}

fn build_schema() -> Vec<Descriptor> {
    use Operation::*;
    use Stage::*;

    vec![
        entry(
            ProductionDetails,
            None,
            "B",
            "D",
            &[
                FieldSpec::text("operator"),
                FieldSpec::text("boxType"),
                FieldSpec::text("productionDateTime"),
            ],
        ),
        entry(MovedToAssembly, None, "E", "E", &[FieldSpec::yes_no("movedToAssembly")]),
        entry(OrderId, None, "F", "F", &[FieldSpec::text("orderId")]),
        entry(Accessory, Some(Start), "G", "G", &[FieldSpec::text("accessoryStart")]),
        entry(Accessory, Some(End), "H", "H", &[FieldSpec::text("accessoryEnd")]),
        entry(
            Assembly,
            Some(Start),
            "I",
            "J",
            &[FieldSpec::text("assemblyWorker"), FieldSpec::text("assemblyStart")],
        ),
        entry(Assembly, Some(End), "K", "K", &[FieldSpec::text("assemblyEnd")]),
        entry(
            Qc,
            Some(Start),
            "L",
            "M",
            &[FieldSpec::text("qcInspector"), FieldSpec::text("qcStart")],
        ),
        entry(
            Qc,
            Some(End),
            "N",
            "P",
            &[
                FieldSpec::text("qcEnd"),
                FieldSpec::text("qcResult"),
                FieldSpec::text("rework").required_when("qcResult", "Rework"),
            ],
        ),
        entry(
            Rework,
            Some(Start),
            "Q",
            "R",
            &[FieldSpec::text("reworkerName"), FieldSpec::text("reworkStart")],
        ),
        entry(Rework, Some(End), "S", "S", &[FieldSpec::text("reworkEnd")]),
        entry(
            FinalQc,
            Some(Start),
            "T",
            "U",
            &[FieldSpec::text("finalQcInspector"), FieldSpec::text("finalQcStart")],
        ),
        entry(
            FinalQc,
            Some(End),
            "V",
            "W",
            &[FieldSpec::text("finalQcEnd"), FieldSpec::text("finalQcResult")],
        ),
        entry(
            ScreenPrintFlamming,
            None,
            "X",
            "X",
            &[FieldSpec::yes_no("screenPrintFlamming")],
        ),
        entry(Packing, None, "Y", "Y", &[FieldSpec::text("packing")]),
    ]
}

lazy_static! {
    static ref SCHEMA: Vec<Descriptor> = build_schema();
}

/// All descriptors, forcing the table to be built and checked.
pub fn descriptors() -> &'static [Descriptor] {
    &SCHEMA
}
