//! Interchange (ISA/IEA), functional group (GS/GE) and transaction set
//! (ST/SE) envelopes.
//!
//! Parsing checks every trailer against its header: control numbers must
//! repeat and declared counts must match what was actually received.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::EdiError;
use super::segment::{Delimiters, Segment, split_segments};

/// X12 version written into GS08 and ISA12.
pub const GS_VERSION: &str = "004010";
pub const ISA_VERSION: &str = "00401";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageIndicator {
    #[default]
    Production,
    Test,
}

impl UsageIndicator {
    fn code(&self) -> &'static str {
        match self {
            UsageIndicator::Production => "P",
            UsageIndicator::Test => "T",
        }
    }

    fn from_code(code: &str) -> Self {
        if code == "T" {
            UsageIndicator::Test
        } else {
            UsageIndicator::Production
        }
    }
}

/// A parsed interchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interchange {
    pub delimiters: Delimiters,
    pub sender_id: String,
    pub receiver_id: String,
    pub control_number: String,
    pub usage: UsageIndicator,
    pub groups: Vec<FunctionalGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionalGroup {
    pub functional_id: String,
    pub sender_code: String,
    pub receiver_code: String,
    pub control_number: String,
    pub transactions: Vec<TransactionSet>,
}

/// A transaction set body: the segments strictly between ST and SE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSet {
    pub code: String,
    pub control_number: String,
    pub segments: Vec<Segment>,
}

/// Everything needed to wrap transaction sets into an interchange.
#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub sender_id: String,
    pub receiver_id: String,
    pub interchange_control_number: u32,
    pub group_control_number: u32,
    pub timestamp: NaiveDateTime,
    pub usage: UsageIndicator,
}

/// Parse and validate a complete interchange.
pub fn parse_interchange(input: &str) -> Result<Interchange, EdiError> {
    let input = input.trim_start();
    let delimiters = Delimiters::detect(input)?;
    let segments = split_segments(input, &delimiters)?;
    let mut iter = segments.into_iter();

    let isa = iter.next().ok_or(EdiError::MissingIsa)?;
    if isa.id != "ISA" {
        return Err(EdiError::MissingIsa);
    }
    let sender_id = isa.required(6)?.to_string();
    let receiver_id = isa.required(8)?.to_string();
    let control_number = isa.required(13)?.to_string();
    let usage = UsageIndicator::from_code(isa.element(15).unwrap_or("P"));

    let mut groups = Vec::new();
    let mut current_group: Option<FunctionalGroup> = None;
    let mut current_set: Option<(TransactionSet, usize)> = None;
    let mut closed = false;

    for segment in iter {
        if closed {
            return Err(EdiError::UnexpectedSegment {
                expected: "end of interchange",
                found: segment.id,
            });
        }

        // Inside a transaction set everything up to SE belongs to it
        if let Some((set, count)) = current_set.as_mut() {
            *count += 1;
            if segment.id != "SE" {
                if matches!(segment.id.as_str(), "ST" | "GS" | "GE" | "IEA" | "ISA") {
                    return Err(EdiError::Unterminated("ST"));
                }
                set.segments.push(segment);
                continue;
            }

            let declared = segment.required(1)?;
            if declared.parse::<usize>().ok() != Some(*count) {
                return Err(EdiError::CountMismatch {
                    trailer: "SE",
                    declared: declared.to_string(),
                    actual: *count,
                });
            }
            let found = segment.required(2)?;
            if found != set.control_number {
                return Err(EdiError::ControlNumberMismatch {
                    trailer: "SE",
                    expected: set.control_number.clone(),
                    found: found.to_string(),
                });
            }

            let (set, _) = current_set.take().ok_or(EdiError::Unterminated("ST"))?;
            let group = current_group
                .as_mut()
                .ok_or(EdiError::Unterminated("GS"))?;
            group.transactions.push(set);
            continue;
        }

        match segment.id.as_str() {
            "GS" if current_group.is_none() => {
                current_group = Some(FunctionalGroup {
                    functional_id: segment.required(1)?.to_string(),
                    sender_code: segment.required(2)?.to_string(),
                    receiver_code: segment.required(3)?.to_string(),
                    control_number: segment.required(6)?.to_string(),
                    transactions: Vec::new(),
                });
            }
            "ST" if current_group.is_some() => {
                current_set = Some((
                    TransactionSet {
                        code: segment.required(1)?.to_string(),
                        control_number: segment.required(2)?.to_string(),
                        segments: Vec::new(),
                    },
                    1,
                ));
            }
            "GE" if current_group.is_some() => {
                let group = current_group.take().ok_or(EdiError::Unterminated("GS"))?;
                check_count("GE", segment.required(1)?, group.transactions.len())?;
                check_control("GE", &group.control_number, segment.required(2)?)?;
                groups.push(group);
            }
            "IEA" if current_group.is_none() => {
                check_count("IEA", segment.required(1)?, groups.len())?;
                check_control("IEA", &control_number, segment.required(2)?)?;
                closed = true;
            }
            _ => {
                return Err(EdiError::UnexpectedSegment {
                    expected: if current_group.is_some() {
                        "ST or GE"
                    } else {
                        "GS or IEA"
                    },
                    found: segment.id,
                });
            }
        }
    }

    if current_set.is_some() {
        return Err(EdiError::Unterminated("ST"));
    }
    if current_group.is_some() {
        return Err(EdiError::Unterminated("GS"));
    }
    if !closed {
        return Err(EdiError::Unterminated("ISA"));
    }

    Ok(Interchange {
        delimiters,
        sender_id,
        receiver_id,
        control_number,
        usage,
        groups,
    })
}

fn check_count(trailer: &'static str, declared: &str, actual: usize) -> Result<(), EdiError> {
    if declared.parse::<usize>().ok() == Some(actual) {
        Ok(())
    } else {
        Err(EdiError::CountMismatch {
            trailer,
            declared: declared.to_string(),
            actual,
        })
    }
}

fn check_control(trailer: &'static str, expected: &str, found: &str) -> Result<(), EdiError> {
    // Control numbers are numeric; "0001" and "1" name the same group
    let same = match (expected.parse::<u64>(), found.parse::<u64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => expected == found,
    };
    if same {
        Ok(())
    } else {
        Err(EdiError::ControlNumberMismatch {
            trailer,
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

/// Write one functional group holding the given transaction sets.
///
/// Each entry is `(transaction set code, body segments)`; ST/SE are added
/// with set control numbers 0001, 0002, ...
pub fn write_interchange(
    params: &EnvelopeParams,
    functional_id: &str,
    sets: &[(&str, Vec<Segment>)],
) -> Result<String, EdiError> {
    let d = Delimiters::default();
    let mut out = String::new();
    let mut push = |segment: Segment| -> Result<(), EdiError> {
        out.push_str(&segment.write(&d)?);
        out.push(d.segment);
        out.push('\n');
        Ok(())
    };

    let date = params.timestamp.date();
    let time = params.timestamp.time();
    let interchange_control = format!("{:09}", params.interchange_control_number);
    let group_control = params.group_control_number.to_string();

    push(Segment::new(
        "ISA",
        [
            "00".to_string(),
            " ".repeat(10),
            "00".to_string(),
            " ".repeat(10),
            "ZZ".to_string(),
            pad(&params.sender_id, 6)?,
            "ZZ".to_string(),
            pad(&params.receiver_id, 8)?,
            date.format("%y%m%d").to_string(),
            time.format("%H%M").to_string(),
            "U".to_string(),
            ISA_VERSION.to_string(),
            interchange_control.clone(),
            "0".to_string(),
            params.usage.code().to_string(),
            d.component.to_string(),
        ],
    ))?;

    push(Segment::new(
        "GS",
        [
            functional_id.to_string(),
            params.sender_id.clone(),
            params.receiver_id.clone(),
            date.format("%Y%m%d").to_string(),
            time.format("%H%M").to_string(),
            group_control.clone(),
            "X".to_string(),
            GS_VERSION.to_string(),
        ],
    ))?;

    for (index, (code, body)) in sets.iter().enumerate() {
        let set_control = format!("{:04}", index + 1);
        push(Segment::new("ST", [code.to_string(), set_control.clone()]))?;
        for segment in body {
            push(segment.clone())?;
        }
        push(Segment::new(
            "SE",
            [(body.len() + 2).to_string(), set_control],
        ))?;
    }

    push(Segment::new(
        "GE",
        [sets.len().to_string(), group_control],
    ))?;
    push(Segment::new("IEA", ["1".to_string(), interchange_control]))?;

    Ok(out)
}

const ISA_ID_WIDTH: usize = 15;

/// Space-pad an interchange id for ISA element `position`.
fn pad(id: &str, position: usize) -> Result<String, EdiError> {
    if id.is_empty() || id.chars().count() > ISA_ID_WIDTH {
        return Err(EdiError::MissingElement {
            segment: "ISA".to_string(),
            position,
        });
    }
    Ok(format!("{:<width$}", id, width = ISA_ID_WIDTH))
}

/// Parse `CCYYMMDD`.
pub fn parse_date(value: &str) -> Result<NaiveDate, EdiError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| EdiError::InvalidDate(value.into()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
