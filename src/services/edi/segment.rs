//! X12 delimiters and segments.

use std::sync::LazyLock;

use regex::Regex;

use super::EdiError;

static SEGMENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]{1,2}$").expect("segment id pattern is valid"));

/// Separator characters announced by the ISA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub element: char,
    pub component: char,
    pub segment: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            element: '*',
            component: '>',
            segment: '~',
        }
    }
}

impl Delimiters {
    /// Read the delimiters from the start of an interchange.
    ///
    /// The element separator is the character right after `ISA`; the
    /// component separator is ISA16 and the segment terminator follows it.
    pub fn detect(input: &str) -> Result<Self, EdiError> {
        if !input.starts_with("ISA") {
            return Err(EdiError::MissingIsa);
        }
        let mut chars = input.chars().skip(3);
        let element = chars.next().ok_or(EdiError::TruncatedHeader)?;

        // ISA01..ISA15 are followed by a separator each; ISA16 is one character
        let mut separators = 1;
        for c in chars.by_ref() {
            if c == element {
                separators += 1;
                if separators == 16 {
                    break;
                }
            }
        }
        if separators < 16 {
            return Err(EdiError::TruncatedHeader);
        }

        let component = chars.next().ok_or(EdiError::TruncatedHeader)?;
        let segment = chars.next().ok_or(EdiError::TruncatedHeader)?;

        if element == component || element == segment || component == segment {
            return Err(EdiError::TruncatedHeader);
        }

        Ok(Self {
            element,
            component,
            segment,
        })
    }

    fn contains(&self, value: &str) -> bool {
        value
            .chars()
            .any(|c| c == self.element || c == self.component || c == self.segment)
    }
}

/// One segment: an id followed by its elements (ISA01 is `elements[0]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: String,
    pub elements: Vec<String>,
}

impl Segment {
    pub fn new<I, S>(id: &str, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            elements: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse one segment (without its terminator).
    pub fn parse(raw: &str, delimiters: &Delimiters) -> Result<Self, EdiError> {
        let mut parts = raw.split(delimiters.element);
        let id = parts.next().unwrap_or_default().trim();
        if !SEGMENT_ID.is_match(id) {
            return Err(EdiError::InvalidSegmentId(id.to_string()));
        }
        Ok(Self {
            id: id.to_string(),
            elements: parts.map(str::to_string).collect(),
        })
    }

    /// Element by its 1-based X12 position; empty elements count as absent.
    pub fn element(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.elements.get(i))
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }

    pub fn required(&self, position: usize) -> Result<&str, EdiError> {
        self.element(position).ok_or_else(|| EdiError::MissingElement {
            segment: self.id.clone(),
            position,
        })
    }

    pub fn required_number(&self, position: usize) -> Result<i64, EdiError> {
        let value = self.required(position)?;
        value.parse().map_err(|_| EdiError::InvalidNumber {
            segment: self.id.clone(),
            value: value.to_string(),
        })
    }

    /// Render with the given delimiters, dropping trailing empty elements.
    pub fn write(&self, delimiters: &Delimiters) -> Result<String, EdiError> {
        let last = self
            .elements
            .iter()
            .rposition(|e| !e.is_empty())
            .map(|i| i + 1)
            .unwrap_or(0);

        let mut out = self.id.clone();
        for (index, element) in self.elements[..last].iter().enumerate() {
            // ISA16 carries the component separator itself
            let is_isa16 = self.id == "ISA" && index == 15;
            if !is_isa16 && delimiters.contains(element) {
                return Err(EdiError::DelimiterInValue(element.clone()));
            }
            out.push(delimiters.element);
            out.push_str(element);
        }
        Ok(out)
    }
}

/// Split an interchange into segments, ignoring line breaks after terminators.
pub fn split_segments(input: &str, delimiters: &Delimiters) -> Result<Vec<Segment>, EdiError> {
    input
        .split(delimiters.segment)
        .map(|raw| raw.trim_matches(|c| c == '\r' || c == '\n'))
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            // ISA keeps its padded fields; only the id needs no surrounding noise
            Segment::parse(raw.trim_start(), delimiters)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *250301*1200*U*00401*000000001*0*P*>~";

    #[test]
    fn delimiters_are_read_from_isa() {
        let d = Delimiters::detect(ISA).unwrap();
        assert_eq!(d, Delimiters::default());
    }

    #[test]
    fn alternative_delimiters_are_supported() {
        let isa = ISA.replace('*', "|").replace('~', "\n").replace('>', ":");
        let d = Delimiters::detect(&isa).unwrap();
        assert_eq!(d.element, '|');
        assert_eq!(d.component, ':');
        assert_eq!(d.segment, '\n');
    }

    #[test]
    fn truncated_or_missing_header_is_rejected() {
        assert_eq!(Delimiters::detect("GS*OW~"), Err(EdiError::MissingIsa));
        assert_eq!(
            Delimiters::detect("ISA*00*  *00"),
            Err(EdiError::TruncatedHeader)
        );
    }

    #[test]
    fn elements_are_one_based_and_blank_means_absent() {
        let s = Segment::parse("W01*12*CA**VN*SKU-1", &Delimiters::default()).unwrap();
        assert_eq!(s.id, "W01");
        assert_eq!(s.element(1), Some("12"));
        assert_eq!(s.element(3), None);
        assert_eq!(s.element(5), Some("SKU-1"));
        assert_eq!(s.element(0), None);
        assert_eq!(s.required_number(1).unwrap(), 12);
        assert!(matches!(
            s.required(3),
            Err(EdiError::MissingElement { position: 3, .. })
        ));
    }

    #[test]
    fn bad_segment_ids_are_rejected() {
        let d = Delimiters::default();
        assert!(Segment::parse("w01*1", &d).is_err());
        assert!(Segment::parse("W0123*1", &d).is_err());
        assert!(Segment::parse("1AB*1", &d).is_err());
    }

    #[test]
    fn write_drops_trailing_empties_and_refuses_delimiters() {
        let d = Delimiters::default();
        let s = Segment::new("N1", ["ST", "Acme", "", ""]);
        assert_eq!(s.write(&d).unwrap(), "N1*ST*Acme");

        let bad = Segment::new("N1", ["ST", "Acme*Co"]);
        assert!(matches!(bad.write(&d), Err(EdiError::DelimiterInValue(_))));
    }

    #[test]
    fn line_breaks_between_segments_are_ignored() {
        let segments =
            split_segments("ST*940*0001~\r\nW05*N*1~\nSE*3*0001~\n", &Delimiters::default())
                .unwrap();
        let ids: Vec<_> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ST", "W05", "SE"]);
    }
}
