//! Typed warehouse documents and their segment layouts.
//!
//! | Set | Header                                   | Line                                              |
//! |-----|------------------------------------------|---------------------------------------------------|
//! | 940 | `W05*N*order*po`, `G62*10*date`          | `W01*qty*uom*upc*VN*sku`                          |
//! | 943 | `W06*N*shipment*date*ref2`               | `W04*qty*uom*upc*VN*sku`                          |
//! | 944 | `W17*F*date*receipt*order`               | `W07*qty*uom*upc*VN*sku`                          |
//! | 945 | `W06*F*order*date*shipment`              | `W12*CC*ordered*shipped*diff*uom*upc*VN*sku`      |
//! | 947 | `W15*date*adjustment*ref2`               | `W19*reason*qty*uom*upc*VN*sku`                   |
//!
//! Every set may carry `N1*qualifier*name*id_qualifier*id` parties.
//! Segments outside these layouts (LX loops, W76 totals, notes) are skipped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::EdiError;
use super::envelope::{
    EnvelopeParams, Interchange, TransactionSet, format_date, parse_date, write_interchange,
};
use super::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionSetCode {
    /// Warehouse shipping order
    #[serde(rename = "940")]
    ShippingOrder,
    /// Warehouse stock transfer shipment advice
    #[serde(rename = "943")]
    TransferShipment,
    /// Warehouse stock transfer receipt advice
    #[serde(rename = "944")]
    TransferReceipt,
    /// Warehouse shipping advice
    #[serde(rename = "945")]
    ShippingAdvice,
    /// Warehouse inventory adjustment advice
    #[serde(rename = "947")]
    InventoryAdjustment,
}

impl TransactionSetCode {
    pub fn code(&self) -> &'static str {
        match self {
            TransactionSetCode::ShippingOrder => "940",
            TransactionSetCode::TransferShipment => "943",
            TransactionSetCode::TransferReceipt => "944",
            TransactionSetCode::ShippingAdvice => "945",
            TransactionSetCode::InventoryAdjustment => "947",
        }
    }

    pub fn parse(code: &str) -> Result<Self, EdiError> {
        match code {
            "940" => Ok(TransactionSetCode::ShippingOrder),
            "943" => Ok(TransactionSetCode::TransferShipment),
            "944" => Ok(TransactionSetCode::TransferReceipt),
            "945" => Ok(TransactionSetCode::ShippingAdvice),
            "947" => Ok(TransactionSetCode::InventoryAdjustment),
            other => Err(EdiError::UnsupportedTransactionSet(other.to_string())),
        }
    }

    /// GS01 functional identifier code for this set.
    pub fn functional_id(&self) -> &'static str {
        match self {
            TransactionSetCode::ShippingOrder => "OW",
            TransactionSetCode::TransferShipment => "AR",
            TransactionSetCode::TransferReceipt => "RE",
            TransactionSetCode::ShippingAdvice => "SW",
            TransactionSetCode::InventoryAdjustment => "AW",
        }
    }

    fn header_segment(&self) -> &'static str {
        match self {
            TransactionSetCode::ShippingOrder => "W05",
            TransactionSetCode::TransferShipment | TransactionSetCode::ShippingAdvice => "W06",
            TransactionSetCode::TransferReceipt => "W17",
            TransactionSetCode::InventoryAdjustment => "W15",
        }
    }
}

/// N1 name segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Entity identifier code, e.g. `ST` ship-to or `WH` warehouse
    pub qualifier: String,
    pub name: String,
    #[serde(default)]
    pub id_qualifier: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Party {
    fn from_segment(segment: &Segment) -> Result<Self, EdiError> {
        Ok(Self {
            qualifier: segment.required(1)?.to_string(),
            name: segment.required(2)?.to_string(),
            id_qualifier: owned(segment.element(3)),
            id: owned(segment.element(4)),
        })
    }

    fn to_segment(&self) -> Segment {
        Segment::new(
            "N1",
            [
                self.qualifier.clone(),
                self.name.clone(),
                self.id_qualifier.clone().unwrap_or_default(),
                self.id.clone().unwrap_or_default(),
            ],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseLine {
    /// Ordered, shipped-to-transfer, received or adjusted quantity.
    /// Negative only on 947 adjustments.
    pub quantity: i64,
    pub uom: String,
    #[serde(default)]
    pub upc: Option<String>,
    pub sku: String,
    /// 945 only
    #[serde(default)]
    pub shipped_quantity: Option<i64>,
    /// 947 only
    #[serde(default)]
    pub reason_code: Option<String>,
}

impl WarehouseLine {
    /// Build a line from the element positions of one line segment layout.
    fn item(
        segment: &Segment,
        quantity: usize,
        uom: usize,
        upc: usize,
        sku: usize,
    ) -> Result<Self, EdiError> {
        Ok(Self {
            quantity: segment.required_number(quantity)?,
            uom: segment.required(uom)?.to_string(),
            upc: owned(segment.element(upc)),
            sku: segment.required(sku)?.to_string(),
            shipped_quantity: None,
            reason_code: None,
        })
    }

    fn upc(&self) -> String {
        self.upc.clone().unwrap_or_default()
    }
}

/// One warehouse transaction set, independent of its envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDocument {
    pub transaction_set: TransactionSetCode,
    /// Order, shipment, receipt or adjustment number
    pub reference: String,
    #[serde(default)]
    pub secondary_reference: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub parties: Vec<Party>,
    pub lines: Vec<WarehouseLine>,
}

impl WarehouseDocument {
    /// Read a document from the body of a transaction set.
    pub fn from_transaction(set: &TransactionSet) -> Result<Self, EdiError> {
        use TransactionSetCode::*;

        let code = TransactionSetCode::parse(&set.code)?;
        let mut doc = WarehouseDocument {
            transaction_set: code,
            reference: String::new(),
            secondary_reference: None,
            date: None,
            parties: Vec::new(),
            lines: Vec::new(),
        };
        let mut header_seen = false;

        for segment in &set.segments {
            match (code, segment.id.as_str()) {
                (_, "N1") => doc.parties.push(Party::from_segment(segment)?),

                (ShippingOrder, "W05") => {
                    doc.reference = segment.required(2)?.to_string();
                    doc.secondary_reference = owned(segment.element(3));
                    header_seen = true;
                }
                (ShippingOrder, "G62") => doc.date = optional_date(segment, 2)?,
                (ShippingOrder, "W01") => doc.lines.push(WarehouseLine::item(segment, 1, 2, 3, 5)?),

                (TransferShipment | ShippingAdvice, "W06") => {
                    doc.reference = segment.required(2)?.to_string();
                    doc.date = optional_date(segment, 3)?;
                    doc.secondary_reference = owned(segment.element(4));
                    header_seen = true;
                }
                (TransferShipment, "W04") => doc.lines.push(WarehouseLine::item(segment, 1, 2, 3, 5)?),
                (ShippingAdvice, "W12") => {
                    let mut line = WarehouseLine::item(segment, 2, 5, 6, 8)?;
                    line.shipped_quantity = Some(segment.required_number(3)?);
                    doc.lines.push(line);
                }

                (TransferReceipt, "W17") => {
                    doc.date = optional_date(segment, 2)?;
                    doc.reference = segment.required(3)?.to_string();
                    doc.secondary_reference = owned(segment.element(4));
                    header_seen = true;
                }
                (TransferReceipt, "W07") => doc.lines.push(WarehouseLine::item(segment, 1, 2, 3, 5)?),

                (InventoryAdjustment, "W15") => {
                    doc.date = optional_date(segment, 1)?;
                    doc.reference = segment.required(2)?.to_string();
                    doc.secondary_reference = owned(segment.element(3));
                    header_seen = true;
                }
                (InventoryAdjustment, "W19") => {
                    let mut line = WarehouseLine::item(segment, 2, 3, 4, 6)?;
                    line.reason_code = Some(segment.required(1)?.to_string());
                    doc.lines.push(line);
                }

                _ => {}
            }
        }

        if !header_seen {
            return Err(EdiError::MissingSegment(code.header_segment()));
        }
        Ok(doc)
    }

    fn validate(&self) -> Result<(), EdiError> {
        if self.reference.trim().is_empty() {
            return Err(EdiError::InvalidDocument("reference is required".into()));
        }
        if self.lines.is_empty() {
            return Err(EdiError::InvalidDocument(
                "at least one line is required".into(),
            ));
        }
        for (index, line) in self.lines.iter().enumerate() {
            let n = index + 1;
            if line.sku.trim().is_empty() || line.uom.trim().is_empty() {
                return Err(EdiError::InvalidDocument(format!(
                    "line {n}: sku and uom are required"
                )));
            }
            match self.transaction_set {
                TransactionSetCode::InventoryAdjustment => {
                    if line.quantity == 0 {
                        return Err(EdiError::InvalidDocument(format!(
                            "line {n}: adjustment quantity must not be zero"
                        )));
                    }
                    if line.reason_code.as_deref().is_none_or(|r| r.trim().is_empty()) {
                        return Err(EdiError::InvalidDocument(format!(
                            "line {n}: reason_code is required"
                        )));
                    }
                }
                TransactionSetCode::ShippingAdvice => {
                    let shipped = line.shipped_quantity.ok_or_else(|| {
                        EdiError::InvalidDocument(format!(
                            "line {n}: shipped_quantity is required"
                        ))
                    })?;
                    if line.quantity <= 0 || shipped < 0 {
                        return Err(EdiError::InvalidDocument(format!(
                            "line {n}: quantities must not be negative and ordered must be positive"
                        )));
                    }
                }
                _ => {
                    if line.quantity <= 0 {
                        return Err(EdiError::InvalidDocument(format!(
                            "line {n}: quantity must be positive"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Trim text values and drop blank optional ones, which is exactly what
    /// reading the X12 form back yields.
    pub fn normalize(&mut self) {
        trim_in_place(&mut self.reference);
        self.secondary_reference = non_blank(self.secondary_reference.take());
        for party in &mut self.parties {
            trim_in_place(&mut party.qualifier);
            trim_in_place(&mut party.name);
            party.id_qualifier = non_blank(party.id_qualifier.take());
            party.id = non_blank(party.id.take());
        }
        for line in &mut self.lines {
            trim_in_place(&mut line.uom);
            trim_in_place(&mut line.sku);
            line.upc = non_blank(line.upc.take());
            line.reason_code = non_blank(line.reason_code.take());
        }
    }

    /// Body segments (between ST and SE) for the normalized document.
    pub fn to_segments(&self) -> Result<Vec<Segment>, EdiError> {
        let mut doc = self.clone();
        doc.normalize();
        doc.validate()?;
        Ok(doc.write_segments())
    }

    fn write_segments(&self) -> Vec<Segment> {
        use TransactionSetCode::*;

        let date = self.date.map(format_date).unwrap_or_default();
        let secondary = self.secondary_reference.clone().unwrap_or_default();
        let reference = self.reference.clone();

        let mut segments = vec![match self.transaction_set {
            ShippingOrder => Segment::new("W05", ["N".to_string(), reference, secondary]),
            TransferShipment => Segment::new("W06", ["N".to_string(), reference, date, secondary]),
            TransferReceipt => Segment::new("W17", ["F".to_string(), date, reference, secondary]),
            ShippingAdvice => Segment::new("W06", ["F".to_string(), reference, date, secondary]),
            InventoryAdjustment => Segment::new("W15", [date, reference, secondary]),
        }];

        segments.extend(self.parties.iter().map(Party::to_segment));

        if self.transaction_set == ShippingOrder {
            if let Some(date) = self.date {
                segments.push(Segment::new("G62", ["10".to_string(), format_date(date)]));
            }
        }

        for line in &self.lines {
            let qty = line.quantity.to_string();
            let uom = line.uom.clone();
            let sku = line.sku.clone();
            segments.push(match self.transaction_set {
                ShippingOrder => Segment::new("W01", [qty, uom, line.upc(), "VN".into(), sku]),
                TransferShipment => Segment::new("W04", [qty, uom, line.upc(), "VN".into(), sku]),
                TransferReceipt => Segment::new("W07", [qty, uom, line.upc(), "VN".into(), sku]),
                ShippingAdvice => {
                    let shipped = line.shipped_quantity.unwrap_or_default();
                    Segment::new(
                        "W12",
                        [
                            "CC".to_string(),
                            qty,
                            shipped.to_string(),
                            (line.quantity - shipped).to_string(),
                            uom,
                            line.upc(),
                            "VN".into(),
                            sku,
                        ],
                    )
                }
                InventoryAdjustment => Segment::new(
                    "W19",
                    [
                        line.reason_code.clone().unwrap_or_default(),
                        qty,
                        uom,
                        line.upc(),
                        "VN".into(),
                        sku,
                    ],
                ),
            });
        }

        segments
    }

    /// Wrap this document into a complete interchange.
    pub fn generate(&self, params: &EnvelopeParams) -> Result<String, EdiError> {
        let code = self.transaction_set;
        write_interchange(
            params,
            code.functional_id(),
            &[(code.code(), self.to_segments()?)],
        )
    }
}

/// Every document of every group, in interchange order.
pub fn extract_documents(interchange: &Interchange) -> Result<Vec<WarehouseDocument>, EdiError> {
    interchange
        .groups
        .iter()
        .flat_map(|group| group.transactions.iter())
        .map(WarehouseDocument::from_transaction)
        .collect()
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn optional_date(segment: &Segment, position: usize) -> Result<Option<NaiveDate>, EdiError> {
    segment.element(position).map(parse_date).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::edi::envelope::{UsageIndicator, parse_interchange};

    fn params() -> EnvelopeParams {
        EnvelopeParams {
            sender_id: "ERPSERVICES".into(),
            receiver_id: "3PLWAREHOUSE".into(),
            interchange_control_number: 7,
            group_control_number: 7,
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(9, 5, 0)
                .unwrap(),
            usage: UsageIndicator::Production,
        }
    }

    fn line(quantity: i64, sku: &str) -> WarehouseLine {
        WarehouseLine {
            quantity,
            uom: "EA".into(),
            upc: None,
            sku: sku.into(),
            shipped_quantity: None,
            reason_code: None,
        }
    }

    fn shipping_order() -> WarehouseDocument {
        WarehouseDocument {
            transaction_set: TransactionSetCode::ShippingOrder,
            reference: "SO-1001".into(),
            secondary_reference: Some("PO-77".into()),
            date: NaiveDate::from_ymd_opt(2025, 3, 4),
            parties: vec![Party {
                qualifier: "ST".into(),
                name: "Acme Retail DC".into(),
                id_qualifier: Some("92".into()),
                id: Some("DC01".into()),
            }],
            lines: vec![
                WarehouseLine {
                    upc: Some("012345678905".into()),
                    ..line(12, "SKU-1")
                },
                line(3, "SKU-2"),
            ],
        }
    }

    fn round_trip(doc: &WarehouseDocument) -> WarehouseDocument {
        let text = doc.generate(&params()).unwrap();
        let interchange = parse_interchange(&text).unwrap();
        let mut docs = extract_documents(&interchange).unwrap();
        assert_eq!(docs.len(), 1);
        docs.remove(0)
    }

    #[test]
    fn shipping_order_round_trips() {
        let doc = shipping_order();
        assert_eq!(round_trip(&doc), doc);
    }

    #[test]
    fn shipping_order_layout() {
        let text = shipping_order().generate(&params()).unwrap();
        assert!(text.contains("GS*OW*ERPSERVICES*3PLWAREHOUSE*20250301*0905*7*X*004010~"));
        assert!(text.contains("ST*940*0001~"));
        assert!(text.contains("W05*N*SO-1001*PO-77~"));
        assert!(text.contains("N1*ST*Acme Retail DC*92*DC01~"));
        assert!(text.contains("G62*10*20250304~"));
        assert!(text.contains("W01*12*EA*012345678905*VN*SKU-1~"));
        assert!(text.contains("W01*3*EA**VN*SKU-2~"));
        // W05, N1, G62 and two W01 plus ST/SE
        assert!(text.contains("SE*7*0001~"));
    }

    #[test]
    fn transfer_documents_round_trip() {
        for code in [
            TransactionSetCode::TransferShipment,
            TransactionSetCode::TransferReceipt,
        ] {
            let doc = WarehouseDocument {
                transaction_set: code,
                reference: "TR-5".into(),
                secondary_reference: None,
                date: NaiveDate::from_ymd_opt(2025, 2, 28),
                parties: vec![],
                lines: vec![line(40, "PALLET-STD")],
            };
            assert_eq!(round_trip(&doc), doc);
        }
    }

    #[test]
    fn shipping_advice_carries_shipped_quantity() {
        let doc = WarehouseDocument {
            transaction_set: TransactionSetCode::ShippingAdvice,
            reference: "SO-1001".into(),
            secondary_reference: Some("SHP-9".into()),
            date: NaiveDate::from_ymd_opt(2025, 3, 5),
            parties: vec![],
            lines: vec![WarehouseLine {
                shipped_quantity: Some(10),
                ..line(12, "SKU-1")
            }],
        };
        let text = doc.generate(&params()).unwrap();
        assert!(text.contains("W06*F*SO-1001*20250305*SHP-9~"));
        assert!(text.contains("W12*CC*12*10*2*EA**VN*SKU-1~"));
        assert_eq!(round_trip(&doc), doc);
    }

    #[test]
    fn inventory_adjustment_allows_negative_quantities() {
        let doc = WarehouseDocument {
            transaction_set: TransactionSetCode::InventoryAdjustment,
            reference: "ADJ-3".into(),
            secondary_reference: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 6),
            parties: vec![],
            lines: vec![WarehouseLine {
                reason_code: Some("07".into()),
                ..line(-2, "SKU-2")
            }],
        };
        let text = doc.generate(&params()).unwrap();
        assert!(text.contains("GS*AW*"));
        assert!(text.contains("W15*20250306*ADJ-3~"));
        assert!(text.contains("W19*07*-2*EA**VN*SKU-2~"));
        assert_eq!(round_trip(&doc), doc);
    }

    #[test]
    fn padded_and_blank_values_survive_the_round_trip() {
        let mut doc = shipping_order();
        doc.reference = " SO-1001 ".into();
        doc.secondary_reference = Some(String::new());
        doc.parties[0].id = Some("  ".into());
        doc.lines[0].upc = Some(String::new());
        doc.lines[1].sku = "SKU-2 ".into();

        let mut expected = doc.clone();
        expected.normalize();
        assert_eq!(expected.reference, "SO-1001");
        assert_eq!(expected.secondary_reference, None);
        assert_eq!(expected.parties[0].id, None);
        assert_eq!(expected.lines[0].upc, None);
        assert_eq!(expected.lines[1].sku, "SKU-2");

        assert_eq!(round_trip(&doc), expected);
    }

    #[test]
    fn blank_reason_code_is_missing() {
        let doc = WarehouseDocument {
            transaction_set: TransactionSetCode::InventoryAdjustment,
            reference: "ADJ-4".into(),
            secondary_reference: None,
            date: None,
            parties: vec![],
            lines: vec![WarehouseLine {
                reason_code: Some(" ".into()),
                ..line(-1, "SKU-2")
            }],
        };
        assert!(matches!(
            doc.generate(&params()),
            Err(EdiError::InvalidDocument(msg)) if msg.contains("reason_code")
        ));
    }

    #[test]
    fn unsupported_set_is_rejected() {
        let set = TransactionSet {
            code: "850".into(),
            control_number: "0001".into(),
            segments: vec![],
        };
        assert_eq!(
            WarehouseDocument::from_transaction(&set),
            Err(EdiError::UnsupportedTransactionSet("850".into()))
        );
    }

    #[test]
    fn missing_header_is_rejected() {
        let set = TransactionSet {
            code: "940".into(),
            control_number: "0001".into(),
            segments: vec![Segment::new("W01", ["1", "EA", "", "VN", "SKU-1"])],
        };
        assert_eq!(
            WarehouseDocument::from_transaction(&set),
            Err(EdiError::MissingSegment("W05"))
        );
    }

    #[test]
    fn bad_quantity_is_reported() {
        let set = TransactionSet {
            code: "940".into(),
            control_number: "0001".into(),
            segments: vec![
                Segment::new("W05", ["N", "SO-1"]),
                Segment::new("W01", ["ten", "EA", "", "VN", "SKU-1"]),
            ],
        };
        assert!(matches!(
            WarehouseDocument::from_transaction(&set),
            Err(EdiError::InvalidNumber { value, .. }) if value == "ten"
        ));
    }

    #[test]
    fn invalid_documents_are_not_generated() {
        let mut doc = shipping_order();
        doc.lines.clear();
        assert!(matches!(
            doc.generate(&params()),
            Err(EdiError::InvalidDocument(_))
        ));

        let mut doc = shipping_order();
        doc.transaction_set = TransactionSetCode::ShippingAdvice;
        assert!(matches!(
            doc.generate(&params()),
            Err(EdiError::InvalidDocument(msg)) if msg.contains("shipped_quantity")
        ));

        let mut doc = shipping_order();
        doc.parties[0].name = "Acme~Retail".into();
        assert!(matches!(
            doc.generate(&params()),
            Err(EdiError::DelimiterInValue(_))
        ));
    }

    #[test]
    fn documents_deserialize_from_json() {
        let doc: WarehouseDocument = serde_json::from_value(serde_json::json!({
            "transaction_set": "943",
            "reference": "TR-1",
            "date": "2025-03-01",
            "lines": [{"quantity": 5, "uom": "CA", "sku": "SKU-9"}]
        }))
        .unwrap();
        assert_eq!(doc.transaction_set, TransactionSetCode::TransferShipment);
        assert!(doc.parties.is_empty());
        assert_eq!(doc.lines[0].upc, None);
    }
}
