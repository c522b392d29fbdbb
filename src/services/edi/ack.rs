//! 997 functional acknowledgements.

use super::EdiError;
use super::envelope::{EnvelopeParams, Interchange, write_interchange};
use super::segment::Segment;

/// Acknowledge every group and transaction set of a received interchange.
///
/// One 997 is written per received group. `params` addresses the reply, so
/// its sender is our id and its receiver the original sender.
pub fn generate_997(interchange: &Interchange, params: &EnvelopeParams) -> Result<String, EdiError> {
    let sets: Vec<(&str, Vec<Segment>)> = interchange
        .groups
        .iter()
        .map(|group| {
            let mut body = vec![Segment::new(
                "AK1",
                [group.functional_id.as_str(), group.control_number.as_str()],
            )];
            for set in &group.transactions {
                body.push(Segment::new(
                    "AK2",
                    [set.code.as_str(), set.control_number.as_str()],
                ));
                body.push(Segment::new("AK5", ["A"]));
            }
            let count = group.transactions.len().to_string();
            body.push(Segment::new(
                "AK9",
                ["A", count.as_str(), count.as_str(), count.as_str()],
            ));
            ("997", body)
        })
        .collect();

    write_interchange(params, "FA", &sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::edi::document::{
        TransactionSetCode, WarehouseDocument, WarehouseLine, extract_documents,
    };
    use crate::services::edi::envelope::{UsageIndicator, parse_interchange};
    use chrono::NaiveDate;

    fn params(sender: &str, receiver: &str) -> EnvelopeParams {
        EnvelopeParams {
            sender_id: sender.into(),
            receiver_id: receiver.into(),
            interchange_control_number: 11,
            group_control_number: 11,
            timestamp: NaiveDate::from_ymd_opt(2025, 3, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            usage: UsageIndicator::Production,
        }
    }

    fn inbound() -> Interchange {
        let doc = WarehouseDocument {
            transaction_set: TransactionSetCode::TransferReceipt,
            reference: "RCV-1".into(),
            secondary_reference: None,
            date: None,
            parties: vec![],
            lines: vec![WarehouseLine {
                quantity: 4,
                uom: "EA".into(),
                upc: None,
                sku: "SKU-1".into(),
                shipped_quantity: None,
                reason_code: None,
            }],
        };
        let text = doc.generate(&params("3PLWAREHOUSE", "ERPSERVICES")).unwrap();
        parse_interchange(&text).unwrap()
    }

    #[test]
    fn acknowledges_each_set() {
        let received = inbound();
        let text = generate_997(&received, &params("ERPSERVICES", "3PLWAREHOUSE")).unwrap();

        assert!(text.contains("GS*FA*ERPSERVICES*3PLWAREHOUSE*"));
        assert!(text.contains("ST*997*0001~"));
        assert!(text.contains("AK1*RE*11~"));
        assert!(text.contains("AK2*944*0001~"));
        assert!(text.contains("AK5*A~"));
        assert!(text.contains("AK9*A*1*1*1~"));
        assert!(text.contains("SE*6*0001~"));
    }

    #[test]
    fn acknowledgement_is_itself_a_valid_interchange() {
        let text = generate_997(&inbound(), &params("ERPSERVICES", "3PLWAREHOUSE")).unwrap();
        let ack = parse_interchange(&text).unwrap();
        assert_eq!(ack.sender_id, "ERPSERVICES");
        assert_eq!(ack.groups[0].functional_id, "FA");
        assert_eq!(ack.groups[0].transactions[0].code, "997");
        // a 997 is not a warehouse document
        assert!(extract_documents(&ack).is_err());
    }
}
