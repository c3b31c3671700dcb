use rust_decimal::Decimal;

use crate::config::PurchaseRules;
use crate::enums::{ Network, PurchaseType };
use crate::error::{ AppError, Result };
use crate::plans;

/// Normalize and validate a Nigerian local-format mobile number
/// (`0` + `7|8|9` + `0|1` + 8 digits). `+234`/`234` prefixes are folded
/// back to the leading zero.
pub fn normalize_phone_number(raw: &str) -> Result<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    let local = if let Some(rest) = compact.strip_prefix("+234") {
        format!("0{}", rest)
    } else if compact.len() == 13 && compact.starts_with("234") {
        format!("0{}", &compact[3..])
    } else {
        compact
    };

    if is_valid_local_number(&local) {
        Ok(local)
    } else {
        Err(
            AppError::validation(
                "phone_number",
                format!("Invalid phone number: {}. Expected an 11-digit number like 08031234567", raw)
            )
        )
    }
}

pub fn is_valid_local_number(number: &str) -> bool {
    let bytes = number.as_bytes();
    bytes.len() == 11 &&
        bytes.iter().all(|b| b.is_ascii_digit()) &&
        bytes[0] == b'0' &&
        matches!(bytes[1], b'7' | b'8' | b'9') &&
        matches!(bytes[2], b'0' | b'1')
}

/// Amount and plan a purchase will actually be made with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPayload {
    pub amount: Decimal,
    pub plan_id: Option<String>,
}

/// Airtime takes the caller's amount within the configured bounds; data
/// derives its amount from the plan catalog and ignores any amount sent.
pub fn resolve_payload(
    purchase_type: PurchaseType,
    network: Network,
    amount: Option<Decimal>,
    plan_id: Option<&str>,
    rules: &PurchaseRules
) -> Result<ResolvedPayload> {
    match purchase_type {
        PurchaseType::Airtime => {
            let amount = amount.ok_or_else(||
                AppError::validation("amount", "Airtime purchases require an amount")
            )?;
            if amount.fract() != Decimal::ZERO {
                return Err(AppError::validation("amount", "Amount must be a whole number"));
            }
            if amount < rules.min_airtime_amount || amount > rules.max_airtime_amount {
                return Err(
                    AppError::validation(
                        "amount",
                        format!(
                            "Amount must be between {} and {}",
                            rules.min_airtime_amount,
                            rules.max_airtime_amount
                        )
                    )
                );
            }
            Ok(ResolvedPayload { amount, plan_id: None })
        }
        PurchaseType::Data => {
            let plan_id = plan_id.ok_or_else(||
                AppError::validation("plan_id", "Data purchases require a plan_id")
            )?;
            let plan = plans::find_plan(plan_id, network)?;
            Ok(ResolvedPayload {
                amount: plan.price,
                plan_id: Some(plan.id.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_local_and_international_formats() {
        assert_eq!(normalize_phone_number("08031234567").unwrap(), "08031234567");
        assert_eq!(normalize_phone_number("+2348031234567").unwrap(), "08031234567");
        assert_eq!(normalize_phone_number("2349061234567").unwrap(), "09061234567");
        assert_eq!(normalize_phone_number("0803 123 4567").unwrap(), "08031234567");
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        for bad in ["0803123456", "080312345678", "18031234567", "06031234567", "0823123456a", ""] {
            assert!(normalize_phone_number(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_airtime_amount_bounds() {
        let rules = PurchaseRules::default();
        let ok = resolve_payload(
            PurchaseType::Airtime,
            Network::Mtn,
            Some(Decimal::from(500)),
            None,
            &rules
        ).unwrap();
        assert_eq!(ok.amount, Decimal::from(500));
        assert_eq!(ok.plan_id, None);

        for amount in [10, 1_000_000] {
            assert!(
                resolve_payload(
                    PurchaseType::Airtime,
                    Network::Mtn,
                    Some(Decimal::from(amount)),
                    None,
                    &rules
                ).is_err()
            );
        }
        assert!(resolve_payload(PurchaseType::Airtime, Network::Mtn, None, None, &rules).is_err());
    }

    #[test]
    fn test_data_amount_comes_from_plan() {
        let rules = PurchaseRules::default();
        let resolved = resolve_payload(
            PurchaseType::Data,
            Network::Glo,
            Some(Decimal::from(1)),
            Some("glo-2gb-30d"),
            &rules
        ).unwrap();
        assert_eq!(resolved.amount, Decimal::from(540));
        assert_eq!(resolved.plan_id.as_deref(), Some("glo-2gb-30d"));

        assert!(
            resolve_payload(PurchaseType::Data, Network::Mtn, None, Some("glo-2gb-30d"), &rules).is_err()
        );
    }
}
