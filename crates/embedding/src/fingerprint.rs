use sentinel_core::Transaction;

/// Separator between fingerprint fields.
pub const DELIMITER: &str = " | ";

const MISSING: &str = "N/A";
const UNKNOWN_CATEGORY: &str = "unknown";

/// Build the semantic fingerprint of a transaction.
///
/// Five labelled fields in fixed order: amount + currency, type, category,
/// time of day (UTC `HH:MM`), merchant. Absent fields render as `N/A`,
/// except category which defaults to `unknown`.
pub fn fingerprint(txn: &Transaction) -> String {
    let currency = present(txn.currency.as_deref()).unwrap_or(MISSING);
    let kind = present(txn.kind.as_deref()).unwrap_or(MISSING);
    let category = present(txn.category.as_deref()).unwrap_or(UNKNOWN_CATEGORY);
    let time = txn
        .timestamp
        .map(|ts| ts.format("%H:%M").to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let merchant = present(txn.merchant_name.as_deref())
        .or_else(|| present(Some(txn.merchant.as_str())))
        .unwrap_or(MISSING);

    [
        format!("Amount: {:.2} {}", txn.amount, clean(currency)),
        format!("Type: {}", clean(kind)),
        format!("Category: {}", clean(category)),
        format!("Time: {}", time),
        format!("Merchant: {}", clean(merchant)),
    ]
    .join(DELIMITER)
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Keep field values from introducing extra delimiters.
fn clean(value: &str) -> String {
    value.replace('|', "/")
}
