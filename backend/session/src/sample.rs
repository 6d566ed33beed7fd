use chrono::{Datelike, Utc};

use taxwise_core::ExtractedRecord;

/// The sample W-2 record the editor starts with, dated to last tax year.
pub fn initial_record() -> ExtractedRecord {
    sample_record(Utc::now().year() - 1)
}

fn sample_record(year: i32) -> ExtractedRecord {
    ExtractedRecord::unchecked(format!(
        r#"{{
  "formType": "W-2",
  "year": {year},
  "employee": {{
    "name": "Jane Doe",
    "ssn": "XXX-XX-XXXX",
    "address": "123 Taxpayer Ln, Filecity, ST 54321"
  }},
  "employer": {{
    "name": "AI Solutions Inc.",
    "ein": "XX-XXXXXXX",
    "address": "789 Innovation Dr, Techville, ST 12345"
  }},
  "income": {{
    "wages": 75000,
    "federalWithheld": 8000,
    "stateWithheld": 3000,
    "socialSecurityWages": 75000,
    "socialSecurityTaxWithheld": 4650,
    "medicareWagesAndTips": 75000,
    "medicareTaxWithheld": 1087.5
  }}
}}"#
    ))
}
