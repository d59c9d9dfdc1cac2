//! Reference numbers handed out to applicants and printed on visas.

use chrono::{DateTime, Datelike, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

pub const UNKNOWN_COUNTRY_ISO3: &str = "XXX";

const VISA_NUMBER_PREFIX: &str = "E-VVL/DGM/DG/CAB/";

/// Country names accepted by the application form, French first, with common English spellings.
const COUNTRY_ISO3: &[(&str, &str)] = &[
    ("afghanistan", "AFG"),
    ("albanie", "ALB"),
    ("albania", "ALB"),
    ("algérie", "DZA"),
    ("algeria", "DZA"),
    ("allemagne", "DEU"),
    ("germany", "DEU"),
    ("angola", "AGO"),
    ("argentine", "ARG"),
    ("argentina", "ARG"),
    ("australie", "AUS"),
    ("australia", "AUS"),
    ("autriche", "AUT"),
    ("austria", "AUT"),
    ("belgique", "BEL"),
    ("belgium", "BEL"),
    ("bénin", "BEN"),
    ("benin", "BEN"),
    ("brésil", "BRA"),
    ("brazil", "BRA"),
    ("burkina faso", "BFA"),
    ("burundi", "BDI"),
    ("cameroun", "CMR"),
    ("cameroon", "CMR"),
    ("canada", "CAN"),
    ("centrafrique", "CAF"),
    ("central african republic", "CAF"),
    ("chine", "CHN"),
    ("china", "CHN"),
    ("congo-brazzaville", "COG"),
    ("republic of the congo", "COG"),
    ("côte d'ivoire", "CIV"),
    ("ivory coast", "CIV"),
    ("égypte", "EGY"),
    ("egypt", "EGY"),
    ("espagne", "ESP"),
    ("spain", "ESP"),
    ("états-unis", "USA"),
    ("united states", "USA"),
    ("usa", "USA"),
    ("éthiopie", "ETH"),
    ("ethiopia", "ETH"),
    ("france", "FRA"),
    ("gabon", "GAB"),
    ("ghana", "GHA"),
    ("guinée", "GIN"),
    ("guinea", "GIN"),
    ("inde", "IND"),
    ("india", "IND"),
    ("italie", "ITA"),
    ("italy", "ITA"),
    ("japon", "JPN"),
    ("japan", "JPN"),
    ("kenya", "KEN"),
    ("libéria", "LBR"),
    ("liberia", "LBR"),
    ("madagascar", "MDG"),
    ("mali", "MLI"),
    ("maroc", "MAR"),
    ("morocco", "MAR"),
    ("mozambique", "MOZ"),
    ("niger", "NER"),
    ("nigeria", "NGA"),
    ("ouganda", "UGA"),
    ("uganda", "UGA"),
    ("pakistan", "PAK"),
    ("pays-bas", "NLD"),
    ("netherlands", "NLD"),
    ("portugal", "PRT"),
    ("république sud-africaine", "ZAF"),
    ("afrique du sud", "ZAF"),
    ("south africa", "ZAF"),
    ("royaume-uni", "GBR"),
    ("united kingdom", "GBR"),
    ("rwanda", "RWA"),
    ("sénégal", "SEN"),
    ("senegal", "SEN"),
    ("soudan", "SDN"),
    ("sudan", "SDN"),
    ("suisse", "CHE"),
    ("switzerland", "CHE"),
    ("tanzanie", "TZA"),
    ("tanzania", "TZA"),
    ("tchad", "TCD"),
    ("chad", "TCD"),
    ("togo", "TGO"),
    ("tunisie", "TUN"),
    ("tunisia", "TUN"),
    ("turquie", "TUR"),
    ("turkey", "TUR"),
    ("zambie", "ZMB"),
    ("zambia", "ZMB"),
    ("zimbabwe", "ZWE"),
];

/// ISO 3166-1 alpha-3 code for a nationality as typed on the form, `XXX` when unknown.
///
/// A value that already is a known alpha-3 code is accepted as-is.
pub fn country_iso3(nationality: &str) -> &'static str {
    let needle = nationality.trim().to_lowercase();
    if needle.is_empty() {
        return UNKNOWN_COUNTRY_ISO3;
    }

    COUNTRY_ISO3
        .iter()
        .find(|(name, code)| *name == needle || code.eq_ignore_ascii_case(&needle))
        .map(|(_, code)| *code)
        .unwrap_or(UNKNOWN_COUNTRY_ISO3)
}

/// `eVisa-FRA-26-00001` style number from nationality, creation year and sequence.
pub fn application_number(nationality: &str, created_at: DateTime<Utc>, sequence: i64) -> String {
    let year = created_at.year().rem_euclid(100);
    format!("eVisa-{}-{year:02}-{sequence:05}", country_iso3(nationality))
}

pub fn visa_number(sequence: i64) -> String {
    format!("{VISA_NUMBER_PREFIX}{sequence:07}")
}

/// `VFY-<base36 millis>-<4 random uppercase alphanumerics>`.
pub fn verification_code(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect();
    format!("VFY-{}-{suffix}", to_base36(now.timestamp_millis().unsigned_abs()))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
