//! Wire types for the catalog/lead backend.
//!
//! Field names mirror the backend's serializers exactly. Dictionary
//! endpoints (cities, categories, formats, tariff plans) ship flat
//! `name_ru` / `name_kz` pairs; school and instructor objects ship nested
//! `{"ru": .., "kz": ..}` objects. Both collapse into [`LocalizedText`]
//! on deserialization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::i18n::{Lang, LocalizedText};

// ── Dictionary entries ──────────────────────────────────────────────

/// Flat wire shape shared by the dictionary endpoints.
#[derive(Debug, Clone, Deserialize)]
struct DictWire {
    id: i64,
    #[serde(default)]
    code: Option<String>,
    name_ru: String,
    #[serde(default)]
    name_kz: Option<String>,
}

impl DictWire {
    fn name(&self) -> LocalizedText {
        LocalizedText::new(self.name_ru.clone(), self.name_kz.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "DictWire")]
pub struct City {
    pub id: i64,
    pub name: LocalizedText,
}

impl From<DictWire> for City {
    fn from(wire: DictWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "DictWire")]
pub struct Category {
    pub id: i64,
    /// License category code, e.g. `"B"`.
    pub code: String,
    pub name: LocalizedText,
}

impl From<DictWire> for Category {
    fn from(wire: DictWire) -> Self {
        let name = wire.name();
        Self {
            id: wire.id,
            code: wire.code.unwrap_or_default(),
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "DictWire")]
pub struct TrainingFormat {
    pub id: i64,
    pub name: LocalizedText,
}

impl From<DictWire> for TrainingFormat {
    fn from(wire: DictWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name(),
        }
    }
}

/// Lesson-time slot (morning, evening, weekend, ..).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "DictWire")]
pub struct TrainingTime {
    pub id: i64,
    pub name: LocalizedText,
}

impl From<DictWire> for TrainingTime {
    fn from(wire: DictWire) -> Self {
        Self {
            id: wire.id,
            name: wire.name(),
        }
    }
}

// ── Schools and tariffs ─────────────────────────────────────────────

/// Nearest intake info on a school card.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NearestIntake {
    /// ISO date string or null; rendered as dd.mm.yyyy when parseable.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub text_ru: Option<String>,
    #[serde(default)]
    pub text_kz: Option<String>,
}

impl NearestIntake {
    pub fn text(&self, lang: Lang) -> Option<&str> {
        let text = match lang {
            Lang::Kz => self.text_kz.as_deref().or(self.text_ru.as_deref()),
            Lang::Ru => self.text_ru.as_deref(),
        };
        text.filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchoolSummary {
    pub id: i64,
    pub name: LocalizedText,
    pub city_id: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub trust_index: f64,
    #[serde(default)]
    pub nearest_intake: NearestIntake,
    #[serde(default)]
    pub address: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchoolDetail {
    pub id: i64,
    pub name: LocalizedText,
    pub city_id: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub trust_index: f64,
    #[serde(default)]
    pub nearest_intake: NearestIntake,
    #[serde(default)]
    pub address: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub whatsapp_phone: Option<String>,
    #[serde(default)]
    pub tariffs: Vec<Tariff>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tariff {
    pub tariff_plan_id: i64,
    #[serde(default)]
    pub code: Option<String>,
    name_ru: Option<String>,
    #[serde(default)]
    name_kz: Option<String>,
    #[serde(default)]
    pub price_kzt: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    description_ru: Option<String>,
    #[serde(default)]
    description_kz: Option<String>,
    /// `None` means the tariff applies to every category.
    #[serde(default)]
    pub category_id: Option<i64>,
    /// `None` means the tariff applies to every training format.
    #[serde(default)]
    pub training_format_id: Option<i64>,
}

impl Tariff {
    /// Display name: localized plan name, falling back to the plan code.
    pub fn display_name(&self, lang: Lang) -> &str {
        let name = match lang {
            Lang::Kz => self.name_kz.as_deref().or(self.name_ru.as_deref()),
            Lang::Ru => self.name_ru.as_deref(),
        };
        name.filter(|n| !n.is_empty())
            .or(self.code.as_deref())
            .unwrap_or("")
    }

    /// Owned bilingual name, with the plan code as the last resort.
    pub fn localized_name(&self) -> LocalizedText {
        let ru = self
            .name_ru
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.code.clone())
            .unwrap_or_default();
        LocalizedText::new(ru, self.name_kz.clone())
    }

    pub fn description(&self, lang: Lang) -> Option<&str> {
        let text = match lang {
            Lang::Kz => self.description_kz.as_deref().or(self.description_ru.as_deref()),
            Lang::Ru => self.description_ru.as_deref(),
        };
        text.filter(|t| !t.is_empty())
    }

    #[cfg(test)]
    pub fn for_tests(
        tariff_plan_id: i64,
        code: &str,
        price_kzt: i64,
        category_id: Option<i64>,
        training_format_id: Option<i64>,
    ) -> Self {
        Self {
            tariff_plan_id,
            code: Some(code.to_string()),
            name_ru: Some(code.to_string()),
            name_kz: None,
            price_kzt,
            currency: Some("KZT".to_string()),
            description_ru: None,
            description_kz: None,
            category_id,
            training_format_id,
        }
    }
}

/// Optional server-side tariff filter for the school-detail call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TariffFilter {
    pub category_id: Option<i64>,
    pub training_format_id: Option<i64>,
    pub training_time_id: Option<i64>,
}

/// Second, defensive filter pass over a tariff list.
///
/// A tariff stays when each of its bindings is either unset (applies to
/// all) or equal to the selected value. Relative order is preserved —
/// the filtered list is what the user sees and replies against. Time
/// slots are not part of the tariff wire shape, so for them the
/// server-side filter is the only one.
pub fn filter_tariffs(tariffs: &[Tariff], filter: TariffFilter) -> Vec<Tariff> {
    tariffs
        .iter()
        .filter(|t| {
            let category_ok = match (filter.category_id, t.category_id) {
                (Some(selected), Some(bound)) => selected == bound,
                _ => true,
            };
            let format_ok = match (filter.training_format_id, t.training_format_id) {
                (Some(selected), Some(bound)) => selected == bound,
                _ => true,
            };
            category_ok && format_ok
        })
        .cloned()
        .collect()
}

// ── Instructors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gearbox {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructorSummary {
    pub id: i64,
    pub display_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub gearbox: Option<Gearbox>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub bio: LocalizedText,
    pub city_id: i64,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructorTariff {
    pub id: i64,
    #[serde(default)]
    pub tariff_type: Option<String>,
    #[serde(default)]
    pub price_kzt: i64,
    name_ru: Option<String>,
    #[serde(default)]
    name_kz: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

impl InstructorTariff {
    pub fn display_name(&self, lang: Lang) -> &str {
        let name = match lang {
            Lang::Kz => self.name_kz.as_deref().or(self.name_ru.as_deref()),
            Lang::Ru => self.name_ru.as_deref(),
        };
        name.unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructorDetail {
    pub id: i64,
    pub display_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub gearbox: Option<Gearbox>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub bio: LocalizedText,
    pub city_id: i64,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub whatsapp_phone: Option<String>,
    #[serde(default)]
    pub tariffs: Vec<InstructorTariff>,
}

// ── Online tariff resolution ────────────────────────────────────────

/// Fixed plan codes of the online products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineProduct {
    PddTests,
    Start,
    ProDrive,
}

impl OnlineProduct {
    pub fn plan_code(&self) -> &'static str {
        match self {
            Self::PddTests => "PDD_TESTS",
            Self::Start => "ONLINE_START",
            Self::ProDrive => "ONLINE_PRO_DRIVE",
        }
    }
}

/// A tariff resolved by plan code, with the school that carries it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTariff {
    pub tariff_plan_id: i64,
    pub name: LocalizedText,
    pub price_kzt: i64,
    pub school_id: i64,
    pub training_format_id: Option<i64>,
}

// ── Lead submission ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadType {
    School,
    Instructor,
    Tests,
}

/// Cross-flow intent marker tagged by the certificate router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    CertNotPassed,
}

/// Identity of the chat user submitting the lead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BotUser {
    /// Chat-platform user id (the backend calls it `telegram_user_id`).
    #[serde(rename = "telegram_user_id")]
    pub external_user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub language: Lang,
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

/// Type-specific lead fields. Serialized flat, as the backend expects.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LeadPayload {
    School {
        #[serde(skip_serializing_if = "Option::is_none")]
        city_id: Option<i64>,
        category_id: i64,
        training_format_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        training_time_id: Option<i64>,
        school_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        tariff_plan_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tariff_price_kzt: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        iin: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        whatsapp: Option<String>,
    },
    Instructor {
        city_id: i64,
        category_id: i64,
        gearbox: Gearbox,
        instructor_id: i64,
    },
    Tests {
        iin: String,
        whatsapp: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadRequest {
    #[serde(rename = "type")]
    pub lead_type: LeadType,
    pub language: Lang,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_intent: Option<Intent>,
    pub bot_user: BotUser,
    pub contact: Contact,
    pub payload: LeadPayload,
}

/// Response of the lead-creation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedLead {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_entry_deserializes_flat_names() {
        let json = r#"{"id": 2, "code": "B", "name_ru": "Категория B", "name_kz": "B санаты"}"#;
        let category: Category = serde_json::from_str(json).unwrap();
        assert_eq!(category.id, 2);
        assert_eq!(category.code, "B");
        assert_eq!(category.name.get(Lang::Kz), "B санаты");

        let json = r#"{"id": 1, "name_ru": "Алматы"}"#;
        let city: City = serde_json::from_str(json).unwrap();
        assert_eq!(city.name.get(Lang::Kz), "Алматы");

        // A category without a code still carries both names.
        let json = r#"{"id": 7, "name_ru": "Категория C", "name_kz": "C санаты"}"#;
        let no_code: Category = serde_json::from_str(json).unwrap();
        assert_eq!(no_code.code, "");
        assert_eq!(no_code.name.get(Lang::Kz), "C санаты");
    }

    #[test]
    fn school_deserializes_nested_names() {
        let json = r#"{
            "id": 5,
            "name": {"ru": "Автошкола Старт", "kz": "Старт автошколасы"},
            "city_id": 1,
            "rating": 4.7,
            "trust_index": 88,
            "nearest_intake": {"date": "2026-09-01", "text_ru": "набор открыт", "text_kz": null},
            "address": {"ru": "ул. Абая 10", "kz": "Абай к-сі 10"},
            "description": {"ru": "", "kz": ""},
            "contact_phone": "+77010000000",
            "whatsapp_phone": "+77010000001",
            "tariffs": [
                {"tariff_plan_id": 9, "code": "STANDARD", "name_ru": "Стандарт",
                 "name_kz": null, "price_kzt": 90000, "currency": "KZT",
                 "description_ru": null, "description_kz": null,
                 "category_id": 2, "training_format_id": 1}
            ]
        }"#;
        let detail: SchoolDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.name.get(Lang::Kz), "Старт автошколасы");
        assert_eq!(detail.tariffs.len(), 1);
        assert_eq!(detail.tariffs[0].price_kzt, 90_000);
        assert_eq!(detail.nearest_intake.text(Lang::Kz), Some("набор открыт"));
    }

    #[test]
    fn tariff_filter_keeps_unbound_and_matching_in_order() {
        let tariffs = vec![
            Tariff::for_tests(1, "ALL", 50_000, None, None),
            Tariff::for_tests(2, "B_ONLY", 60_000, Some(2), None),
            Tariff::for_tests(3, "A_ONLY", 70_000, Some(3), None),
        ];
        let filtered = filter_tariffs(
            &tariffs,
            TariffFilter {
                category_id: Some(2),
                ..TariffFilter::default()
            },
        );
        let ids: Vec<i64> = filtered.iter().map(|t| t.tariff_plan_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn tariff_filter_applies_format_rule_too() {
        let tariffs = vec![
            Tariff::for_tests(1, "OFFLINE", 50_000, None, Some(1)),
            Tariff::for_tests(2, "ONLINE", 60_000, None, Some(2)),
            Tariff::for_tests(3, "ANY", 70_000, None, None),
        ];
        let filtered = filter_tariffs(
            &tariffs,
            TariffFilter {
                training_format_id: Some(2),
                ..TariffFilter::default()
            },
        );
        let ids: Vec<i64> = filtered.iter().map(|t| t.tariff_plan_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn no_filter_passes_everything_through() {
        let tariffs = vec![
            Tariff::for_tests(1, "A", 1, Some(1), Some(1)),
            Tariff::for_tests(2, "B", 2, Some(2), Some(2)),
        ];
        let filtered = filter_tariffs(&tariffs, TariffFilter::default());
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn school_lead_serializes_backend_shape() {
        let lead = LeadRequest {
            lead_type: LeadType::School,
            language: Lang::Ru,
            main_intent: None,
            bot_user: BotUser {
                external_user_id: 42,
                username: Some("aigerim".into()),
                first_name: None,
                last_name: None,
                language: Lang::Ru,
            },
            contact: Contact {
                name: "Aigerim".into(),
                phone: "+77011234567".into(),
            },
            payload: LeadPayload::School {
                city_id: Some(1),
                category_id: 2,
                training_format_id: 1,
                training_time_id: None,
                school_id: 5,
                tariff_plan_id: Some(9),
                tariff_price_kzt: Some(90_000),
                iin: None,
                whatsapp: None,
            },
        };
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["type"], "SCHOOL");
        assert_eq!(json["bot_user"]["telegram_user_id"], 42);
        assert_eq!(json["payload"]["city_id"], 1);
        assert_eq!(json["payload"]["tariff_plan_id"], 9);
        assert!(json.get("main_intent").is_none());
    }

    #[test]
    fn online_lead_omits_city() {
        let payload = LeadPayload::School {
            city_id: None,
            category_id: 2,
            training_format_id: 1,
            training_time_id: None,
            school_id: 7,
            tariff_plan_id: Some(11),
            tariff_price_kzt: Some(19_900),
            iin: Some("990101350123".into()),
            whatsapp: Some("+77011234567".into()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("city_id").is_none());
        assert_eq!(json["iin"], "990101350123");
    }

    #[test]
    fn tests_payload_carries_iin_and_whatsapp() {
        let payload = LeadPayload::Tests {
            iin: "990101350123".into(),
            whatsapp: "+77011234567".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["iin"], "990101350123");
        assert_eq!(json["whatsapp"], "+77011234567");
    }

    #[test]
    fn intent_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&Intent::CertNotPassed).unwrap(),
            "\"CERT_NOT_PASSED\""
        );
        assert_eq!(
            serde_json::to_string(&Gearbox::Automatic).unwrap(),
            "\"AUTOMATIC\""
        );
    }

    #[test]
    fn tariff_display_name_falls_back_to_code() {
        let mut tariff = Tariff::for_tests(1, "PDD_TESTS", 9_900, None, None);
        tariff.name_ru = None;
        assert_eq!(tariff.display_name(Lang::Ru), "PDD_TESTS");
    }
}
