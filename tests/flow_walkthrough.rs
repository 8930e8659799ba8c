//! End-to-end flow tests against an in-memory catalog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use srm_bot::api::types::{
    Category, City, CreatedLead, Gearbox, InstructorDetail, InstructorSummary, LeadRequest,
    ResolvedTariff, SchoolDetail, SchoolSummary, TariffFilter, TrainingFormat, TrainingTime,
};
use srm_bot::api::CatalogApi;
use srm_bot::config::BotConfig;
use srm_bot::error::ApiResult;
use srm_bot::flow::{Dispatcher, Incoming};
use srm_bot::i18n::{Lang, LocalizedText};
use srm_bot::render::Reply;

// ── In-memory catalog ───────────────────────────────────────────────

#[derive(Default)]
struct MockApi {
    calls: AtomicUsize,
    captured_lead: Mutex<Option<serde_json::Value>>,
    online_tariff: Option<ResolvedTariff>,
    training_times: Vec<TrainingTime>,
}

impl MockApi {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogApi for MockApi {
    async fn list_cities(&self) -> ApiResult<Vec<City>> {
        self.tick();
        Ok(serde_json::from_value(serde_json::json!([
            {"id": 1, "name_ru": "Алматы"},
            {"id": 4, "name_ru": "Астана"}
        ]))
        .unwrap())
    }

    async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.tick();
        Ok(serde_json::from_value(serde_json::json!([
            {"id": 3, "code": "A", "name_ru": "Категория A"},
            {"id": 2, "code": "B", "name_ru": "Категория B"}
        ]))
        .unwrap())
    }

    async fn list_training_formats(&self) -> ApiResult<Vec<TrainingFormat>> {
        self.tick();
        Ok(serde_json::from_value(serde_json::json!([
            {"id": 1, "name_ru": "Офлайн"},
            {"id": 2, "name_ru": "Онлайн"}
        ]))
        .unwrap())
    }

    async fn list_training_times(&self) -> ApiResult<Vec<TrainingTime>> {
        self.tick();
        Ok(self.training_times.clone())
    }

    async fn list_schools(&self, city_id: i64) -> ApiResult<Vec<SchoolSummary>> {
        self.tick();
        assert_eq!(city_id, 1, "only Almaty has fixture schools");
        Ok(serde_json::from_value(serde_json::json!([
            {"id": 5, "name": {"ru": "Автошкола Старт", "kz": null}, "city_id": 1, "rating": 4.7}
        ]))
        .unwrap())
    }

    async fn school_detail(&self, school_id: i64, filter: TariffFilter) -> ApiResult<SchoolDetail> {
        self.tick();
        assert_eq!(school_id, 5);
        assert_eq!(filter.category_id, Some(2));
        assert_eq!(filter.training_format_id, Some(1));
        Ok(serde_json::from_value(serde_json::json!({
            "id": 5,
            "name": {"ru": "Автошкола Старт", "kz": null},
            "city_id": 1,
            "rating": 4.7,
            "trust_index": 88.0,
            "address": {"ru": "ул. Абая 10", "kz": null},
            "tariffs": [
                {"tariff_plan_id": 9, "code": "STANDARD", "name_ru": "Стандарт",
                 "price_kzt": 90000, "currency": "KZT",
                 "category_id": 2, "training_format_id": 1},
                {"tariff_plan_id": 10, "code": "MOTO", "name_ru": "Мото",
                 "price_kzt": 40000, "currency": "KZT",
                 "category_id": 3, "training_format_id": 1}
            ]
        }))
        .unwrap())
    }

    async fn list_instructors(
        &self,
        city_id: i64,
        category_id: i64,
        gearbox: Option<Gearbox>,
        _gender: Option<&str>,
    ) -> ApiResult<Vec<InstructorSummary>> {
        self.tick();
        assert_eq!(city_id, 1);
        assert!(category_id == 2 || category_id == 3);
        assert_eq!(gearbox, Some(Gearbox::Automatic));
        Ok(serde_json::from_value(serde_json::json!([
            {"id": 17, "display_name": "Ермек", "gearbox": "AUTOMATIC",
             "rating": 4.9, "city_id": 1}
        ]))
        .unwrap())
    }

    async fn instructor_detail(&self, instructor_id: i64) -> ApiResult<InstructorDetail> {
        self.tick();
        assert_eq!(instructor_id, 17);
        Ok(serde_json::from_value(serde_json::json!({
            "id": 17, "display_name": "Ермек", "gearbox": "AUTOMATIC",
            "rating": 4.9, "city_id": 1, "whatsapp_phone": "+77010000002"
        }))
        .unwrap())
    }

    async fn resolve_online_tariff(
        &self,
        plan_code: &str,
        _category_id: Option<i64>,
        school_id: Option<i64>,
    ) -> ApiResult<Option<ResolvedTariff>> {
        self.tick();
        assert_eq!(plan_code, "ONLINE_START");
        assert_eq!(school_id, None, "the online flow never knows a school up front");
        Ok(self.online_tariff.clone())
    }

    async fn create_lead(&self, lead: &LeadRequest) -> ApiResult<CreatedLead> {
        self.tick();
        *self.captured_lead.lock().await = Some(serde_json::to_value(lead).unwrap());
        Ok(CreatedLead { id: Uuid::new_v4() })
    }
}

// ── Harness ─────────────────────────────────────────────────────────

fn dispatcher(api: Arc<MockApi>) -> Dispatcher {
    Dispatcher::new(api, &BotConfig::default())
}

fn msg(text: &str) -> Incoming {
    Incoming {
        session_id: 1,
        user: srm_bot::api::types::BotUser {
            external_user_id: 42,
            username: Some("aigerim".into()),
            first_name: None,
            last_name: None,
            language: Default::default(),
        },
        text: text.to_string(),
        contact_phone: None,
        lang_hint: None,
    }
}

fn prompt_options(replies: &[Reply]) -> Vec<String> {
    match replies.last().unwrap() {
        Reply::Prompt { options, .. } | Reply::RequestContact { options, .. } => options.clone(),
        Reply::Link { .. } => panic!("expected a prompt, got a link"),
    }
}

fn prompt_text(replies: &[Reply]) -> String {
    match replies.last().unwrap() {
        Reply::Prompt { text, .. } | Reply::RequestContact { text, .. } => text.clone(),
        Reply::Link { .. } => panic!("expected a prompt, got a link"),
    }
}

async fn walk_to_school_list(d: &Dispatcher) -> Vec<Reply> {
    d.handle(msg("/start")).await;
    d.handle(msg("🚗 Получить права")).await;
    d.handle(msg("Алматы")).await;
    d.handle(msg("Категория B")).await;
    d.handle(msg("Офлайн")).await
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn school_walkthrough_produces_exact_lead_payload() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    walk_to_school_list(&d).await;
    d.handle(msg("Автошкола Старт")).await;
    let tariffs = d.handle(msg("📝 Записаться")).await;
    // Defensive filter dropped the category-A tariff.
    let options = prompt_options(&tariffs);
    assert!(options.contains(&"Стандарт - 90000 KZT".to_string()));
    assert!(!options.iter().any(|o| o.contains("Мото")));

    d.handle(msg("Стандарт - 90000 KZT")).await;
    d.handle(msg("Aigerim")).await;
    let confirm = d.handle(msg("8 701 123 45 67")).await;
    assert!(prompt_text(&confirm).contains("+77011234567"));

    let done = d.handle(msg("✅ Всё верно")).await;
    assert!(matches!(done[0], Reply::Prompt { ref text, .. } if text.contains("Спасибо")));
    assert!(done
        .iter()
        .any(|r| matches!(r, Reply::Link { url, .. } if url.starts_with("https://wa.me/77026345274"))));

    let lead = api.captured_lead.lock().await.clone().unwrap();
    assert_eq!(lead["type"], "SCHOOL");
    assert_eq!(lead["language"], "RU");
    assert_eq!(lead["bot_user"]["telegram_user_id"], 42);
    assert_eq!(lead["contact"]["name"], "Aigerim");
    assert_eq!(lead["contact"]["phone"], "+77011234567");
    assert_eq!(lead["payload"]["city_id"], 1);
    assert_eq!(lead["payload"]["category_id"], 2);
    assert_eq!(lead["payload"]["training_format_id"], 1);
    assert_eq!(lead["payload"]["school_id"], 5);
    assert_eq!(lead["payload"]["tariff_plan_id"], 9);
    assert_eq!(lead["payload"]["tariff_price_kzt"], 90000);
    // No time slots in the default fixture, so the field is absent.
    assert!(lead["payload"].get("training_time_id").is_none());
}

#[tokio::test]
async fn start_shows_language_keyboard_and_explicit_choice_sticks() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    let prompt = d.handle(msg("/start")).await;
    assert_eq!(
        prompt_options(&prompt),
        vec!["Русский".to_string(), "Қазақша".to_string()]
    );

    let menu = d.handle(msg("Қазақша")).await;
    assert!(prompt_options(&menu).contains(&"🚗 Куәлік алу".to_string()));

    // A later channel hint no longer overrides the explicit pick.
    let mut hinted = msg("Главное меню");
    hinted.lang_hint = Some(Lang::Ru);
    let menu = d.handle(hinted).await;
    assert!(prompt_options(&menu).contains(&"🚗 Куәлік алу".to_string()));
}

#[tokio::test]
async fn lesson_time_step_appears_when_catalog_defines_slots() {
    let api = Arc::new(MockApi {
        training_times: serde_json::from_value(serde_json::json!([
            {"id": 2, "name_ru": "Утро", "name_kz": "Таң"},
            {"id": 3, "name_ru": "Вечер"}
        ]))
        .unwrap(),
        ..MockApi::default()
    });
    let d = dispatcher(api.clone());

    d.handle(msg("🚗 Получить права")).await;
    d.handle(msg("Алматы")).await;
    d.handle(msg("Категория B")).await;
    let time_prompt = d.handle(msg("Офлайн")).await;
    assert_eq!(prompt_text(&time_prompt), "Выберите время занятий:");
    assert!(prompt_options(&time_prompt).contains(&"Утро".to_string()));

    // Back from the time step returns to the format prompt.
    let back = d.handle(msg("Назад")).await;
    assert_eq!(prompt_text(&back), "Выберите формат обучения:");
    d.handle(msg("Офлайн")).await;

    let schools = d.handle(msg("Утро")).await;
    assert!(prompt_options(&schools).contains(&"Автошкола Старт".to_string()));

    d.handle(msg("Автошкола Старт")).await;
    d.handle(msg("📝 Записаться")).await;
    d.handle(msg("Стандарт - 90000 KZT")).await;
    d.handle(msg("Aigerim")).await;
    let confirm = d.handle(msg("87011234567")).await;
    assert!(prompt_text(&confirm).contains("Время: Утро"));
    d.handle(msg("✅ Всё верно")).await;

    let lead = api.captured_lead.lock().await.clone().unwrap();
    assert_eq!(lead["payload"]["training_time_id"], 2);
}

#[tokio::test]
async fn back_redisplays_cached_list_without_api_calls() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    // Reach the school list, then step back to the format prompt.
    d.handle(msg("🚗 Получить права")).await;
    d.handle(msg("Алматы")).await;
    let format_prompt = d.handle(msg("Категория B")).await;
    d.handle(msg("Офлайн")).await;

    let calls = api.call_count();
    let back = d.handle(msg("Назад")).await;
    assert_eq!(api.call_count(), calls, "back must not hit the API");
    assert_eq!(back, format_prompt, "back must re-render the cached prompt");

    // Going forward again re-fetches the time slots and the school list.
    d.handle(msg("Офлайн")).await;
    assert_eq!(api.call_count(), calls + 2);
}

#[tokio::test]
async fn main_menu_clears_from_any_state() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    walk_to_school_list(&d).await;
    let menu = d.handle(msg("Главное меню")).await;
    let options = prompt_options(&menu);
    assert!(options.contains(&"🚗 Получить права".to_string()));

    // The session is idle again: a school name is no longer understood.
    let replies = d.handle(msg("Автошкола Старт")).await;
    assert_eq!(prompt_options(&replies), options);
}

#[tokio::test]
async fn invalid_phone_reprompts_identically() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    walk_to_school_list(&d).await;
    d.handle(msg("Автошкола Старт")).await;
    d.handle(msg("📝 Записаться")).await;
    d.handle(msg("Стандарт - 90000 KZT")).await;
    d.handle(msg("Aigerim")).await;

    let calls = api.call_count();
    let first = d.handle(msg("стационарный 1234")).await;
    let second = d.handle(msg("стационарный 1234")).await;
    assert_eq!(first, second);
    assert!(matches!(first[0], Reply::Prompt { ref text, .. } if text.contains("Не удалось")));
    assert_eq!(api.call_count(), calls, "validation is purely local");
}

#[tokio::test]
async fn certificate_route_unlocks_full_category_list() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    d.handle(msg("📄 Есть сертификат")).await;
    d.handle(msg("🏫 Пройти автошколу заново")).await;
    let categories = d.handle(msg("Алматы")).await;
    let options = prompt_options(&categories);
    assert!(options.contains(&"Категория A".to_string()));
    assert!(options.contains(&"Категория B".to_string()));
}

#[tokio::test]
async fn certificate_instructor_flow_submits_instructor_lead() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    d.handle(msg("📄 Есть сертификат")).await;
    d.handle(msg("🚗 Записаться к инструктору")).await;
    d.handle(msg("Алматы")).await;
    d.handle(msg("Категория B")).await;
    d.handle(msg("Автомат")).await;
    d.handle(msg("Ермек")).await;
    d.handle(msg("📝 Записаться")).await;
    d.handle(msg("Aigerim")).await;
    d.handle(msg("87011234567")).await;
    let done = d.handle(msg("✅ Всё верно")).await;
    assert!(done
        .iter()
        .any(|r| matches!(r, Reply::Link { url, .. } if url.starts_with("https://wa.me/77788981396"))));

    let lead = api.captured_lead.lock().await.clone().unwrap();
    assert_eq!(lead["type"], "INSTRUCTOR");
    assert_eq!(lead["main_intent"], "CERT_NOT_PASSED");
    assert_eq!(lead["payload"]["city_id"], 1);
    assert_eq!(lead["payload"]["category_id"], 2);
    assert_eq!(lead["payload"]["gearbox"], "AUTOMATIC");
    assert_eq!(lead["payload"]["instructor_id"], 17);
}

#[tokio::test]
async fn online_start_pins_category_b_and_resubmits_resolved_tariff() {
    let api = Arc::new(MockApi {
        online_tariff: Some(ResolvedTariff {
            tariff_plan_id: 11,
            name: LocalizedText::new("Онлайн START", None),
            price_kzt: 19_900,
            school_id: 7,
            training_format_id: Some(2),
        }),
        ..MockApi::default()
    });
    let d = dispatcher(api.clone());

    d.handle(msg("📱 Онлайн-обучение")).await;
    // Start skips the category step straight to the first name.
    let first_name = d.handle(msg("🚀 Онлайн START")).await;
    assert!(prompt_text(&first_name).contains("Введите имя"));

    d.handle(msg("Aigerim")).await;
    d.handle(msg("Tulegenova")).await;
    d.handle(msg("990101350123")).await;
    d.handle(msg("+7 (701) 123-45-67")).await;
    let done = d.handle(msg("✅ Всё верно")).await;
    assert!(done
        .iter()
        .any(|r| matches!(r, Reply::Link { url, .. } if url.starts_with("https://wa.me/77026345274"))));

    let lead = api.captured_lead.lock().await.clone().unwrap();
    assert_eq!(lead["type"], "SCHOOL");
    assert!(lead["payload"].get("city_id").is_none());
    assert_eq!(lead["payload"]["category_id"], 2);
    assert_eq!(lead["payload"]["training_format_id"], 2);
    assert_eq!(lead["payload"]["school_id"], 7);
    assert_eq!(lead["payload"]["tariff_plan_id"], 11);
    assert_eq!(lead["payload"]["iin"], "990101350123");
    assert_eq!(lead["payload"]["whatsapp"], "+77011234567");
    assert_eq!(lead["contact"]["name"], "Aigerim Tulegenova");
}

#[tokio::test]
async fn edit_at_confirm_rewinds_to_name_entry() {
    let api = Arc::new(MockApi::default());
    let d = dispatcher(api.clone());

    walk_to_school_list(&d).await;
    d.handle(msg("Автошкола Старт")).await;
    d.handle(msg("📝 Записаться")).await;
    d.handle(msg("Стандарт - 90000 KZT")).await;
    d.handle(msg("Aigerim")).await;
    d.handle(msg("87011234567")).await;

    let name_prompt = d.handle(msg("✏️ Исправить")).await;
    assert!(prompt_text(&name_prompt).contains("Введите ваше имя"));

    // Re-entering name and phone reaches confirm again with new values.
    d.handle(msg("Dana")).await;
    let confirm = d.handle(msg("87017654321")).await;
    let text = prompt_text(&confirm);
    assert!(text.contains("Dana"));
    assert!(text.contains("+77017654321"));
}
