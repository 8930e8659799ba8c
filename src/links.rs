//! WhatsApp hand-off links.
//!
//! After a lead is accepted the bot offers a `wa.me` deep link with a
//! pre-filled message, so the user lands in a chat with the right
//! operator. Recipients are fixed per lead kind and come from config.

use url::Url;

use crate::config::BotConfig;
use crate::i18n::Lang;

const WA_BASE: &str = "https://wa.me/";

#[derive(Debug, Clone)]
pub struct WhatsappLinks {
    schools: String,
    instructors: String,
}

impl WhatsappLinks {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            schools: config.whatsapp_schools.clone(),
            instructors: config.whatsapp_instructors.clone(),
        }
    }

    fn build(recipient: &str, text: String) -> String {
        let base = format!("{WA_BASE}{}", recipient.trim_start_matches('+'));
        match Url::parse(&base) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("text", &text);
                url.to_string()
            }
            // Recipient numbers are digits from config; parsing only
            // fails on a broken config, in which case a bare link is
            // still better than none.
            Err(_) => base,
        }
    }

    /// Link for a driving-school enrollment lead.
    #[allow(clippy::too_many_arguments)]
    pub fn school_lead(
        &self,
        lang: Lang,
        city_name: &str,
        category_name: &str,
        format_name: &str,
        time_name: Option<&str>,
        school_name: &str,
        customer_name: &str,
        phone: &str,
    ) -> String {
        let mut text = String::from("Здравствуйте!\nЗаявка на обучение:\n\n");
        match lang {
            Lang::Kz => {
                text.push_str(&format!("Қала: {city_name}\n"));
                text.push_str(&format!("Санат: {category_name}\n"));
                text.push_str(&format!("Формат: {format_name}\n"));
                if let Some(time) = time_name {
                    text.push_str(&format!("Уақыт: {time}\n"));
                }
                text.push_str(&format!("Автошкола: {school_name}\n"));
                text.push_str(&format!("Аты: {customer_name}\n"));
                text.push_str(&format!("Телефон: {phone}"));
            }
            Lang::Ru => {
                text.push_str(&format!("Город: {city_name}\n"));
                text.push_str(&format!("Категория: {category_name}\n"));
                text.push_str(&format!("Формат: {format_name}\n"));
                if let Some(time) = time_name {
                    text.push_str(&format!("Время: {time}\n"));
                }
                text.push_str(&format!("Автошкола: {school_name}\n"));
                text.push_str(&format!("Имя: {customer_name}\n"));
                text.push_str(&format!("Телефон: {phone}"));
            }
        }
        Self::build(&self.schools, text)
    }

    /// Link for an online-product lead.
    pub fn online_lead(
        &self,
        lang: Lang,
        tariff_name: &str,
        category_name: Option<&str>,
        full_name: &str,
        iin: &str,
        whatsapp: &str,
    ) -> String {
        let mut text = String::from("Здравствуйте! Заявка на онлайн-обучение.\n\n");
        text.push_str(&format!("Тариф: {tariff_name}\n"));
        if let Some(category) = category_name {
            match lang {
                Lang::Kz => text.push_str(&format!("Санат: {category}\n")),
                Lang::Ru => text.push_str(&format!("Категория: {category}\n")),
            }
        }
        match lang {
            Lang::Kz => {
                text.push_str(&format!("ЖСН: {iin}\n"));
                text.push_str(&format!("Аты: {full_name}\n"));
            }
            Lang::Ru => {
                text.push_str(&format!("ИИН: {iin}\n"));
                text.push_str(&format!("Имя: {full_name}\n"));
            }
        }
        text.push_str(&format!("WhatsApp: {whatsapp}"));
        Self::build(&self.schools, text)
    }

    /// Link for an instructor lead.
    pub fn instructor_lead(
        &self,
        lang: Lang,
        instructor_name: &str,
        category_name: &str,
        customer_name: &str,
        phone: &str,
    ) -> String {
        let service = match lang {
            Lang::Kz => "Нұсқаушы",
            Lang::Ru => "Инструктор",
        };
        let mut text = String::from("Здравствуйте!\n\nНовая заявка с Telegram-бота.\n\n");
        text.push_str(&format!("👤 Имя: {customer_name}\n"));
        text.push_str(&format!("💬 WhatsApp: {phone}\n"));
        text.push_str(&format!("📘 Услуга: {service} — {instructor_name}\n"));
        match lang {
            Lang::Kz => {
                text.push_str(&format!("📗 Санат: {category_name}\n"));
                text.push_str("🌐 Тіл: KZ");
            }
            Lang::Ru => {
                text.push_str(&format!("📗 Категория: {category_name}\n"));
                text.push_str("🌐 Язык: RU");
            }
        }
        Self::build(&self.instructors, text)
    }
}
