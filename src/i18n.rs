//! Localization — the two bot languages and the message catalog.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Bot language. The wire format uses the backend's `"RU"` / `"KZ"` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Lang {
    #[default]
    #[serde(rename = "RU")]
    Ru,
    #[serde(rename = "KZ")]
    Kz,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ru => "RU",
            Self::Kz => "KZ",
        }
    }
}

impl FromStr for Lang {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RU" => Ok(Self::Ru),
            "KZ" => Ok(Self::Kz),
            _ => Err(()),
        }
    }
}

/// A bilingual display string with an explicit fallback-to-Russian rule.
///
/// Replaces per-call-site probing of `name_ru` / `name_kz` / `name.ru`
/// key variants: every catalog item resolves its display name through
/// this one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocalizedText {
    pub ru: String,
    pub kz: Option<String>,
}

impl LocalizedText {
    pub fn new(ru: impl Into<String>, kz: Option<String>) -> Self {
        Self { ru: ru.into(), kz }
    }

    /// The text for `lang`, falling back to Russian when the Kazakh
    /// variant is missing or empty.
    pub fn get(&self, lang: Lang) -> &str {
        match lang {
            Lang::Ru => &self.ru,
            Lang::Kz => match self.kz.as_deref() {
                Some(kz) if !kz.is_empty() => kz,
                _ => &self.ru,
            },
        }
    }
}

/// Keys of the user-facing message catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    ChooseLanguage,
    LangRussian,
    LangKazakh,
    MainWelcome,
    MenuSchools,
    MenuOnline,
    MenuCertificate,
    Back,
    MainMenu,
    ChooseCity,
    ChooseCategory,
    ChooseFormat,
    ChooseTime,
    ChooseSchool,
    ChooseTariff,
    ChooseGearbox,
    ChooseInstructor,
    EnterName,
    EnterFirstName,
    EnterLastName,
    EnterIin,
    EnterPhone,
    EnterWhatsapp,
    ShareContact,
    InvalidName,
    InvalidIin,
    InvalidPhone,
    ConfirmData,
    AllCorrect,
    Fix,
    ThankYou,
    ErrorClient,
    ErrorServer,
    ErrorTimeout,
    ErrorNetwork,
    ErrorUnknown,
    NoCities,
    NoCategories,
    NoSchools,
    NoTariffs,
    NoInstructors,
    TariffNotFound,
    OnlyCategoryB,
    SchoolRating,
    SchoolTrust,
    SchoolAddress,
    SchoolIntake,
    RegisterButton,
    OnlineChooseProduct,
    ProductPddTests,
    ProductStart,
    ProductProDrive,
    CertIntro,
    CertSchoolAgain,
    CertInstructor,
    GearboxAutomatic,
    GearboxManual,
    OpenWhatsapp,
    OpenWhatsappHint,
}

impl Msg {
    /// The localized text for this message.
    pub fn text(self, lang: Lang) -> &'static str {
        use Msg::*;
        match (self, lang) {
            // The language prompt is shown before a language is known,
            // so both arms carry the same bilingual text.
            (ChooseLanguage, _) => "Выберите язык / Тілді таңдаңыз",
            (LangRussian, _) => "Русский",
            (LangKazakh, _) => "Қазақша",
            (MainWelcome, Lang::Ru) => "Здравствуйте! Чем можем помочь?",
            (MainWelcome, Lang::Kz) => "Сәлеметсіз бе! Немен көмектесе аламыз?",
            (MenuSchools, Lang::Ru) => "🚗 Получить права",
            (MenuSchools, Lang::Kz) => "🚗 Куәлік алу",
            (MenuOnline, Lang::Ru) => "📱 Онлайн-обучение",
            (MenuOnline, Lang::Kz) => "📱 Онлайн оқу",
            (MenuCertificate, Lang::Ru) => "📄 Есть сертификат",
            (MenuCertificate, Lang::Kz) => "📄 Сертификат бар",
            (Back, Lang::Ru) => "Назад",
            (Back, Lang::Kz) => "Артқа",
            (MainMenu, Lang::Ru) => "Главное меню",
            (MainMenu, Lang::Kz) => "Басты мәзір",
            (ChooseCity, Lang::Ru) => "Выберите город:",
            (ChooseCity, Lang::Kz) => "Қаланы таңдаңыз:",
            (ChooseCategory, Lang::Ru) => "Выберите категорию:",
            (ChooseCategory, Lang::Kz) => "Санатты таңдаңыз:",
            (ChooseFormat, Lang::Ru) => "Выберите формат обучения:",
            (ChooseFormat, Lang::Kz) => "Оқу форматын таңдаңыз:",
            (ChooseTime, Lang::Ru) => "Выберите время занятий:",
            (ChooseTime, Lang::Kz) => "Сабақ уақытын таңдаңыз:",
            (ChooseSchool, Lang::Ru) => "Выберите автошколу:",
            (ChooseSchool, Lang::Kz) => "Автошколаны таңдаңыз:",
            (ChooseTariff, Lang::Ru) => "Выберите тариф:",
            (ChooseTariff, Lang::Kz) => "Тарифті таңдаңыз:",
            (ChooseGearbox, Lang::Ru) => "Выберите коробку передач:",
            (ChooseGearbox, Lang::Kz) => "Беріліс қорабын таңдаңыз:",
            (ChooseInstructor, Lang::Ru) => "Выберите инструктора:",
            (ChooseInstructor, Lang::Kz) => "Нұсқаушыны таңдаңыз:",
            (EnterName, Lang::Ru) => "Введите ваше имя:",
            (EnterName, Lang::Kz) => "Атыңызды енгізіңіз:",
            (EnterFirstName, Lang::Ru) => "Введите имя:",
            (EnterFirstName, Lang::Kz) => "Атыңызды енгізіңіз:",
            (EnterLastName, Lang::Ru) => "Введите фамилию:",
            (EnterLastName, Lang::Kz) => "Тегіңізді енгізіңіз:",
            (EnterIin, Lang::Ru) => "Введите ИИН (12 цифр):",
            (EnterIin, Lang::Kz) => "ЖСН енгізіңіз (12 сан):",
            (EnterPhone, Lang::Ru) => "Отправьте номер телефона или поделитесь контактом:",
            (EnterPhone, Lang::Kz) => "Телефон нөмірін жіберіңіз немесе контактпен бөлісіңіз:",
            (EnterWhatsapp, Lang::Ru) => "Введите номер WhatsApp:",
            (EnterWhatsapp, Lang::Kz) => "WhatsApp нөмірін енгізіңіз:",
            (ShareContact, Lang::Ru) => "📱 Поделиться контактом",
            (ShareContact, Lang::Kz) => "📱 Контактпен бөлісу",
            (InvalidName, Lang::Ru) => "Имя слишком короткое, попробуйте ещё раз.",
            (InvalidName, Lang::Kz) => "Аты тым қысқа, қайталап көріңіз.",
            (InvalidIin, Lang::Ru) => "ИИН должен состоять из 12 цифр, попробуйте ещё раз.",
            (InvalidIin, Lang::Kz) => "ЖСН 12 саннан тұруы керек, қайталап көріңіз.",
            (InvalidPhone, Lang::Ru) => "Не удалось распознать номер, попробуйте ещё раз.",
            (InvalidPhone, Lang::Kz) => "Нөмір танылмады, қайталап көріңіз.",
            (ConfirmData, Lang::Ru) => "Проверьте данные:",
            (ConfirmData, Lang::Kz) => "Деректерді тексеріңіз:",
            (AllCorrect, Lang::Ru) => "✅ Всё верно",
            (AllCorrect, Lang::Kz) => "✅ Барлығы дұрыс",
            (Fix, Lang::Ru) => "✏️ Исправить",
            (Fix, Lang::Kz) => "✏️ Түзету",
            (ThankYou, Lang::Ru) => "Спасибо! Заявка принята, с вами свяжутся.",
            (ThankYou, Lang::Kz) => "Рақмет! Өтінім қабылданды, сізбен байланысады.",
            (ErrorClient, Lang::Ru) => "Произошла ошибка в запросе. Попробуйте начать заново.",
            (ErrorClient, Lang::Kz) => "Сұрауда қате болды. Қайта бастап көріңіз.",
            (ErrorServer, Lang::Ru) => "Сервис временно недоступен. Попробуйте позже.",
            (ErrorServer, Lang::Kz) => "Қызмет уақытша қолжетімсіз. Кейінірек көріңіз.",
            (ErrorTimeout, Lang::Ru) => "Сервис не отвечает. Попробуйте позже.",
            (ErrorTimeout, Lang::Kz) => "Қызмет жауап бермейді. Кейінірек көріңіз.",
            (ErrorNetwork, Lang::Ru) => "Проблема с соединением. Попробуйте позже.",
            (ErrorNetwork, Lang::Kz) => "Байланыс мәселесі. Кейінірек көріңіз.",
            (ErrorUnknown, Lang::Ru) => "Что-то пошло не так. Попробуйте позже.",
            (ErrorUnknown, Lang::Kz) => "Бірдеңе дұрыс болмады. Кейінірек көріңіз.",
            (NoCities, Lang::Ru) => "Города пока не добавлены.",
            (NoCities, Lang::Kz) => "Қалалар әлі қосылмаған.",
            (NoCategories, Lang::Ru) => "Категории не найдены.",
            (NoCategories, Lang::Kz) => "Санаттар табылмады.",
            (NoSchools, Lang::Ru) => "В этом городе пока нет автошкол.",
            (NoSchools, Lang::Kz) => "Бұл қалада әзірге автошколалар жоқ.",
            (NoTariffs, Lang::Ru) => "Для выбранных параметров нет тарифов.",
            (NoTariffs, Lang::Kz) => "Таңдалған параметрлер үшін тарифтер жоқ.",
            (NoInstructors, Lang::Ru) => "Инструкторы не найдены.",
            (NoInstructors, Lang::Kz) => "Нұсқаушылар табылмады.",
            (TariffNotFound, Lang::Ru) => "Тариф не найден.",
            (TariffNotFound, Lang::Kz) => "Тариф табылмады.",
            (OnlyCategoryB, Lang::Ru) => "Доступна только категория B",
            (OnlyCategoryB, Lang::Kz) => "Тек B санаты қолжетімді",
            (SchoolRating, Lang::Ru) => "Рейтинг",
            (SchoolRating, Lang::Kz) => "Рейтинг",
            (SchoolTrust, Lang::Ru) => "Индекс доверия",
            (SchoolTrust, Lang::Kz) => "Сенім индексі",
            (SchoolAddress, Lang::Ru) => "Адрес",
            (SchoolAddress, Lang::Kz) => "Мекенжай",
            (SchoolIntake, Lang::Ru) => "Ближайший набор",
            (SchoolIntake, Lang::Kz) => "Жақын жинақ",
            (RegisterButton, Lang::Ru) => "📝 Записаться",
            (RegisterButton, Lang::Kz) => "📝 Жазылу",
            (OnlineChooseProduct, Lang::Ru) => "Выберите онлайн-продукт:",
            (OnlineChooseProduct, Lang::Kz) => "Онлайн өнімді таңдаңыз:",
            (ProductPddTests, Lang::Ru) => "📘 Тесты по ПДД",
            (ProductPddTests, Lang::Kz) => "📘 ЖҚД тесттері",
            (ProductStart, Lang::Ru) => "🚀 Онлайн START",
            (ProductStart, Lang::Kz) => "🚀 Онлайн START",
            (ProductProDrive, Lang::Ru) => "🏁 Онлайн PRO Drive",
            (ProductProDrive, Lang::Kz) => "🏁 Онлайн PRO Drive",
            (CertIntro, Lang::Ru) => {
                "У вас есть сертификат об окончании автошколы,\nно экзамен ещё не сдан. Выберите, что вам нужно."
            }
            (CertIntro, Lang::Kz) => {
                "Сізде автошколаны бітірген сертификат бар,\nбірақ емтихан әлі тапсырылмаған. Сізге не керек екенін таңдаңыз."
            }
            (CertSchoolAgain, Lang::Ru) => "🏫 Пройти автошколу заново",
            (CertSchoolAgain, Lang::Kz) => "🏫 Автошколаны қайта өту",
            (CertInstructor, Lang::Ru) => "🚗 Записаться к инструктору",
            (CertInstructor, Lang::Kz) => "🚗 Нұсқаушыға жазылу",
            (GearboxAutomatic, Lang::Ru) => "Автомат",
            (GearboxAutomatic, Lang::Kz) => "Автомат",
            (GearboxManual, Lang::Ru) => "Механика",
            (GearboxManual, Lang::Kz) => "Механика",
            (OpenWhatsapp, Lang::Ru) => "Открыть WhatsApp",
            (OpenWhatsapp, Lang::Kz) => "WhatsApp ашу",
            (OpenWhatsappHint, Lang::Ru) => "Нажмите на кнопку, чтобы открыть WhatsApp",
            (OpenWhatsappHint, Lang::Kz) => "WhatsApp ашу үшін батырманы басыңыз",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_parses_case_insensitively() {
        assert_eq!("ru".parse::<Lang>(), Ok(Lang::Ru));
        assert_eq!("KZ".parse::<Lang>(), Ok(Lang::Kz));
        assert!("EN".parse::<Lang>().is_err());
    }

    #[test]
    fn lang_serde_uses_backend_tags() {
        assert_eq!(serde_json::to_string(&Lang::Kz).unwrap(), "\"KZ\"");
        let parsed: Lang = serde_json::from_str("\"RU\"").unwrap();
        assert_eq!(parsed, Lang::Ru);
    }

    #[test]
    fn localized_text_falls_back_to_ru() {
        let name = LocalizedText::new("Алматы", Some("Алматы қ.".into()));
        assert_eq!(name.get(Lang::Kz), "Алматы қ.");

        let ru_only = LocalizedText::new("Астана", None);
        assert_eq!(ru_only.get(Lang::Kz), "Астана");

        let empty_kz = LocalizedText::new("Шымкент", Some(String::new()));
        assert_eq!(empty_kz.get(Lang::Kz), "Шымкент");
    }

    #[test]
    fn every_message_has_both_languages() {
        // A message that resolves to an empty string would render a blank
        // prompt; guard the catalog against that.
        let keys = [
            Msg::MainWelcome,
            Msg::ChooseCity,
            Msg::ThankYou,
            Msg::ErrorServer,
            Msg::CertIntro,
            Msg::OpenWhatsappHint,
        ];
        for key in keys {
            assert!(!key.text(Lang::Ru).is_empty());
            assert!(!key.text(Lang::Kz).is_empty());
        }
    }
}
